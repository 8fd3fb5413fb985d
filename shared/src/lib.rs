//! # Ticklog Shared
//! Data model and wire codec shared between the ticklog driver and its tooling.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod codec;
mod event;
mod start_point;
mod storage;
mod tick;
mod types;

pub use codec::{
    decode_event, decode_start_point, decode_tick, decode_tick_list, encode_event,
    encode_start_point, encode_tick, encode_tick_list, CodecError,
};
pub use event::{Event, EventKind};
pub use start_point::{StartPoint, StartPointData};
pub use storage::{StorageKey, StorageRecord, StorageValue};
pub use tick::{Tick, TickList, TickRange};
pub use types::{
    Age, EventFlags, PlayerId, EVENT_FLAG_PRIORITY_MASK, EVENT_FLAG_TRANSIENT,
};
