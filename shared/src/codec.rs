//! Positional JSON-array wire codec.
//!
//! Events, ticks and tick lists travel as heterogeneous JSON arrays whose
//! first element (or position, for ticks) determines the layout. Start
//! points travel as plain JSON objects.

use crate::event::{Event, EventKind};
use crate::start_point::StartPoint;
use crate::tick::{Tick, TickList};
use crate::types::{Age, EventFlags, PlayerId};
use serde_json::{json, Value};
use thiserror::Error;

const CODE_JOIN: i64 = 0;
const CODE_LEAVE: i64 = 1;
const CODE_TIMESTAMP: i64 = 2;
const CODE_MESSAGE: i64 = 32;
const CODE_POINT_DOWN: i64 = 33;
const CODE_POINT_MOVE: i64 = 34;
const CODE_POINT_UP: i64 = 35;
const CODE_OPERATION: i64 = 64;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("expected a JSON array, got: {0}")]
    NotAnArray(Value),
    #[error("unknown event code: {0}")]
    UnknownEventCode(i64),
    #[error("missing field at index {index} of {what}")]
    MissingField { what: &'static str, index: usize },
    #[error("malformed field at index {index} of {what}: {value}")]
    MalformedField {
        what: &'static str,
        index: usize,
        value: Value,
    },
    #[error("malformed start point: {0}")]
    MalformedStartPoint(#[from] serde_json::Error),
}

fn as_array<'a>(value: &'a Value) -> Result<&'a Vec<Value>, CodecError> {
    value.as_array().ok_or_else(|| CodecError::NotAnArray(value.clone()))
}

fn get<'a>(arr: &'a [Value], what: &'static str, index: usize) -> Result<&'a Value, CodecError> {
    arr.get(index).ok_or(CodecError::MissingField { what, index })
}

fn get_i64(arr: &[Value], what: &'static str, index: usize) -> Result<i64, CodecError> {
    let v = get(arr, what, index)?;
    v.as_i64().ok_or_else(|| CodecError::MalformedField {
        what,
        index,
        value: v.clone(),
    })
}

// ages are non-negative on the wire; a negative value is malformed, not
// a wrapped huge age
fn get_age(arr: &[Value], what: &'static str, index: usize) -> Result<Age, CodecError> {
    let v = get(arr, what, index)?;
    v.as_u64().ok_or_else(|| CodecError::MalformedField {
        what,
        index,
        value: v.clone(),
    })
}

fn get_f64(arr: &[Value], what: &'static str, index: usize) -> Result<f64, CodecError> {
    let v = get(arr, what, index)?;
    v.as_f64().ok_or_else(|| CodecError::MalformedField {
        what,
        index,
        value: v.clone(),
    })
}

fn get_string(arr: &[Value], what: &'static str, index: usize) -> Result<String, CodecError> {
    let v = get(arr, what, index)?;
    v.as_str()
        .map(str::to_owned)
        .ok_or_else(|| CodecError::MalformedField {
            what,
            index,
            value: v.clone(),
        })
}

fn opt_i64(arr: &[Value], what: &'static str, index: usize) -> Result<Option<i64>, CodecError> {
    match arr.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| CodecError::MalformedField {
                what,
                index,
                value: v.clone(),
            }),
    }
}

fn opt_bool(arr: &[Value], index: usize) -> bool {
    matches!(arr.get(index), Some(Value::Bool(true)))
}

fn flags_value(flags: Option<EventFlags>) -> Value {
    match flags {
        Some(f) => json!(f),
        None => Value::Null,
    }
}

/// Encodes an event into its wire array form. The trailing `local` element
/// is emitted only when set, keeping remote events in their shortest form.
pub fn encode_event(event: &Event) -> Value {
    let flags = flags_value(event.flags);
    let pid = json!(event.player_id);
    let mut arr = match &event.kind {
        EventKind::Join { name, storage } => {
            let mut a = vec![json!(CODE_JOIN), flags, pid, json!(name)];
            if let Some(storage) = storage {
                a.push(json!(storage));
            }
            a
        }
        EventKind::Leave => vec![json!(CODE_LEAVE), flags, pid],
        EventKind::Timestamp { timestamp } => {
            vec![json!(CODE_TIMESTAMP), flags, pid, json!(timestamp)]
        }
        EventKind::Message { data } => vec![json!(CODE_MESSAGE), flags, pid, data.clone()],
        EventKind::PointDown {
            pointer_id,
            x,
            y,
            target,
        } => vec![
            json!(CODE_POINT_DOWN),
            flags,
            pid,
            json!(pointer_id),
            json!(x),
            json!(y),
            json!(target),
        ],
        EventKind::PointMove {
            pointer_id,
            x,
            y,
            start_dx,
            start_dy,
            prev_dx,
            prev_dy,
            target,
        } => vec![
            json!(CODE_POINT_MOVE),
            flags,
            pid,
            json!(pointer_id),
            json!(x),
            json!(y),
            json!(start_dx),
            json!(start_dy),
            json!(prev_dx),
            json!(prev_dy),
            json!(target),
        ],
        EventKind::PointUp {
            pointer_id,
            x,
            y,
            start_dx,
            start_dy,
            prev_dx,
            prev_dy,
            target,
        } => vec![
            json!(CODE_POINT_UP),
            flags,
            pid,
            json!(pointer_id),
            json!(x),
            json!(y),
            json!(start_dx),
            json!(start_dy),
            json!(prev_dx),
            json!(prev_dy),
            json!(target),
        ],
        EventKind::Operation { code, data } => {
            vec![json!(CODE_OPERATION), flags, pid, json!(code), data.clone()]
        }
    };
    if event.local {
        // Pad out any optional positions so the local flag lands at its slot.
        let local_index = match &event.kind {
            EventKind::Join { .. } => 5,
            EventKind::Leave => 3,
            EventKind::Timestamp { .. } | EventKind::Message { .. } => 4,
            EventKind::PointDown { .. } => 7,
            EventKind::PointMove { .. } | EventKind::PointUp { .. } => 11,
            EventKind::Operation { .. } => 5,
        };
        while arr.len() < local_index {
            arr.push(Value::Null);
        }
        arr.push(Value::Bool(true));
    }
    Value::Array(arr)
}

/// Decodes an event from its wire array form.
pub fn decode_event(value: &Value) -> Result<Event, CodecError> {
    const WHAT: &str = "event";
    let arr = as_array(value)?;
    let code = get_i64(arr, WHAT, 0)?;
    let flags = opt_i64(arr, WHAT, 1)?.map(|f| f as EventFlags);
    let player_id: PlayerId = get_string(arr, WHAT, 2)?;
    let (kind, local_index) = match code {
        CODE_JOIN => {
            let name = match arr.get(3) {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_str().map(str::to_owned).ok_or_else(|| {
                    CodecError::MalformedField {
                        what: WHAT,
                        index: 3,
                        value: v.clone(),
                    }
                })?),
            };
            let storage = match arr.get(4) {
                None | Some(Value::Null) => None,
                Some(v) => Some(serde_json::from_value(v.clone()).map_err(|_| {
                    CodecError::MalformedField {
                        what: WHAT,
                        index: 4,
                        value: v.clone(),
                    }
                })?),
            };
            (EventKind::Join { name, storage }, 5)
        }
        CODE_LEAVE => (EventKind::Leave, 3),
        CODE_TIMESTAMP => (
            EventKind::Timestamp {
                timestamp: get_f64(arr, WHAT, 3)?,
            },
            4,
        ),
        CODE_MESSAGE => (
            EventKind::Message {
                data: get(arr, WHAT, 3)?.clone(),
            },
            4,
        ),
        CODE_POINT_DOWN => (
            EventKind::PointDown {
                pointer_id: get_i64(arr, WHAT, 3)?,
                x: get_f64(arr, WHAT, 4)?,
                y: get_f64(arr, WHAT, 5)?,
                target: opt_i64(arr, WHAT, 6)?,
            },
            7,
        ),
        CODE_POINT_MOVE | CODE_POINT_UP => {
            let kind_fields = (
                get_i64(arr, WHAT, 3)?,
                get_f64(arr, WHAT, 4)?,
                get_f64(arr, WHAT, 5)?,
                get_f64(arr, WHAT, 6)?,
                get_f64(arr, WHAT, 7)?,
                get_f64(arr, WHAT, 8)?,
                get_f64(arr, WHAT, 9)?,
                opt_i64(arr, WHAT, 10)?,
            );
            let (pointer_id, x, y, start_dx, start_dy, prev_dx, prev_dy, target) = kind_fields;
            let kind = if code == CODE_POINT_MOVE {
                EventKind::PointMove {
                    pointer_id,
                    x,
                    y,
                    start_dx,
                    start_dy,
                    prev_dx,
                    prev_dy,
                    target,
                }
            } else {
                EventKind::PointUp {
                    pointer_id,
                    x,
                    y,
                    start_dx,
                    start_dy,
                    prev_dx,
                    prev_dy,
                    target,
                }
            };
            (kind, 11)
        }
        CODE_OPERATION => (
            EventKind::Operation {
                code: get_i64(arr, WHAT, 3)?,
                data: get(arr, WHAT, 4)?.clone(),
            },
            5,
        ),
        other => return Err(CodecError::UnknownEventCode(other)),
    };
    Ok(Event {
        kind,
        flags,
        player_id,
        local: opt_bool(arr, local_index),
    })
}

/// Encodes a tick as `[age, events?, storage?]`. Trailing `None` payloads
/// are omitted entirely; an absent-events tick with storage keeps an
/// explicit null in the events slot.
pub fn encode_tick(tick: &Tick) -> Value {
    let mut arr = vec![json!(tick.age)];
    match (&tick.events, &tick.storage) {
        (None, None) => {}
        (events, None) => {
            arr.push(encode_events(events));
        }
        (events, Some(storage)) => {
            arr.push(encode_events(events));
            arr.push(json!(storage));
        }
    }
    Value::Array(arr)
}

fn encode_events(events: &Option<Vec<Event>>) -> Value {
    match events {
        None => Value::Null,
        Some(evs) => Value::Array(evs.iter().map(encode_event).collect()),
    }
}

/// Decodes a tick from `[age, events?, storage?]`.
pub fn decode_tick(value: &Value) -> Result<Tick, CodecError> {
    const WHAT: &str = "tick";
    let arr = as_array(value)?;
    let age = get_age(arr, WHAT, 0)?;
    let events = match arr.get(1) {
        None | Some(Value::Null) => None,
        Some(v) => {
            let evs = as_array(v)?;
            Some(evs.iter().map(decode_event).collect::<Result<Vec<_>, _>>()?)
        }
    };
    let storage = match arr.get(2) {
        None | Some(Value::Null) => None,
        Some(v) => Some(serde_json::from_value(v.clone()).map_err(|_| {
            CodecError::MalformedField {
                what: WHAT,
                index: 2,
                value: v.clone(),
            }
        })?),
    };
    Ok(Tick { age, events, storage })
}

/// Encodes a tick list as `[from, to, ticks?]` where `to` is inclusive and
/// `ticks` holds only the ticks carrying a payload.
pub fn encode_tick_list(list: &TickList) -> Value {
    let mut arr = vec![json!(list.from), json!(list.to)];
    if !list.ticks.is_empty() {
        arr.push(Value::Array(list.ticks.iter().map(encode_tick).collect()));
    }
    Value::Array(arr)
}

/// Decodes a tick list from `[from, to, ticks?]`.
pub fn decode_tick_list(value: &Value) -> Result<TickList, CodecError> {
    const WHAT: &str = "tick list";
    let arr = as_array(value)?;
    let from = get_age(arr, WHAT, 0)?;
    let to = get_age(arr, WHAT, 1)?;
    let ticks = match arr.get(2) {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => as_array(v)?
            .iter()
            .map(decode_tick)
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(TickList { from, to, ticks })
}

/// Encodes a start point as a plain JSON object.
pub fn encode_start_point(sp: &StartPoint) -> Value {
    // StartPoint's serde impl is the wire form.
    serde_json::to_value(sp).unwrap_or(Value::Null)
}

/// Decodes a start point from its object form.
pub fn decode_start_point(value: &Value) -> Result<StartPoint, CodecError> {
    Ok(serde_json::from_value(value.clone())?)
}
