use thiserror::Error;
use ticklog_shared::{
    Age, Event, EventFlags, StartPoint, StorageKey, StorageRecord, StorageValue, Tick, TickList,
};

/// Identifies one in-flight storage read so its completion can be routed
/// back to whatever requested it, and stale completions dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StorageRequestId(pub u64);

/// What a token grants on the session log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    pub write_tick: bool,
    pub read_tick: bool,
    pub subscribe_tick: bool,
    pub send_event: bool,
    pub subscribe_event: bool,
    pub max_event_priority: EventFlags,
}

/// Selector for a start-point fetch: nearest start point at or before the
/// given frame, or at or before the given timestamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartPointQuery {
    pub frame: Option<Age>,
    pub timestamp: Option<f64>,
}

impl StartPointQuery {
    pub fn by_frame(frame: Age) -> Self {
        Self {
            frame: Some(frame),
            timestamp: None,
        }
    }

    pub fn by_timestamp(timestamp: f64) -> Self {
        Self {
            frame: None,
            timestamp: Some(timestamp),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("invalid token")]
    InvalidToken,
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("tick {0} already exists in the log")]
    TickAlreadyExists(Age),
    #[error("no start point matches the query")]
    NoStartPoint,
    #[error("log service failure: {0}")]
    Failed(String),
}

/// Completions and pushed data delivered by `LogService::poll`, in arrival
/// order. Completions may be reordered relative to their requests; the
/// driver re-checks its state on every receipt.
#[derive(Clone, Debug)]
pub enum LogResponse {
    /// A tick pushed over the tick subscription.
    Tick(Tick),
    /// An event pushed over the event subscription.
    Event(Event),
    /// Completion of `request_tick_list`. `Ok(None)` means the requested
    /// span holds no ticks yet.
    TickList(Result<Option<TickList>, LogError>),
    /// Completion of `request_start_point`.
    StartPoint(Result<StartPoint, LogError>),
    /// Completion of `request_storage`.
    Storage {
        id: StorageRequestId,
        result: Result<Vec<StorageRecord>, LogError>,
    },
    /// Completion of `put_storage`.
    StoragePut(Result<(), LogError>),
    /// Completion of `put_start_point`.
    StartPointPut(Result<(), LogError>),
}

/// The session log client: synchronous submission, asynchronous completion.
///
/// Every `request_*`/`put_*` call completes later through `poll`. The
/// driver pumps `poll` at the head of every looper callback.
pub trait LogService {
    fn authenticate(&mut self, token: &str) -> Result<Permission, LogError>;

    fn send_tick(&mut self, tick: &Tick) -> Result<(), LogError>;

    fn send_event(&mut self, event: &Event) -> Result<(), LogError>;

    /// Requests ticks in the inclusive span `[from, to]`.
    fn request_tick_list(&mut self, from: Age, to: Age);

    fn request_start_point(&mut self, query: &StartPointQuery);

    fn request_storage(&mut self, keys: &[StorageKey]) -> StorageRequestId;

    fn put_start_point(&mut self, start_point: &StartPoint);

    fn put_storage(&mut self, key: &StorageKey, value: &StorageValue);

    fn set_tick_subscription(&mut self, on: bool);

    fn set_event_subscription(&mut self, on: bool);

    fn poll(&mut self) -> Vec<LogResponse>;
}
