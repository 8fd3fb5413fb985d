/// The monotonically increasing integer identifying one deterministic
/// simulation step. Unlike packet sequence numbers, ages never wrap:
/// a session log is append-only and unbounded.
pub type Age = u64;

/// Identifier of the player a given event is attributed to.
pub type PlayerId = String;

/// Raw event flag byte carried on the wire.
pub type EventFlags = u8;

/// Bits of `EventFlags` that encode the event priority.
pub const EVENT_FLAG_PRIORITY_MASK: EventFlags = 0b0011;

/// Flag bit marking an event as transient. Transient events are delivered to
/// subscribers but excluded when a tick is persisted by the log service.
pub const EVENT_FLAG_TRANSIENT: EventFlags = 0b1000;
