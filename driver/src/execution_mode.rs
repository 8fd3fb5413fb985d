/// The role an instance plays in a session.
///
/// Exactly one Active instance per session generates and submits ticks; any
/// number of Passive instances receive and replay them. The role can change
/// at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Active,
    Passive,
}
