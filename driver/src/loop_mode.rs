/// How the loop paces tick consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Chase the latest known tick in wall-clock time.
    Realtime,
    /// Replay toward a target age or target time.
    Replay,
    /// Advance only when stepped externally; tick reception does not
    /// affect execution.
    FrameByFrame,
}

/// Whether the loop renders after each raw looper callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopRenderMode {
    AfterRawFrame,
    None,
}
