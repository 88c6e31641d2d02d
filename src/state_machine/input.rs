//! Inputs that drive session transitions

use crate::engine::LoadFailure;

/// Commands from the host and outcomes from the engine, tagged with the load
/// generation they belong to where that matters
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    // Host commands
    LoadRequested { generation: u64 },
    Start,
    Close { cleanup: bool },
    Interrupt,
    /// Controller teardown
    Dispose,

    // Engine outcomes
    LoadProgressed { generation: u64, progress: f64 },
    LoadSucceeded { generation: u64 },
    LoadFailed { generation: u64, reason: LoadFailure },
}
