//! Process control: the unified fork/exec primitive, signal discipline,
//! child waiting and the job table.

pub mod jobs;
pub mod launcher;
pub mod signals;
pub mod wait;

pub use jobs::{Job, JobState, JobTable};
pub use launcher::{launch, Child, LaunchConfig, LaunchError, LaunchRole};
pub use signals::{reset_child_signals, SignalManager};
pub use wait::{wait_for, WaitOutcome};
