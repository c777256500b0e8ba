//! Run orchestration: clean, configure, deploy, execute, extract, persist

pub mod controller;
pub mod deploy;
pub mod policy;
pub mod state;

pub use controller::{Collaborators, RunController, RunOutcome};
pub use policy::RetryPolicy;
pub use state::RunState;
