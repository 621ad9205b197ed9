pub mod engine;
pub mod run;
pub mod scanner;
pub mod state;
pub mod step;

pub use engine::WorkflowEngine;
pub use run::{RunStatus, WorkflowRun};
pub use scanner::{DirectoryScanner, SeenFiles};
pub use state::WorkflowState;
pub use step::{Step, StepId, StepStatus, PIPELINE};
