pub mod create;
pub mod ls;
pub mod preflight;

pub use create::{cmd_create, run_create, CreateOutcome, PipelineEnv};
pub use ls::cmd_ls;
pub use preflight::cmd_preflight;
