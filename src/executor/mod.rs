pub mod backend;
#[allow(clippy::module_inception)]
pub mod executor;
pub mod terraform;

pub use executor::{BackendConfig, Executor, InitMode};
pub use terraform::TerraformExecutor;
