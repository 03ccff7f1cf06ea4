pub mod run;

pub use run::{RunArgs, RunCommand};
