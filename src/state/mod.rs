pub mod linker;
pub mod reference;
pub mod scratch;

pub use linker::RemoteStateLinker;
