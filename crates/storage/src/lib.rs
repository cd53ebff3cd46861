pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::Versioned;
pub use traits::PassageStore;
