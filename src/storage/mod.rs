mod file_storage;
mod memory;
mod models;
pub mod seed;

pub use file_storage::FileRepository;
pub use memory::MemoryRepository;
pub use models::*;
