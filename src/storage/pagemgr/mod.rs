pub mod file;
pub mod manager;
pub mod memory;

pub use file::FilePageManager;
pub use manager::PageManager;
pub use memory::MemoryPageManager;
