pub mod error;
pub mod memory;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use store::{CoordinationStore, EtcdStore, Guard, StoreConfig, Versioned};
