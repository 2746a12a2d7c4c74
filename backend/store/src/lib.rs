pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteAdvisoryStore;
pub use store::{AdvisoryStore, InMemoryAdvisoryStore};
