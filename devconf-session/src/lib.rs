pub mod backend;
pub mod feedback;
pub mod inmemory;
pub mod service;

#[cfg(feature = "database")]
pub mod database;

pub use backend::{SessionBackend, StorageConfig};
pub use feedback::{FeedbackRecord, FeedbackRequest, FeedbackStore, FeedbackType};
pub use inmemory::InMemorySessionStore;
pub use service::{CreateRequest, GetRequest, ListRequest, SessionStore};

#[cfg(feature = "database")]
pub use database::DatabaseSessionStore;
