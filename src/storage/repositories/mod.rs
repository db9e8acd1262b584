//! Repository modules for data access

pub mod instance;

pub use instance::{InMemoryInstanceRepository, InstanceRepository, SqlxInstanceRepository};
