pub mod cache;
pub mod manager;
pub mod types;

pub use manager::StreamRegistry;
pub use types::{RegistryHealth, ScoredRow};
