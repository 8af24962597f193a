//! Core traits and types for Casalink.
//!
//! This crate defines the foundational abstractions shared across the
//! device-control workspace: the error taxonomy, cloud configuration,
//! the dynamic status value type, and the storage collaborator traits
//! implemented by `casalink-storage`.

pub mod config;
pub mod error;
pub mod kv;
pub mod search;
pub mod value;

pub use config::CloudConfig;
pub use error::{Error, Result};
pub use kv::KvStore;
pub use search::SearchIndex;
pub use value::ScalarValue;

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::CloudConfig;
    pub use crate::error::{Error, Result};
    pub use crate::kv::KvStore;
    pub use crate::search::SearchIndex;
    pub use crate::value::ScalarValue;
}
