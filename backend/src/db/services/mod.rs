//! The `services` module holds the issuance engine's data access.
//!
//! Each sub-module owns one concern: the counters, the model catalog
//! boundary, batch issuance, allocation, and read-only lookups. Their public
//! items are re-exported here so callers can use `crate::db::services::*`.

pub mod allocation_service;
pub mod counter_service;
pub mod error;
pub mod issuance_service;
pub mod lookup_service;
pub mod model_service;

pub use allocation_service::*;
pub use counter_service::*;
pub use error::{ErrorKind, ServiceError};
pub use issuance_service::*;
pub use lookup_service::*;
pub use model_service::*;
