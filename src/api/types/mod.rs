//! Shared API types

pub mod error;
pub mod json;
pub mod targets;

pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
pub use targets::TargetList;
