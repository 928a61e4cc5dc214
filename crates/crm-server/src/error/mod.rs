//! Error handling for the CRM API server.

pub mod response;
pub mod types;

pub use types::{not_found, ApiError, ApiResult};
