//! Middleware for the CRM API server.

pub mod cache;

pub use cache::{InvalidateLayer, InvalidateMiddleware, ReadThroughLayer, ReadThroughMiddleware};
