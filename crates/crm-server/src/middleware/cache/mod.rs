//! Response caching middleware.

pub mod invalidate;
pub mod read_through;
mod sink;

pub use invalidate::{InvalidateLayer, InvalidateMiddleware};
pub use read_through::{ReadThroughLayer, ReadThroughMiddleware};
