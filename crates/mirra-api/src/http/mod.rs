//! Router assembly, request state, and handler implementations.

pub(crate) mod errors;
pub(crate) mod handlers;
/// Router assembly and the listener entry point.
pub mod router;
pub(crate) mod state;
