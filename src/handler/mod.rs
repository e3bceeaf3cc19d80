//! Request handler module
//!
//! Routes requests to the system-info and health endpoints.

pub mod info;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
