//! # Orders Server Library
//!
//! Wires configuration, the PostgreSQL store, the order cache, the stream
//! consumers and the HTTP router into one process, and tears them down in
//! order on shutdown.

pub mod app;
pub mod startup;
