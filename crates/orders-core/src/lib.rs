//! # Orders Core
//!
//! Core types, traits, and error definitions for the orders service.
//! This crate holds what every layer agrees on: the error taxonomy,
//! the order model, the stream payload codec, and the write-path trait
//! shared by the cache engine and the ingestion consumer.

pub mod codec;
pub mod error;
pub mod model;
pub mod result;
pub mod telemetry;
pub mod traits;
pub mod validation;

pub use codec::*;
pub use error::*;
pub use model::*;
pub use result::*;
pub use traits::*;
pub use validation::*;

// Re-export shaku's Interface bound used by the collaborator traits
pub use shaku::Interface;
