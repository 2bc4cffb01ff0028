//! # Orders REST
//!
//! REST API layer using Axum for the orders service.
//! Serves cached order documents by uid, plus health probes, Prometheus
//! metrics and the OpenAPI document.

pub mod controllers;
pub mod middleware;
pub mod openapi;
pub mod responses;
pub mod router;
pub mod state;

pub use router::*;
pub use state::*;
