//! PostgreSQL implementations.

mod order_store;

pub use order_store::PgOrderStore;
