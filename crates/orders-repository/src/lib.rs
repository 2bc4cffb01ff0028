//! # Orders Repository
//!
//! The durable side of the read-through cache:
//!
//! ```text
//! CachedOrders
//!   ↓  Arc<dyn OrderStore>   (store interface)
//! PgOrderStore               (PostgreSQL / SQLx)
//!   ↓
//! orders (order_uid TEXT PK, data JSONB, updated_at)
//! ```
//!
//! [`InMemoryOrderStore`] implements the same interface without a database.

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod traits;

pub use memory::InMemoryOrderStore;
pub use pool::*;
pub use postgres::*;
pub use traits::*;
