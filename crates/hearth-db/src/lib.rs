//! Hearth entity store
//!
//! Persistence for parent entities and the media assets attached to them.
//! [`PgEntityStore`] is the production backend; [`MemoryEntityStore`] backs
//! tests and dry runs.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryEntityStore;
pub use postgres::{connect, PgEntityStore};
pub use traits::EntityStore;
