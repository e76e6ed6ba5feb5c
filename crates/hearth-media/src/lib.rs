//! Hearth media lifecycle
//!
//! Ties intake validation, compression, object storage and the entity store
//! together: creating a parent with media, attaching media to an existing
//! parent, and deleting media singly or with their parent.

pub mod lifecycle;
pub mod report;

pub use lifecycle::{CreatedParent, MediaLifecycleCoordinator};
pub use report::{DeletionReport, MediaDeletion};
