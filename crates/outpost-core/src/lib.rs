//! Outpost core — registry engine for remote entities.
//!
//! Tracks metadata about named remote hosts/services across two persisted
//! collections: a **static registry** (canonical, version-controlled, no
//! live network coordinates) and a **dynamic registry** (local-only,
//! carrying live url/port and the currently selected entity). The
//! [`EntityManager`] loads both lazily, repairs entries against a template,
//! mirrors the static collection into the dynamic one while preserving live
//! coordinates, and writes back only what actually changed.
//!
//! # Example
//!
//! ```rust,ignore
//! use outpost_core::{EntityManager, EntityRecord};
//!
//! fn main() -> outpost_core::Result<()> {
//!     let mut manager = EntityManager::new("/path/to/project/config");
//!     manager.create(EntityRecord {
//!         id: "buildbox".to_string(),
//!         label: "Build box".to_string(),
//!         ..Default::default()
//!     })?;
//!     manager.set_active("buildbox")?;
//!     let active = manager.active_entity()?;
//!     println!("active entity: {} ({})", active.id, active.label);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod entity;
pub mod error;
pub mod manager;
pub mod registry;
pub mod shell;
pub mod store;
pub mod tunnel;

// Re-export commonly used types
pub use archive::{ArchiveDevice, ArchiveEntry, FileArchive};
pub use entity::{EntityRecord, OsType};
pub use error::{OutpostError, Result};
pub use manager::{EntityManager, DYNAMIC_REGISTRY_NAME, STATIC_REGISTRY_NAME};
pub use registry::RegistryCollection;
pub use shell::ssh_script;
pub use store::RegistryStore;
pub use tunnel::{
    overlay_tunnel, parse_tunnel_list, TunnelEndpoint, TunnelProvider, TunnelTable,
};
