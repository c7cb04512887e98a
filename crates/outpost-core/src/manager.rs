//! The reconciliation engine over the static and dynamic registries.
//!
//! Two files coexist per project configuration directory:
//!
//! - **Static registry** (`entity_map.json`): the known remote entities
//!   without the fields that change frequently (live url/port, the active
//!   entity id). Tracked by git.
//! - **Dynamic registry** (`.entity_map.json`): the local mirror of the
//!   static registry, enriched with live network coordinates and the active
//!   entity id. Not tracked by git.
//!
//! Both are loaded lazily on first access. The load runs a fix-up pass that
//! repairs entries against the template, rebuilds the dynamic mirror from
//! the static map while preserving live coordinates, clears a dangling
//! active pointer, and flushes whichever collection actually changed.

use crate::entity::EntityRecord;
use crate::error::{OutpostError, Result};
use crate::registry::RegistryCollection;
use crate::store::RegistryStore;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// File name of the static registry, meant to be version-controlled.
pub const STATIC_REGISTRY_NAME: &str = "entity_map.json";

/// File name of the dynamic registry, local-only.
pub const DYNAMIC_REGISTRY_NAME: &str = ".entity_map.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Engine owning both in-memory collections. All mutation of the registry
/// files goes through this type; collaborators never touch the files
/// directly.
#[derive(Debug)]
pub struct EntityManager {
    static_store: RegistryStore,
    dynamic_store: RegistryStore,
    static_reg: RegistryCollection,
    dynamic_reg: RegistryCollection,
    state: LoadState,
}

impl EntityManager {
    /// Create an engine over the registry files in `config_dir`. Nothing is
    /// read until the first operation.
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        let dir = config_dir.as_ref();
        Self {
            static_store: RegistryStore::new(dir.join(STATIC_REGISTRY_NAME), true).with_backup(),
            dynamic_store: RegistryStore::new(dir.join(DYNAMIC_REGISTRY_NAME), false),
            static_reg: RegistryCollection::default(),
            dynamic_reg: RegistryCollection::default(),
            state: LoadState::Unloaded,
        }
    }

    /// Suppress all registry writes; reads and fix-up still run in memory.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.static_store.set_dry_run(dry_run);
        self.dynamic_store.set_dry_run(dry_run);
        self
    }

    // ========================================
    // Operations
    // ========================================

    /// Look up an entity definition by id in the static map. Does not
    /// mutate either collection (beyond the one-time lazy load).
    pub fn entity(&mut self, id: &str) -> Result<Option<EntityRecord>> {
        if id.is_empty() {
            return Err(OutpostError::InvalidId { id: id.to_string() });
        }
        self.ensure_loaded()?;
        Ok(self.static_reg.get(id).cloned())
    }

    /// Known entity ids.
    pub fn ids(&mut self) -> Result<Vec<String>> {
        self.ensure_loaded()?;
        Ok(self.static_reg.ids())
    }

    /// The raw active-entity pointer; empty when none is selected.
    pub fn active_entity_id(&mut self) -> Result<String> {
        self.ensure_loaded()?;
        Ok(self.dynamic_reg.active_entity.clone())
    }

    /// Resolve the active entity in the dynamic map, so callers get the
    /// live coordinates along with the definition.
    pub fn active_entity(&mut self) -> Result<EntityRecord> {
        self.ensure_loaded()?;
        let id = self.dynamic_reg.active_entity.clone();
        if id.is_empty() {
            return Err(OutpostError::NoActiveEntity);
        }
        self.dynamic_reg
            .get(&id)
            .cloned()
            .ok_or(OutpostError::NoActiveEntity)
    }

    /// Select the active entity and flush the dynamic registry.
    pub fn set_active(&mut self, id: &str) -> Result<()> {
        self.ensure_loaded()?;
        if !self.static_reg.contains(id) {
            return Err(OutpostError::EntityNotFound { id: id.to_string() });
        }
        self.dynamic_reg.active_entity = id.to_string();
        self.flush_changes()
    }

    /// Insert a new entity. The record is default-filled from the static
    /// template; the static copy is scrubbed of live coordinates, the
    /// dynamic copy keeps the record's own (or the dynamic template's).
    pub fn create(&mut self, record: EntityRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(OutpostError::InvalidId { id: record.id });
        }
        self.ensure_loaded()?;
        let id = record.id.clone();
        if self.static_reg.contains(&id) {
            return Err(OutpostError::DuplicateEntity { id });
        }
        debug!(id = %id, "creating entity");

        let fixed = record.apply_defaults(&id, &self.static_reg.entity_template);
        let mut live = fixed.clone();
        if live.url.is_empty() {
            live.url = self.dynamic_reg.entity_template.url.clone();
        }
        if live.port == 0 {
            live.port = self.dynamic_reg.entity_template.port;
        }

        self.static_reg.entity_map.insert(id.clone(), fixed.scrubbed());
        self.dynamic_reg.entity_map.insert(id, live);
        self.flush_changes()
    }

    /// Upsert an entity. The merge template is the current dynamic entry if
    /// one exists, otherwise the static template tagged with the target id.
    /// A merge that equals the prior dynamic entry performs no writes.
    pub fn update_entity(&mut self, record: EntityRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(OutpostError::InvalidId { id: record.id });
        }
        self.ensure_loaded()?;
        let id = record.id.clone();

        let prior = self.dynamic_reg.get(&id).cloned();
        let merge_template = match &prior {
            Some(entry) => entry.clone(),
            None => self.static_reg.entity_template.clone().with_id(&id),
        };
        debug!(
            id = %id,
            action = if prior.is_some() { "modified" } else { "added" },
            "updating entity"
        );

        let mut merged = record.apply_defaults(&id, &merge_template);
        if merged.url.is_empty() {
            merged.url = merge_template.url.clone();
        }
        if merged.port == 0 {
            merged.port = merge_template.port;
        }

        if prior.as_ref() == Some(&merged) {
            debug!(id = %id, "entity unchanged, skipping write");
            return Ok(());
        }

        self.dynamic_reg.entity_map.insert(id.clone(), merged.clone());
        self.static_reg.entity_map.insert(id, merged.scrubbed());
        self.flush_changes()
    }

    // ========================================
    // Lazy load and fix-up
    // ========================================

    fn ensure_loaded(&mut self) -> Result<()> {
        match self.state {
            LoadState::Loaded => return Ok(()),
            LoadState::Loading => return Err(OutpostError::Reentrancy),
            LoadState::Unloaded => {}
        }
        self.state = LoadState::Loading;
        match self.load_and_fix() {
            Ok(()) => {
                self.state = LoadState::Loaded;
                Ok(())
            }
            Err(e) => {
                // Allow a retry after the caller repairs the file
                self.state = LoadState::Unloaded;
                Err(e)
            }
        }
    }

    fn load_and_fix(&mut self) -> Result<()> {
        debug!("reading registries");
        self.static_reg = self.static_store.load()?;
        self.dynamic_reg = self.dynamic_store.load()?;
        self.fix_static();
        self.fix_dynamic();
        self.flush_changes()
    }

    /// Rebuild every static entry against the template: force the map key
    /// as id, fill unset defaults, scrub live coordinates that must never
    /// reach the version-controlled file.
    fn fix_static(&mut self) {
        let template = self.static_reg.entity_template.scrubbed();
        if template != self.static_reg.entity_template {
            info!("scrubbed live coordinates from static template");
            self.static_reg.entity_template = template.clone();
        }

        let mut updated = BTreeMap::new();
        for (id, original) in &self.static_reg.entity_map {
            let fixed = original.apply_defaults(id, &template).scrubbed();
            if fixed != *original {
                info!(id = %id, "repaired static entity");
            }
            updated.insert(id.clone(), fixed);
        }
        self.static_reg.entity_map = updated;
    }

    /// Recompute the dynamic mirror of the static map. The static map is
    /// authoritative for the set of known ids; live url/port come from the
    /// pre-existing dynamic entry, or from the dynamic template for a
    /// brand-new entry.
    fn fix_dynamic(&mut self) {
        let mut mirrored = BTreeMap::new();
        for (id, static_entry) in &self.static_reg.entity_map {
            let prior = match self.dynamic_reg.get(id) {
                Some(entry) => entry.clone(),
                None => {
                    info!(id = %id, "adding dynamic entry");
                    self.dynamic_reg.entity_template.clone()
                }
            };
            let rebuilt = static_entry.clone().with_live(prior.url, prior.port);
            mirrored.insert(id.clone(), rebuilt);
        }

        for id in self.dynamic_reg.entity_map.keys() {
            if !mirrored.contains_key(id) {
                info!(id = %id, "dropping dynamic entry with no static counterpart");
            }
        }
        self.dynamic_reg.entity_map = mirrored;

        let active = self.dynamic_reg.active_entity.clone();
        if !active.is_empty() && !self.dynamic_reg.contains(&active) {
            warn!(id = %active, "clearing active entity that no longer resolves");
            self.dynamic_reg.active_entity = String::new();
        }
    }

    /// Flush whichever collection differs from its last-persisted snapshot.
    fn flush_changes(&mut self) -> Result<()> {
        if self.static_store.flush_if_changed(&self.static_reg)? {
            debug!("flushed static registry");
        }
        if self.dynamic_store.flush_if_changed(&self.dynamic_reg)? {
            debug!("flushed dynamic registry");
        }
        Ok(())
    }
}
