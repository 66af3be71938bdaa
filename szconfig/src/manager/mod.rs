//! Session lifecycle and per-domain configuration services.
//!
//! [`ConfigManager`] owns the configuration resident in a session. It loads
//! documents from a [`ConfigBackend`], routes every edit back through the
//! backend's validation, tracks whether the session has unsaved changes and
//! registers new configurations on save.
//!
//! Edits are made through short-lived service views that borrow the manager:
//!
//! ```rust,no_run
//! # use szconfig::{backend::MemoryBackend, ConfigManager, RecordKey};
//! let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
//! manager.initialize()?;
//! manager.features().add_feature("PASSPORT")?;
//! let passport = manager.features().get(&RecordKey::from("PASSPORT"))?;
//! # Ok::<(), szconfig::ConfigError>(())
//! ```
//!
//! ## Modules
//!
//! - [`attributes`] - Attribute mapping
//! - [`calls`] - Function calls and their element lists
//! - [`data_sources`] - Data source registration
//! - [`elements`] - Feature elements
//! - [`features`] - Features, their elements and templates
//! - [`functions`] - Function registrations and comparison thresholds
//! - [`rules`] - Resolution rules and fragments
//! - [`scoring`] - Generic plans, thresholds and behavior overrides
//! - [`system`] - System parameters, sections, versions and reference codes

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde_json::Value;

use crate::{
    backend::ConfigBackend,
    error::{ConfigError, Result},
    schema::{self, FunctionKind, OnDelete},
    store::{Record, RecordKey, RecordStore, Row, value_as_i64, value_to_string, values_match},
    translate::{is_yes, lookup, yes_no},
};

pub mod attributes;
pub mod calls;
pub mod data_sources;
pub mod elements;
pub mod features;
pub mod functions;
pub mod rules;
pub mod scoring;
pub mod system;

use attributes::Attributes;
use calls::Calls;
use data_sources::DataSources;
use elements::Elements;
use features::Features;
use functions::{ComparisonThresholds, Functions};
use rules::Rules;
use scoring::Scoring;
use system::System;

/// Where a session stands relative to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing is loaded.
    Uninitialized,
    /// The resident document matches `current_config_id`.
    Loaded,
    /// The resident document has unsaved edits.
    Dirty,
}

/// Owner of the configuration resident in one session.
pub struct ConfigManager {
    backend: Box<dyn ConfigBackend>,
    state: SessionState,
    current_config_id: Option<i64>,
    /// Normalized document as last accepted by the backend.
    config_handle: Option<String>,
    json_cache: Option<String>,
    data_cache: Option<RecordStore>,
}

impl ConfigManager {
    /// Wrap a backend. Nothing is loaded until [`ConfigManager::initialize`]
    /// or [`ConfigManager::load_config`] is called.
    pub fn new(backend: Box<dyn ConfigBackend>) -> Self {
        Self {
            backend,
            state: SessionState::Uninitialized,
            current_config_id: None,
            config_handle: None,
            json_cache: None,
            data_cache: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.config_handle.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.state == SessionState::Dirty
    }

    /// ID of the configuration the session was loaded from or last saved as.
    pub fn current_config_id(&self) -> Option<i64> {
        self.current_config_id
    }

    /// Load the default configuration, creating one from the template when
    /// the repository has none.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the repository cannot be read or
    /// written.
    pub fn initialize(&mut self) -> Result<()> {
        let mut config_id = self.backend.get_default_config_id()?;
        if config_id == 0 {
            info!("no default configuration registered, creating one from the template");
            let template = self.backend.create_config_from_template()?;
            config_id = self.backend.register_config(&template, "Default configuration")?;
            self.backend.set_default_config_id(config_id)?;
        }
        self.load_config(Some(config_id))?;
        Ok(())
    }

    /// Replace the resident document with a registered configuration.
    ///
    /// `None` loads the default configuration. Unsaved edits are discarded.
    pub fn load_config(&mut self, config_id: Option<i64>) -> Result<i64> {
        let config_id = match config_id {
            Some(id) => id,
            None => self.backend.get_default_config_id()?,
        };
        if config_id == 0 {
            return Err(ConfigError::Backend(
                "no default configuration is registered".into(),
            ));
        }

        let handle = self
            .backend
            .export_config(config_id)
            .and_then(|json| self.backend.create_config_from_json(&json))
            .inspect_err(|e| error!("failed to load configuration {config_id}: {e}"))?;

        if self.is_dirty() {
            warn!("discarding unsaved changes");
        }
        self.config_handle = Some(handle);
        self.invalidate_caches();
        self.current_config_id = Some(config_id);
        self.state = SessionState::Loaded;
        info!("loaded configuration {config_id}");
        Ok(config_id)
    }

    /// Reload the configuration the session started from.
    pub fn reload_config(&mut self) -> Result<i64> {
        self.load_config(self.current_config_id)
    }

    /// Register the resident document as a new configuration and make it the
    /// default. Returns the new configuration ID.
    pub fn save_config(&mut self, comment: &str) -> Result<i64> {
        let json = self.export_json()?;
        let config_id = self
            .backend
            .register_config(&json, comment)
            .and_then(|id| self.backend.set_default_config_id(id).map(|_| id))
            .inspect_err(|e| error!("failed to save configuration: {e}"))?;
        self.current_config_id = Some(config_id);
        self.state = SessionState::Loaded;
        info!("saved configuration {config_id}: {comment}");
        Ok(config_id)
    }

    /// Drop the resident document. Never fails.
    pub fn close(&mut self) {
        if self.is_dirty() {
            warn!("closing with unsaved changes");
        }
        self.config_handle = None;
        self.invalidate_caches();
        self.current_config_id = None;
        self.state = SessionState::Uninitialized;
        debug!("configuration session closed");
    }

    pub fn get_default_config_id(&self) -> Result<i64> {
        self.backend.get_default_config_id()
    }

    /// Rows of the repository registry, oldest first.
    pub fn get_config_registry(&self) -> Result<Vec<Record>> {
        let registry: Value = serde_json::from_str(&self.backend.get_config_registry()?)?;
        Ok(registry
            .get("CONFIGS")
            .and_then(Value::as_array)
            .map(|configs| {
                configs
                    .iter()
                    .filter_map(|c| c.as_object().cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn invalidate_caches(&mut self) {
        self.json_cache = None;
        self.data_cache = None;
    }

    /// JSON export of the resident document, cached until the next edit.
    pub fn export_json(&mut self) -> Result<String> {
        if self.json_cache.is_none() {
            let handle = self.config_handle.as_ref().ok_or(ConfigError::NotLoaded)?;
            self.json_cache = Some(handle.clone());
        }
        self.json_cache.clone().ok_or(ConfigError::NotLoaded)
    }

    /// The parsed resident document, cached until the next edit.
    pub fn get_config_data(&mut self) -> Result<&RecordStore> {
        if self.data_cache.is_none() {
            let json = self.export_json()?;
            self.data_cache = Some(RecordStore::from_json(&json)?);
        }
        self.data_cache.as_ref().ok_or(ConfigError::NotLoaded)
    }

    /// Replace the resident document with an edited copy.
    ///
    /// The copy goes through the backend's validation first; on success both
    /// caches are dropped and the session becomes dirty.
    pub fn update_config_data(&mut self, store: &RecordStore) -> Result<()> {
        if self.config_handle.is_none() {
            return Err(ConfigError::NotLoaded);
        }
        let handle = self
            .backend
            .create_config_from_json(&store.to_json()?)
            .inspect_err(|e| warn!("configuration update rejected: {e}"))?;
        self.config_handle = Some(handle);
        self.invalidate_caches();
        self.state = SessionState::Dirty;
        Ok(())
    }

    /// Apply `change` to a copy of the document and commit it when it
    /// succeeds. A failed change leaves the session untouched.
    pub fn mutate<T>(&mut self, change: impl FnOnce(&mut RecordStore) -> Result<T>) -> Result<T> {
        let mut working = self.get_config_data()?.clone();
        let out = change(&mut working)?;
        self.update_config_data(&working)?;
        Ok(out)
    }

    /// Write the resident document to `path` as pretty JSON.
    pub fn export_config_to_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.get_config_data()?.to_json_pretty()?;
        fs::write(path, text)
            .inspect_err(|e| error!("failed to export to {}: {e}", path.display()))?;
        info!("exported configuration to {}", path.display());
        Ok(())
    }

    /// Replace the resident document with the contents of `path`.
    ///
    /// The session is dirty afterwards: the imported document is not
    /// registered until it is saved.
    pub fn import_config_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .inspect_err(|e| error!("failed to read {}: {e}", path.display()))?;
        let handle = self
            .backend
            .create_config_from_json(&text)
            .inspect_err(|e| error!("{} is not a valid configuration: {e}", path.display()))?;
        self.config_handle = Some(handle);
        self.invalidate_caches();
        self.state = SessionState::Dirty;
        info!("imported configuration from {}", path.display());
        Ok(())
    }

    /// Keep records with any value containing `expression`, ignoring case.
    pub fn apply_filter(records: Vec<Record>, expression: &str) -> Vec<Record> {
        let needle = expression.trim().to_lowercase();
        if needle.is_empty() {
            return records;
        }
        records
            .into_iter()
            .filter(|record| {
                record
                    .values()
                    .any(|v| value_to_string(v).to_lowercase().contains(&needle))
            })
            .collect()
    }

    // Fail-soft access to raw tables. Failures are logged and reported as
    // `None`, `false` or an empty list.

    pub fn get_record(&mut self, table: &str, field: &str, value: impl Into<Value>) -> Option<Row> {
        let store = self.loaded_store()?;
        store.get_record(table, field, value).cloned()
    }

    pub fn get_record_by_fields(&mut self, table: &str, fields: &[(&str, Value)]) -> Option<Row> {
        let store = self.loaded_store()?;
        store.get_record_by_fields(table, fields).cloned()
    }

    pub fn get_record_list(&mut self, table: &str, filter: Option<(&str, Value)>) -> Vec<Row> {
        match self.loaded_store() {
            Some(store) => store.get_record_list(table, filter).into_iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn add_record(&mut self, table: &str, row: Row) -> bool {
        self.mutate(|store| {
            store.add_record(table, row);
            Ok(())
        })
        .inspect_err(|e| warn!("add to {table} failed: {e}"))
        .is_ok()
    }

    pub fn update_record(&mut self, table: &str, field: &str, value: impl Into<Value>, new_row: Row) -> bool {
        let value = value.into();
        self.mutate(|store| {
            if store.update_record(table, field, value.clone(), new_row) {
                Ok(())
            } else {
                Err(ConfigError::not_found(schema::entity_name(table), value_to_string(&value)))
            }
        })
        .inspect_err(|e| warn!("update of {table} failed: {e}"))
        .is_ok()
    }

    pub fn delete_record(&mut self, table: &str, field: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.mutate(|store| {
            if store.delete_record(table, field, value.clone()) {
                Ok(())
            } else {
                Err(ConfigError::not_found(schema::entity_name(table), value_to_string(&value)))
            }
        })
        .inspect_err(|e| warn!("delete from {table} failed: {e}"))
        .is_ok()
    }

    /// Whether any row references the `table` row whose `field` equals
    /// `value` through a declared foreign key.
    pub fn has_dependents(&mut self, table: &str, field: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let Some(store) = self.loaded_store() else {
            return false;
        };
        let Some(parent) = store.get_record(table, field, value) else {
            return false;
        };
        schema::references_to(table).any(|fk| {
            parent.get(fk.parent_field).filter(|v| !v.is_null()).is_some_and(|target| {
                store
                    .get_record_list(fk.table, None)
                    .into_iter()
                    .any(|row| row.get(fk.field).is_some_and(|v| values_match(v, target)))
            })
        })
    }

    /// Next free ID in `table`; `None` when nothing is loaded or the IDs
    /// are exhausted.
    pub fn get_next_id(&mut self, table: &str, id_field: &str, seed: i64) -> Option<i64> {
        self.loaded_store()?
            .get_next_id(table, id_field, seed)
            .inspect_err(|e| warn!("no free ID in {table}: {e}"))
            .ok()
    }

    fn loaded_store(&mut self) -> Option<&RecordStore> {
        self.get_config_data()
            .inspect_err(|e| warn!("configuration unavailable: {e}"))
            .ok()
    }

    pub fn data_sources(&mut self) -> DataSources<'_> {
        DataSources::new(self)
    }

    pub fn features(&mut self) -> Features<'_> {
        Features::new(self)
    }

    pub fn attributes(&mut self) -> Attributes<'_> {
        Attributes::new(self)
    }

    pub fn elements(&mut self) -> Elements<'_> {
        Elements::new(self)
    }

    pub fn functions(&mut self, kind: FunctionKind) -> Functions<'_> {
        Functions::new(self, kind)
    }

    pub fn comparison_thresholds(&mut self) -> ComparisonThresholds<'_> {
        ComparisonThresholds::new(self)
    }

    pub fn calls(&mut self, kind: FunctionKind) -> Calls<'_> {
        Calls::new(self, kind)
    }

    pub fn rules(&mut self) -> Rules<'_> {
        Rules::new(self)
    }

    pub fn scoring(&mut self) -> Scoring<'_> {
        Scoring::new(self)
    }

    pub fn system(&mut self) -> System<'_> {
        System::new(self)
    }
}

/// Look up a row by ID or code, failing with `NotFound`.
pub(crate) fn require<'s>(
    store: &'s RecordStore,
    table: &str,
    id_field: &str,
    code_field: &str,
    key: &RecordKey,
) -> Result<&'s Row> {
    store
        .find(table, id_field, code_field, key)
        .ok_or_else(|| ConfigError::not_found(schema::entity_name(table), key))
}

/// Unwrap a `json!` object literal into a row.
pub(crate) fn row_from(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

/// Integer column of a row.
pub(crate) fn row_id(row: &Row, field: &str) -> Result<i64> {
    row.get(field)
        .and_then(value_as_i64)
        .ok_or_else(|| ConfigError::invalid(format!("row has no numeric {field}")))
}

/// Trimmed, non-empty text field of a user record.
pub(crate) fn text_field(record: &Record, name: &str) -> Option<String> {
    lookup(record, name)
        .map(value_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Yes/No field of a user record.
pub(crate) fn flag_field(record: &Record, name: &str, default: bool) -> Value {
    yes_no(lookup(record, name).map_or(default, is_yes))
}

/// Upper-cased code field of a user record, failing when absent.
pub(crate) fn required_code(record: &Record, name: &str) -> Result<String> {
    text_field(record, name)
        .map(|s| s.to_uppercase())
        .ok_or_else(|| ConfigError::invalid(format!("{name} is required")))
}

/// Integer field of a user record.
pub(crate) fn int_field(record: &Record, name: &str) -> Result<Option<i64>> {
    match lookup(record, name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => value_as_i64(v)
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(format!("{name} must be an integer"))),
    }
}

/// Use the caller's ID when given and free, otherwise allocate one.
pub(crate) fn choose_id(
    store: &RecordStore,
    table: &str,
    id_field: &str,
    requested: Option<i64>,
    seed: i64,
) -> Result<i64> {
    match requested {
        Some(id) if id > 0 => {
            if store.get_record(table, id_field, id).is_some() {
                Err(ConfigError::duplicate(schema::entity_name(table), id))
            } else {
                Ok(id)
            }
        }
        _ => store.get_next_id(table, id_field, seed),
    }
}

/// Delete the first row of `table` matching `fields`, cascading and
/// restricting according to the declared foreign keys.
///
/// The whole closure of cascaded rows is collected first. Restricted
/// references from rows that are themselves being deleted do not block.
/// Returns the number of rows removed, the target included.
pub(crate) fn delete_cascading(
    store: &mut RecordStore,
    table: &'static str,
    fields: &[(&str, Value)],
    key: &str,
) -> Result<usize> {
    let entity = schema::entity_name(table);
    let root = store
        .indexed_rows(table)
        .find(|(_, row)| {
            fields
                .iter()
                .all(|(f, v)| row.get(*f).is_some_and(|x| values_match(x, v)))
        })
        .map(|(i, _)| i)
        .ok_or_else(|| ConfigError::not_found(entity, key))?;

    let mut doomed: BTreeMap<&'static str, BTreeSet<usize>> = BTreeMap::new();
    doomed.entry(table).or_default().insert(root);
    let mut pending = vec![(table, root)];
    let mut blockers: Vec<(&'static str, usize)> = Vec::new();

    while let Some((parent_table, index)) = pending.pop() {
        let Some(parent) = store
            .indexed_rows(parent_table)
            .find(|(i, _)| *i == index)
            .map(|(_, row)| row.clone())
        else {
            continue;
        };
        for fk in schema::references_to(parent_table) {
            let Some(target) = parent.get(fk.parent_field).filter(|v| !v.is_null()) else {
                continue;
            };
            for (child, row) in store.indexed_rows(fk.table) {
                if !row.get(fk.field).is_some_and(|v| values_match(v, target)) {
                    continue;
                }
                match fk.on_delete {
                    OnDelete::Cascade => {
                        if doomed.entry(fk.table).or_default().insert(child) {
                            pending.push((fk.table, child));
                        }
                    }
                    OnDelete::Restrict => blockers.push((fk.table, child)),
                }
            }
        }
    }

    blockers.retain(|(t, i)| !doomed.get(t).is_some_and(|set| set.contains(i)));
    if let Some((blocking_table, _)) = blockers.first().copied() {
        let count = blockers.iter().filter(|(t, _)| *t == blocking_table).count();
        return Err(ConfigError::HasDependents {
            entity,
            key: key.to_string(),
            table: blocking_table,
            count,
        });
    }

    let mut removed = 0;
    for (t, positions) in &doomed {
        let positions: Vec<usize> = positions.iter().copied().collect();
        removed += store.remove_rows(t, &positions);
    }
    debug!("deleted {entity} {key} and {} dependent row(s)", removed.saturating_sub(1));
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backend::MemoryBackend;

    fn manager() -> ConfigManager {
        let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn test_lifecycle_states() {
        let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
        assert_eq!(manager.state(), SessionState::Uninitialized);
        assert!(matches!(manager.get_config_data(), Err(ConfigError::NotLoaded)));

        manager.initialize().unwrap();
        assert_eq!(manager.state(), SessionState::Loaded);
        assert_eq!(manager.current_config_id(), Some(1));

        let mut row = Row::new();
        row.insert("SPARM_CODE".into(), json!("X"));
        assert!(manager.add_record("CFG_SPARM", row));
        assert!(manager.is_dirty());

        let saved = manager.save_config("test").unwrap();
        assert_eq!(saved, 2);
        assert_eq!(manager.state(), SessionState::Loaded);
        assert_eq!(manager.get_default_config_id().unwrap(), 2);

        manager.close();
        assert_eq!(manager.state(), SessionState::Uninitialized);
        assert!(!manager.add_record("CFG_SPARM", Row::new()));
    }

    #[test]
    fn test_reload_discards_edits() {
        let mut manager = manager();
        assert!(manager.delete_record("CFG_DSRC", "DSRC_CODE", "TEST"));
        assert!(manager.get_record("CFG_DSRC", "DSRC_CODE", "TEST").is_none());

        manager.reload_config().unwrap();
        assert!(!manager.is_dirty());
        assert!(manager.get_record("CFG_DSRC", "DSRC_CODE", "TEST").is_some());
    }

    #[test]
    fn test_failed_mutation_leaves_document() {
        let mut manager = manager();
        let before = manager.get_config_data().unwrap().clone();
        let result: Result<()> = manager.mutate(|store| {
            store.delete_record("CFG_DSRC", "DSRC_ID", 1);
            Err(ConfigError::invalid("abort"))
        });
        assert!(result.is_err());
        assert_eq!(manager.get_config_data().unwrap(), &before);
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_cascade_and_restrict() {
        let mut manager = manager();
        let mut store = manager.get_config_data().unwrap().clone();

        // SSN_LAST4 is produced by an expression call on SSN.
        let err = delete_cascading(&mut store, "CFG_FTYPE", &[("FTYPE_CODE", json!("SSN_LAST4"))], "SSN_LAST4")
            .unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { table: "CFG_EFCALL", .. }));

        // Attributes restrict deleting their feature.
        let err = delete_cascading(&mut store, "CFG_FTYPE", &[("FTYPE_CODE", json!("PHONE"))], "PHONE")
            .unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { table: "CFG_ATTR", count: 1, .. }));

        store.delete_record("CFG_ATTR", "ATTR_CODE", "PHONE_NUMBER");
        let removed = delete_cascading(&mut store, "CFG_FTYPE", &[("FTYPE_CODE", json!("PHONE"))], "PHONE")
            .unwrap();
        // feature, FBOM row, standardize call, comparison call and its BOM row
        assert_eq!(removed, 5);
        assert!(store.get_record("CFG_CFCALL", "CFCALL_ID", 4).is_none());
        assert!(store.get_record("CFG_CFBOM", "CFCALL_ID", 4).is_none());
    }

    #[test]
    fn test_has_dependents() {
        let mut manager = manager();
        assert!(manager.has_dependents("CFG_FTYPE", "FTYPE_CODE", "PHONE"));
        assert!(!manager.has_dependents("CFG_FTYPE", "FTYPE_CODE", "NOT_A_FEATURE"));

        manager.features().add_feature("MY_FEATURE").unwrap();
        assert!(!manager.has_dependents("CFG_FTYPE", "FTYPE_CODE", "MY_FEATURE"));
    }

    #[test]
    fn test_apply_filter_ignores_case() {
        let records = vec![
            json!({"dataSource": "CUSTOMER"}).as_object().cloned().unwrap(),
            json!({"dataSource": "WATCHLIST"}).as_object().cloned().unwrap(),
        ];
        let kept = ConfigManager::apply_filter(records, "cust");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["dataSource"], "CUSTOMER");
    }
}
