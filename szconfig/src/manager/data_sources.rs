//! Data source registration (`CFG_DSRC`).

use serde_json::{Value, json};

use super::{
    ConfigManager, choose_id, delete_cascading, int_field, require, required_code, row_from, row_id,
    text_field,
};
use crate::{
    error::{ConfigError, Result},
    schema::{CFG_DSRC, USER_ID_SEED},
    store::{Record, RecordKey},
    translate::{EntityKind, Translator},
};

/// Data sources shipped with every configuration. They cannot be deleted.
const PROTECTED_IDS: [i64; 2] = [1, 2];

const RETENTION_LEVELS: [&str; 2] = ["Remember", "Forget"];

/// Data source operations on a loaded configuration.
pub struct DataSources<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> DataSources<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    /// Every data source in user-facing form.
    pub fn list(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        let translator = Translator::new(store);
        Ok(translator.to_external_list(EntityKind::DataSource, store.rows(CFG_DSRC)))
    }

    pub fn get(&mut self, key: &RecordKey) -> Result<Record> {
        let store = self.manager.get_config_data()?;
        let row = require(store, CFG_DSRC, "DSRC_ID", "DSRC_CODE", key)?;
        Ok(Translator::new(store).to_external(EntityKind::DataSource, row))
    }

    /// Register `code` with default settings. Returns the new `DSRC_ID`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Duplicate`] when the upper-cased code exists.
    pub fn add_data_source(&mut self, code: &str) -> Result<i64> {
        let mut record = Record::new();
        record.insert("dataSource".into(), Value::from(code));
        self.add_data_source_json(&record)
    }

    /// Register a data source from `{"dataSource", "id", "description",
    /// "retentionLevel"}`. Only `dataSource` is required.
    pub fn add_data_source_json(&mut self, record: &Record) -> Result<i64> {
        let code = required_code(record, "dataSource")?;
        let retention = match text_field(record, "retentionLevel") {
            Some(level) => RETENTION_LEVELS
                .iter()
                .find(|l| l.eq_ignore_ascii_case(&level))
                .copied()
                .ok_or_else(|| ConfigError::invalid(format!("invalid retentionLevel: {level}")))?,
            None => RETENTION_LEVELS[0],
        };
        let description = text_field(record, "description").unwrap_or_else(|| code.clone());
        let requested = int_field(record, "id")?;

        self.manager.mutate(|store| {
            if store.get_record(CFG_DSRC, "DSRC_CODE", code.as_str()).is_some() {
                return Err(ConfigError::duplicate("data source", &code));
            }
            let id = choose_id(store, CFG_DSRC, "DSRC_ID", requested, USER_ID_SEED)?;
            store.add_record(
                CFG_DSRC,
                row_from(json!({
                    "DSRC_ID": id,
                    "DSRC_CODE": code,
                    "DSRC_DESC": description,
                    "DSRC_RELY": 1,
                    "RETENTION_LEVEL": retention,
                    "CONVERSATIONAL": "No",
                })),
            );
            info!("added data source {code} ({id})");
            Ok(id)
        })
    }

    /// Remove a data source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for the built-in `TEST` and
    /// `SEARCH` sources.
    pub fn delete_data_source(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_DSRC, "DSRC_ID", "DSRC_CODE", key)?;
            let id = row_id(row, "DSRC_ID")?;
            if PROTECTED_IDS.contains(&id) {
                return Err(ConfigError::invalid(format!(
                    "data source {key} is built in and cannot be deleted"
                )));
            }
            delete_cascading(store, CFG_DSRC, &[("DSRC_ID", Value::from(id))], &key.to_string())?;
            info!("deleted data source {key}");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn manager() -> ConfigManager {
        let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn test_add_assigns_user_ids() {
        let mut manager = manager();
        let first = manager.data_sources().add_data_source("customer").unwrap();
        let second = manager.data_sources().add_data_source("WATCHLIST").unwrap();
        assert_eq!((first, second), (1000, 1001));

        let customer = manager.data_sources().get(&RecordKey::parse("CUSTOMER")).unwrap();
        assert_eq!(customer["dataSource"], "CUSTOMER");
        assert_eq!(customer["retentionLevel"], "Remember");
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut manager = manager();
        manager.data_sources().add_data_source("CUSTOMER").unwrap();
        let err = manager.data_sources().add_data_source("Customer").unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { .. }));
        assert_eq!(manager.data_sources().list().unwrap().len(), 3);
    }

    #[test]
    fn test_builtin_sources_are_protected() {
        let mut manager = manager();
        assert!(manager.data_sources().delete_data_source(&RecordKey::parse("TEST")).is_err());
        assert!(manager.data_sources().delete_data_source(&RecordKey::parse("2")).is_err());

        manager.data_sources().add_data_source("CUSTOMER").unwrap();
        manager.data_sources().delete_data_source(&RecordKey::parse("CUSTOMER")).unwrap();
        let err = manager.data_sources().get(&RecordKey::parse("CUSTOMER")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_retention_level_validated() {
        let mut manager = manager();
        let record = serde_json::json!({"dataSource": "X", "retentionLevel": "sometimes"});
        let record = record.as_object().unwrap();
        assert!(manager.data_sources().add_data_source_json(record).is_err());
    }
}
