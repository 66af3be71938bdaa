//! Feature elements (`CFG_FELEM`).

use serde_json::{Value, json};

use super::{
    ConfigManager, choose_id, delete_cascading, flag_field, int_field, require, required_code, row_from,
    row_id, text_field,
};
use crate::{
    error::{ConfigError, Result},
    schema::{CFG_FELEM, USER_ID_SEED},
    store::{Record, RecordKey, RecordStore},
    translate::{EntityKind, Translator},
};

const DATA_TYPES: [&str; 5] = ["string", "number", "date", "datetime", "json"];

/// Element operations on a loaded configuration.
pub struct Elements<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> Elements<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    pub fn list(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Element, store.rows(CFG_FELEM)))
    }

    pub fn get(&mut self, key: &RecordKey) -> Result<Record> {
        let store = self.manager.get_config_data()?;
        let row = require(store, CFG_FELEM, "FELEM_ID", "FELEM_CODE", key)?;
        Ok(Translator::new(store).to_external(EntityKind::Element, row))
    }

    /// Add an element with the default `string` data type.
    pub fn add_element(&mut self, code: &str) -> Result<i64> {
        let mut record = Record::new();
        record.insert("element".into(), Value::from(code));
        self.add_element_json(&record)
    }

    /// Add an element from `{"element", "id", "description", "datatype",
    /// "tokenize"}`.
    pub fn add_element_json(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| insert_element(store, &record))
    }

    /// Remove an element no feature, attribute or call still uses.
    pub fn delete_element(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_FELEM, "FELEM_ID", "FELEM_CODE", key)?;
            let id = row_id(row, "FELEM_ID")?;
            delete_cascading(store, CFG_FELEM, &[("FELEM_ID", Value::from(id))], &key.to_string())?;
            info!("deleted element {key}");
            Ok(())
        })
    }
}

/// Insert an element row. Shared with feature creation, which adds missing
/// elements on the fly.
pub(crate) fn insert_element(store: &mut RecordStore, record: &Record) -> Result<i64> {
    let code = required_code(record, "element")?;
    if store.get_record(CFG_FELEM, "FELEM_CODE", code.as_str()).is_some() {
        return Err(ConfigError::duplicate("element", &code));
    }
    let datatype = text_field(record, "datatype")
        .map(|t| t.to_lowercase())
        .unwrap_or_else(|| DATA_TYPES[0].to_string());
    if !DATA_TYPES.contains(&datatype.as_str()) {
        return Err(ConfigError::invalid(format!(
            "invalid datatype {datatype}, expected one of {}",
            DATA_TYPES.join(", ")
        )));
    }
    let tokenize = flag_field(record, "tokenize", false);
    let id = choose_id(store, CFG_FELEM, "FELEM_ID", int_field(record, "id")?, USER_ID_SEED)?;
    store.add_record(
        CFG_FELEM,
        row_from(json!({
            "FELEM_ID": id,
            "FELEM_CODE": code,
            "FELEM_DESC": text_field(record, "description").unwrap_or_else(|| code.clone()),
            "TOKENIZE": tokenize,
            "DATA_TYPE": datatype,
        })),
    );
    debug!("added element {code} ({id})");
    Ok(id)
}

/// `FELEM_ID` of an element code.
pub(crate) fn element_id(store: &RecordStore, code: &str) -> Result<i64> {
    let key = RecordKey::parse(code);
    let row = require(store, CFG_FELEM, "FELEM_ID", "FELEM_CODE", &key)?;
    row_id(row, "FELEM_ID")
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
    fn test_add_element_defaults() {
        let mut manager = manager();
        let id = manager.elements().add_element("acct_num").unwrap();
        assert_eq!(id, 1000);
        let element = manager.elements().get(&RecordKey::parse("ACCT_NUM")).unwrap();
        assert_eq!(element["datatype"], "string");
        assert_eq!(element["tokenize"], "No");
    }

    #[test]
    fn test_invalid_datatype() {
        let mut manager = manager();
        let record = json!({"element": "X", "datatype": "blob"});
        assert!(manager.elements().add_element_json(record.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_element_in_use_cannot_be_deleted() {
        let mut manager = manager();
        let err = manager.elements().delete_element(&RecordKey::parse("PHONE_NUM")).unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { .. }));

        manager.elements().add_element("UNUSED").unwrap();
        manager.elements().delete_element(&RecordKey::parse("UNUSED")).unwrap();
    }
}
