//! Function registrations and comparison thresholds.
//!
//! The four function families share one shape (`*FUNC_ID`, `*FUNC_CODE`,
//! `CONNECT_STR`, ...) and differ only in the tables they live in, so one
//! [`Functions`] view serves all of them, parameterised by [`FunctionKind`].

use serde_json::{Value, json};

use super::{
    ConfigManager, choose_id, delete_cascading, flag_field, int_field, require, required_code, row_from,
    row_id, text_field,
};
use crate::{
    error::{ConfigError, Result},
    manager::features::feature_ref,
    schema::{CFG_CFRTN, FunctionKind, USER_ID_SEED},
    store::{Record, RecordKey, RecordStore, Row},
    translate::{EntityKind, Translator},
};

/// Function operations of one family on a loaded configuration.
pub struct Functions<'m> {
    manager: &'m mut ConfigManager,
    kind: FunctionKind,
}

impl<'m> Functions<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager, kind: FunctionKind) -> Self {
        Self { manager, kind }
    }

    pub fn list(&mut self) -> Result<Vec<Record>> {
        let kind = self.kind;
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Function(kind), store.rows(kind.function_table())))
    }

    pub fn get(&mut self, key: &RecordKey) -> Result<Record> {
        let kind = self.kind;
        let store = self.manager.get_config_data()?;
        let row = require(store, kind.function_table(), kind.function_id(), kind.function_code(), key)?;
        Ok(Translator::new(store).to_external(EntityKind::Function(kind), row))
    }

    /// Register a function from `{"function", "connectStr", "description",
    /// "language", "anonSupport", "id"}`.
    ///
    /// An `id` of 0 or none allocates the next free ID.
    ///
    /// # Errors
    ///
    /// Fails when the code or the requested ID is taken, or `connectStr` is
    /// missing.
    pub fn add_function(&mut self, record: &Record) -> Result<i64> {
        let kind = self.kind;
        let code = required_code(record, "function")?;
        let connect = text_field(record, "connectStr")
            .ok_or_else(|| ConfigError::invalid("connectStr is required"))?;
        let description = text_field(record, "description").unwrap_or_else(|| code.clone());
        let language = text_field(record, "language").unwrap_or_else(|| "C".to_string());
        let anon = flag_field(record, "anonSupport", false);
        let requested = int_field(record, "id")?;

        self.manager.mutate(|store| {
            let table = kind.function_table();
            if store.get_record(table, kind.function_code(), code.as_str()).is_some() {
                return Err(ConfigError::duplicate(crate::schema::entity_name(table), &code));
            }
            let id = choose_id(store, table, kind.function_id(), requested, USER_ID_SEED)?;
            let mut row = Row::new();
            row.insert(kind.function_id().into(), Value::from(id));
            row.insert(kind.function_code().into(), Value::from(code.as_str()));
            row.insert(kind.function_desc().into(), Value::from(description));
            row.insert("CONNECT_STR".into(), Value::from(connect));
            row.insert("ANON_SUPPORT".into(), anon);
            row.insert("LANGUAGE".into(), Value::from(language));
            store.add_record(table, row);
            info!("added {} function {code} ({id})", kind.label());
            Ok(id)
        })
    }

    /// Remove a function no call uses. Comparison thresholds of a comparison
    /// function go with it.
    pub fn delete_function(&mut self, key: &RecordKey) -> Result<()> {
        let kind = self.kind;
        self.manager.mutate(|store| {
            let table = kind.function_table();
            let row = require(store, table, kind.function_id(), kind.function_code(), key)?;
            let id = row_id(row, kind.function_id())?;
            delete_cascading(store, table, &[(kind.function_id(), Value::from(id))], &key.to_string())?;
            info!("deleted {} function {key}", kind.label());
            Ok(())
        })
    }
}

/// ID of a function of `kind` given by code or ID.
pub(crate) fn function_id(store: &RecordStore, kind: FunctionKind, token: &str) -> Result<i64> {
    let key = RecordKey::parse(token);
    let row = require(store, kind.function_table(), kind.function_id(), kind.function_code(), &key)?;
    row_id(row, kind.function_id())
}

const SCORE_FIELDS: [(&str, &str, i64); 5] = [
    ("sameScore", "SAME_SCORE", 100),
    ("closeScore", "CLOSE_SCORE", 85),
    ("likelyScore", "LIKELY_SCORE", 75),
    ("plausibleScore", "PLAUSIBLE_SCORE", 65),
    ("unlikelyScore", "UN_LIKELY_SCORE", 50),
];

/// Comparison threshold operations (`CFG_CFRTN`).
pub struct ComparisonThresholds<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> ComparisonThresholds<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    pub fn list(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::ComparisonThreshold, store.rows(CFG_CFRTN)))
    }

    /// Add a threshold from `{"function", "scoreName", "feature",
    /// "execOrder", "sameScore", ...}`. `feature` defaults to `ALL`.
    pub fn add(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let function = text_field(&record, "function")
                .ok_or_else(|| ConfigError::invalid("function is required"))?;
            let cfunc_id = function_id(store, FunctionKind::Comparison, &function)?;
            let score_name = required_code(&record, "scoreName")?;
            let feature = text_field(&record, "feature").unwrap_or_else(|| crate::schema::ALL_FEATURES.into());
            let ftype_id = feature_ref(store, &feature)?;

            let duplicate = store
                .get_record_by_fields(
                    CFG_CFRTN,
                    &[
                        ("CFUNC_ID", cfunc_id.into()),
                        ("FTYPE_ID", ftype_id.into()),
                        ("CFUNC_RTNVAL", score_name.as_str().into()),
                    ],
                )
                .is_some();
            if duplicate {
                return Err(ConfigError::duplicate(
                    "comparison threshold",
                    format!("{function}/{feature}/{score_name}"),
                ));
            }

            let id = choose_id(store, CFG_CFRTN, "CFRTN_ID", int_field(&record, "id")?, USER_ID_SEED)?;
            let exec_order = match int_field(&record, "execOrder")? {
                Some(order) => order,
                None => store.next_exec_order(CFG_CFRTN, ("CFUNC_ID", cfunc_id.into()))?,
            };
            let mut row = row_from(json!({
                "CFRTN_ID": id,
                "CFUNC_ID": cfunc_id,
                "FTYPE_ID": ftype_id,
                "CFUNC_RTNVAL": score_name,
                "EXEC_ORDER": exec_order,
            }));
            for (external, internal, default) in SCORE_FIELDS {
                let score = int_field(&record, external)?.unwrap_or(default);
                row.insert(internal.into(), Value::from(score));
            }
            store.add_record(CFG_CFRTN, row);
            info!("added comparison threshold {id} for {function}");
            Ok(id)
        })
    }

    /// Change the scores or return-value name of threshold `id`.
    pub fn set(&mut self, record: &Record) -> Result<()> {
        let id = int_field(record, "id")?.ok_or_else(|| ConfigError::invalid("id is required"))?;
        let record = record.clone();
        self.manager.mutate(|store| {
            if store.get_record(CFG_CFRTN, "CFRTN_ID", id).is_none() {
                return Err(ConfigError::not_found("comparison threshold", id));
            }
            let mut changes = Row::new();
            for (external, internal, _) in SCORE_FIELDS {
                if let Some(score) = int_field(&record, external)? {
                    changes.insert(internal.into(), Value::from(score));
                }
            }
            if let Some(order) = int_field(&record, "execOrder")? {
                changes.insert("EXEC_ORDER".into(), Value::from(order));
            }
            if let Some(name) = text_field(&record, "scoreName") {
                changes.insert("CFUNC_RTNVAL".into(), Value::from(name.to_uppercase()));
            }
            if changes.is_empty() {
                return Err(ConfigError::invalid("nothing to change"));
            }
            store.merge_record(CFG_CFRTN, &[("CFRTN_ID", id.into())], changes);
            info!("updated comparison threshold {id}");
            Ok(())
        })
    }

    pub fn delete(&mut self, id: i64) -> Result<()> {
        self.manager.mutate(|store| {
            delete_cascading(store, CFG_CFRTN, &[("CFRTN_ID", id.into())], &id.to_string())?;
            info!("deleted comparison threshold {id}");
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

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_add_function_defaults() {
        let mut manager = manager();
        let id = manager
            .functions(FunctionKind::Comparison)
            .add_function(&record(json!({"function": "my_comp", "connectStr": "g2MyComp"})))
            .unwrap();
        assert_eq!(id, 1000);
        let function = manager.functions(FunctionKind::Comparison).get(&RecordKey::parse("MY_COMP")).unwrap();
        assert_eq!(function["language"], "C");
        assert_eq!(function["anonSupport"], "No");

        let err = manager
            .functions(FunctionKind::Comparison)
            .add_function(&record(json!({"function": "MY_COMP", "connectStr": "x"})))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { .. }));
    }

    #[test]
    fn test_function_in_use_cannot_be_deleted() {
        let mut manager = manager();
        let err = manager
            .functions(FunctionKind::Standardize)
            .delete_function(&RecordKey::parse("PARSE_NAME"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { table: "CFG_SFCALL", .. }));
    }

    #[test]
    fn test_comparison_thresholds() {
        let mut manager = manager();
        let id = manager
            .comparison_thresholds()
            .add(&record(json!({"function": "EXACT_COMP", "scoreName": "full_score", "feature": "SSN"})))
            .unwrap();
        let threshold = manager
            .comparison_thresholds()
            .list()
            .unwrap()
            .into_iter()
            .find(|t| t["id"] == json!(id))
            .unwrap();
        assert_eq!(threshold["feature"], "SSN");
        assert_eq!(threshold["closeScore"], 85);

        manager
            .comparison_thresholds()
            .set(&record(json!({"id": id, "closeScore": 88})))
            .unwrap();
        manager.comparison_thresholds().delete(id).unwrap();
        assert!(manager.comparison_thresholds().delete(id).unwrap_err().is_not_found());
    }
}
