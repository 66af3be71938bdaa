//! System parameters, raw configuration sections, the compatibility version
//! and reference codes.

use chrono::Utc;
use serde_json::{Value, json};

use super::{ConfigManager, row_from, text_field};
use crate::{
    error::{ConfigError, Result},
    schema::{ATTRIBUTE_CLASSES, BEHAVIOR_CODES, CFG_FCLASS, CFG_RTYPE, CFG_SPARM, CONFIG_BASE_VERSION},
    store::{Record, RecordStore, Row, value_to_string},
    translate::{EntityKind, Translator},
};

/// Parameter shown by `listSystemParameters` even when it was never set.
const BREAK_MATCHES_PARAMETER: &str = "relationshipsBreakMatches";

/// Parameter `touch` stamps.
pub const LAST_UPDATED_PARAMETER: &str = "LAST_UPDATED";

/// Reference code groups accepted by [`System::list_reference_codes`].
pub const REFERENCE_CODE_TYPES: [&str; 4] = ["matchLevels", "featureClasses", "behaviorCodes", "attributeClasses"];

/// System level operations on a loaded configuration.
pub struct System<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> System<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    /// Every system parameter. `relationshipsBreakMatches` is listed with
    /// its default of `No` when the document does not set it.
    pub fn list_parameters(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        let mut parameters = Translator::new(store).to_external_list(EntityKind::SystemParameter, store.rows(CFG_SPARM));
        let present = parameters
            .iter()
            .any(|p| p.get("parameter").is_some_and(|v| value_to_string(v) == BREAK_MATCHES_PARAMETER));
        if !present {
            let next = store.get_next_id(CFG_SPARM, "SPARM_ID", 1)?;
            parameters.push(row_from(json!({
                "id": next,
                "parameter": BREAK_MATCHES_PARAMETER,
                "value": "No",
                "description": "Whether relationship matches should break entity resolution",
            })));
        }
        Ok(parameters)
    }

    /// Set a parameter, creating it when absent. Names match ignoring case.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::invalid("parameter name is required"));
        }
        self.manager.mutate(|store| {
            let existing = store
                .rows(CFG_SPARM)
                .find(|row| {
                    row.get("SPARM_CODE")
                        .is_some_and(|code| value_to_string(code).eq_ignore_ascii_case(name))
                })
                .cloned();
            match existing {
                Some(row) => {
                    let mut changes = Row::new();
                    changes.insert("SPARM_VALUE".into(), value.into());
                    let code = row.get("SPARM_CODE").cloned().unwrap_or(Value::Null);
                    store.merge_record(CFG_SPARM, &[("SPARM_CODE", code)], changes);
                    info!("set system parameter {name} to {value}");
                }
                None => {
                    let id = store.get_next_id(CFG_SPARM, "SPARM_ID", 1)?;
                    store.add_record(
                        CFG_SPARM,
                        row_from(json!({
                            "SPARM_ID": id,
                            "SPARM_CODE": name,
                            "SPARM_VALUE": value,
                            "SPARM_DESC": Value::Null,
                        })),
                    );
                    info!("added system parameter {name} = {value}");
                }
            }
            Ok(())
        })
    }

    /// Same as [`System::set_parameter`].
    pub fn set_setting(&mut self, name: &str, value: &str) -> Result<()> {
        self.set_parameter(name, value)
    }

    /// Stamp `LAST_UPDATED` with the current UNIX time so the document
    /// differs from the one it was loaded from. Returns the stamp.
    pub fn touch(&mut self) -> Result<String> {
        let stamp = Utc::now().timestamp().to_string();
        self.set_parameter(LAST_UPDATED_PARAMETER, &stamp)?;
        Ok(stamp)
    }

    pub fn section_names(&mut self) -> Result<Vec<String>> {
        Ok(self.manager.get_config_data()?.section_names())
    }

    /// A raw `G2_CONFIG` member, as stored.
    pub fn get_section(&mut self, name: &str) -> Result<Value> {
        let store = self.manager.get_config_data()?;
        store
            .section(name.trim())
            .cloned()
            .ok_or_else(|| ConfigError::not_found("configuration section", name.trim()))
    }

    /// Add a member from `{"section_name", "section_data"}`. The data
    /// defaults to an empty table.
    pub fn add_section(&mut self, record: &Record) -> Result<()> {
        let name = text_field(record, "section_name").ok_or_else(|| ConfigError::invalid("section_name is required"))?;
        let data = record
            .get("section_data")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        self.manager.mutate(|store| {
            if store.section(&name).is_some() {
                return Err(ConfigError::duplicate("configuration section", &name));
            }
            store.insert_section(&name, data);
            info!("added configuration section {name}");
            Ok(())
        })
    }

    pub fn remove_section(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        self.manager.mutate(|store| {
            store
                .remove_section(name)
                .ok_or_else(|| ConfigError::not_found("configuration section", name))?;
            info!("removed configuration section {name}");
            Ok(())
        })
    }

    /// Add columns to every row of a table from `{"section_name",
    /// "field_data": {"FIELD": default, ...}}`. Rows that already carry a
    /// field keep their value. Returns the number of rows changed.
    pub fn add_section_field(&mut self, record: &Record) -> Result<usize> {
        let name = text_field(record, "section_name").ok_or_else(|| ConfigError::invalid("section_name is required"))?;
        let fields = match record.get("field_data") {
            Some(Value::Object(fields)) if !fields.is_empty() => fields.clone(),
            _ => return Err(ConfigError::invalid("field_data must be a non-empty object")),
        };
        self.manager.mutate(|store| {
            let rows = table_rows_mut(store, &name)?;
            let mut changed = 0;
            for row in rows.iter_mut().filter_map(Value::as_object_mut) {
                let mut touched = false;
                for (field, default) in &fields {
                    if !row.contains_key(field) {
                        row.insert(field.clone(), default.clone());
                        touched = true;
                    }
                }
                changed += usize::from(touched);
            }
            info!("added {} field(s) to {changed} row(s) of {name}", fields.len());
            Ok(changed)
        })
    }

    /// Drop a column from every row of a table, from `{"section_name",
    /// "field_name"}`. Returns the number of rows changed.
    pub fn remove_section_field(&mut self, record: &Record) -> Result<usize> {
        let name = text_field(record, "section_name").ok_or_else(|| ConfigError::invalid("section_name is required"))?;
        let field = text_field(record, "field_name").ok_or_else(|| ConfigError::invalid("field_name is required"))?;
        self.manager.mutate(|store| {
            let rows = table_rows_mut(store, &name)?;
            let changed = rows
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .filter_map(|row| row.shift_remove(&field))
                .count();
            if changed == 0 {
                return Err(ConfigError::not_found("section field", format!("{name}.{field}")));
            }
            info!("removed {field} from {changed} row(s) of {name}");
            Ok(changed)
        })
    }

    /// `CONFIG_BASE_VERSION.COMPATIBILITY_VERSION.CONFIG_VERSION`.
    pub fn get_compatibility_version(&mut self) -> Result<String> {
        let store = self.manager.get_config_data()?;
        compatibility_version(store)
            .ok_or_else(|| ConfigError::not_found("compatibility version", CONFIG_BASE_VERSION))
    }

    pub fn update_compatibility_version(&mut self, version: &str) -> Result<()> {
        let version = version.trim();
        if version.is_empty() {
            return Err(ConfigError::invalid("version is required"));
        }
        self.manager.mutate(|store| {
            if !matches!(store.section(CONFIG_BASE_VERSION), Some(Value::Object(_))) {
                store.insert_section(CONFIG_BASE_VERSION, json!({}));
            }
            let base = store
                .section_mut(CONFIG_BASE_VERSION)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| ConfigError::invalid(format!("{CONFIG_BASE_VERSION} is not an object")))?;
            let compatibility = base
                .entry("COMPATIBILITY_VERSION")
                .or_insert_with(|| json!({}));
            if !compatibility.is_object() {
                *compatibility = json!({});
            }
            if let Some(compatibility) = compatibility.as_object_mut() {
                compatibility.insert("CONFIG_VERSION".into(), version.into());
            }
            info!("compatibility version set to {version}");
            Ok(())
        })
    }

    /// Whether the document's compatibility version equals `expected`.
    pub fn verify_compatibility_version(&mut self, expected: &str) -> Result<bool> {
        Ok(self.get_compatibility_version()? == expected.trim())
    }

    /// Reference codes of one group, or of every group when `code_type` is
    /// `None`. Each record carries `codeType`, `id`, `code` and
    /// `description`.
    pub fn list_reference_codes(&mut self, code_type: Option<&str>) -> Result<Vec<Record>> {
        let groups: Vec<&str> = match code_type {
            None => REFERENCE_CODE_TYPES.to_vec(),
            Some(wanted) => {
                let group = REFERENCE_CODE_TYPES
                    .iter()
                    .find(|t| t.eq_ignore_ascii_case(wanted.trim()))
                    .ok_or_else(|| {
                        ConfigError::invalid(format!(
                            "unknown reference code type {wanted}, expected one of: {}",
                            REFERENCE_CODE_TYPES.join(", ")
                        ))
                    })?;
                vec![*group]
            }
        };

        let store = self.manager.get_config_data()?;
        let translator = Translator::new(store);
        let mut codes = Vec::new();
        for group in groups {
            match group {
                "matchLevels" => {
                    let levels = translator.to_external_list(EntityKind::MatchLevel, store.rows(CFG_RTYPE));
                    codes.extend(levels.iter().map(|level| {
                        reference(group, level.get("level"), level.get("code"), level.get("description"))
                    }));
                }
                "featureClasses" => {
                    let classes = translator.to_external_list(EntityKind::FeatureClass, store.rows(CFG_FCLASS));
                    codes.extend(classes.iter().map(|class| {
                        reference(group, class.get("id"), class.get("class"), class.get("description"))
                    }));
                }
                "behaviorCodes" => codes.extend(BEHAVIOR_CODES.iter().map(|(code, description)| {
                    reference(group, None, Some(&Value::from(*code)), Some(&Value::from(*description)))
                })),
                _ => codes.extend(
                    ATTRIBUTE_CLASSES
                        .iter()
                        .map(|class| reference(group, None, Some(&Value::from(*class)), None)),
                ),
            }
        }
        Ok(codes)
    }
}

fn reference(code_type: &str, id: Option<&Value>, code: Option<&Value>, description: Option<&Value>) -> Record {
    row_from(json!({
        "codeType": code_type,
        "id": id.cloned().unwrap_or(Value::Null),
        "code": code.cloned().unwrap_or(Value::Null),
        "description": description.cloned().unwrap_or(Value::Null),
    }))
}

fn compatibility_version(store: &RecordStore) -> Option<String> {
    store
        .section(CONFIG_BASE_VERSION)?
        .get("COMPATIBILITY_VERSION")?
        .get("CONFIG_VERSION")
        .filter(|v| !v.is_null())
        .map(value_to_string)
}

fn table_rows_mut<'s>(store: &'s mut RecordStore, name: &str) -> Result<&'s mut Vec<Value>> {
    match store.section_mut(name) {
        Some(Value::Array(rows)) => Ok(rows),
        Some(_) => Err(ConfigError::invalid(format!("{name} is not a table"))),
        None => Err(ConfigError::not_found("configuration section", name)),
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
    fn test_parameters_upsert() {
        let mut manager = manager();
        let listed = manager.system().list_parameters().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["parameter"], BREAK_MATCHES_PARAMETER);
        assert_eq!(listed[0]["value"], "No");

        manager.system().set_parameter("relationshipsBreakMatches", "Yes").unwrap();
        manager.system().set_setting("RELATIONSHIPSBREAKMATCHES", "No").unwrap();
        let listed = manager.system().list_parameters().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["value"], "No");
        assert_eq!(listed[0]["id"], 1);
    }

    #[test]
    fn test_touch_dirties_session() {
        let mut manager = manager();
        assert!(!manager.is_dirty());
        let stamp = manager.system().touch().unwrap();
        assert!(manager.is_dirty());
        let stored = manager.get_record(CFG_SPARM, "SPARM_CODE", LAST_UPDATED_PARAMETER).unwrap();
        assert_eq!(stored["SPARM_VALUE"], stamp.as_str());
    }

    #[test]
    fn test_sections() {
        let mut manager = manager();
        manager
            .system()
            .add_section(&record(json!({"section_name": "CFG_CUSTOM"})))
            .unwrap();
        assert_eq!(manager.system().get_section("CFG_CUSTOM").unwrap(), json!([]));
        assert!(manager.system().add_section(&record(json!({"section_name": "CFG_CUSTOM"}))).is_err());

        let changed = manager
            .system()
            .add_section_field(&record(json!({"section_name": "CFG_DSRC", "field_data": {"CONVERSATIONAL": "No"}})))
            .unwrap();
        assert_eq!(changed, 2);
        let removed = manager
            .system()
            .remove_section_field(&record(json!({"section_name": "CFG_DSRC", "field_name": "CONVERSATIONAL"})))
            .unwrap();
        assert_eq!(removed, 2);

        manager.system().remove_section("CFG_CUSTOM").unwrap();
        assert!(manager.system().get_section("CFG_CUSTOM").unwrap_err().is_not_found());
    }

    #[test]
    fn test_compatibility_version() {
        let mut manager = manager();
        assert_eq!(manager.system().get_compatibility_version().unwrap(), "11");
        manager.system().update_compatibility_version("12").unwrap();
        assert!(manager.system().verify_compatibility_version("12").unwrap());
        assert!(!manager.system().verify_compatibility_version("11").unwrap());
    }

    #[test]
    fn test_reference_codes() {
        let mut manager = manager();
        let levels = manager.system().list_reference_codes(Some("MATCHLEVELS")).unwrap();
        assert_eq!(levels.len(), 5);
        assert_eq!(levels[0]["code"], "RESOLVED");

        let all = manager.system().list_reference_codes(None).unwrap();
        assert_eq!(all.len(), 5 + 6 + BEHAVIOR_CODES.len() + ATTRIBUTE_CLASSES.len());
        assert!(manager.system().list_reference_codes(Some("colors")).is_err());
    }
}
