//! Resolution rules (`CFG_ERRULE`) and their fragments (`CFG_ERFRAG`).
//!
//! A fragment is a scoring expression. Fragments built from other
//! fragments (`./FRAGMENT[./SAME_NAME>0 and ...]`) record the IDs they use
//! in `ERFRAG_DEPENDS`; that list is derived from the source on every write.

use serde_json::{Value, json};

use super::{
    ConfigManager, choose_id, delete_cascading, int_field, require, required_code, row_from, row_id, text_field,
};
use crate::{
    error::{ConfigError, Result},
    schema::{CFG_ERFRAG, CFG_ERRULE, CFG_RTYPE, USER_ID_SEED},
    store::{Record, RecordKey, RecordStore, Row, value_as_i64, value_to_string},
    translate::{EntityKind, Translator, is_yes, lookup, yes_no},
};

/// Rule and fragment operations on a loaded configuration.
pub struct Rules<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> Rules<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    pub fn list_rules(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Rule, store.rows(CFG_ERRULE)))
    }

    pub fn get_rule(&mut self, key: &RecordKey) -> Result<Record> {
        let store = self.manager.get_config_data()?;
        let row = require(store, CFG_ERRULE, "ERRULE_ID", "ERRULE_CODE", key)?;
        Ok(Translator::new(store).to_external(EntityKind::Rule, row))
    }

    /// Add a rule from `{"rule", "fragment", "disqualifier", "description",
    /// "resolve", "relate", "rtype_id", "tier", "id"}`.
    ///
    /// `resolve` defaults to `Yes` and `relate` to `No`. Without `rtype_id`
    /// a resolving rule gets match level 1 and a relating rule level 2.
    pub fn add_rule(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let code = required_code(&record, "rule")?;
            if store.get_record(CFG_ERRULE, "ERRULE_CODE", code.as_str()).is_some() {
                return Err(ConfigError::duplicate("rule", &code));
            }
            let fragment = required_code(&record, "fragment")?;
            fragment_exists(store, &fragment)?;
            let disqualifier = match text_field(&record, "disqualifier") {
                Some(code) => {
                    let code = code.to_uppercase();
                    fragment_exists(store, &code)?;
                    Value::from(code)
                }
                None => Value::Null,
            };
            let resolve = lookup(&record, "resolve").map_or(true, is_yes);
            let relate = lookup(&record, "relate").is_some_and(is_yes);
            let rtype = match int_field(&record, "rtype_id")? {
                Some(rtype) => rtype,
                None if resolve => 1,
                None => 2,
            };
            match_level_exists(store, rtype)?;

            let id = choose_id(store, CFG_ERRULE, "ERRULE_ID", int_field(&record, "id")?, USER_ID_SEED)?;
            store.add_record(
                CFG_ERRULE,
                row_from(json!({
                    "ERRULE_ID": id,
                    "ERRULE_CODE": code,
                    "ERRULE_DESC": text_field(&record, "description").unwrap_or_else(|| code.clone()),
                    "RESOLVE": yes_no(resolve),
                    "RELATE": yes_no(relate),
                    "RTYPE_ID": rtype,
                    "QUAL_ERFRAG_CODE": fragment,
                    "DISQ_ERFRAG_CODE": disqualifier,
                    "ERRULE_TIER": int_field(&record, "tier")?,
                })),
            );
            info!("added rule {code} ({id})");
            Ok(id)
        })
    }

    /// Change fields of rule `id`.
    pub fn set_rule(&mut self, record: &Record) -> Result<()> {
        let id = int_field(record, "id")?.ok_or_else(|| ConfigError::invalid("id is required"))?;
        let record = record.clone();
        self.manager.mutate(|store| {
            if store.get_record(CFG_ERRULE, "ERRULE_ID", id).is_none() {
                return Err(ConfigError::not_found("rule", id));
            }
            let mut changes = Row::new();
            for (name, value) in &record {
                let Some(map) = EntityKind::Rule.field(name) else {
                    return Err(ConfigError::invalid(format!("unknown rule field: {name}")));
                };
                let value = match map.external {
                    "id" => continue,
                    "rule" => return Err(ConfigError::invalid("rule code cannot be changed")),
                    "resolve" | "relate" => yes_no(is_yes(value)),
                    "fragment" | "disqualifier" => {
                        let code = value_to_string(value).trim().to_uppercase();
                        if code.is_empty() && map.external == "disqualifier" {
                            Value::Null
                        } else {
                            fragment_exists(store, &code)?;
                            Value::from(code)
                        }
                    }
                    "rtype_id" | "tier" => {
                        let number = value_as_i64(value)
                            .ok_or_else(|| ConfigError::invalid(format!("{name} must be an integer")))?;
                        if map.external == "rtype_id" {
                            match_level_exists(store, number)?;
                        }
                        Value::from(number)
                    }
                    _ => value.clone(),
                };
                changes.insert(map.internal.into(), value);
            }
            if changes.is_empty() {
                return Err(ConfigError::invalid("nothing to change"));
            }
            store.merge_record(CFG_ERRULE, &[("ERRULE_ID", id.into())], changes);
            info!("updated rule {id}");
            Ok(())
        })
    }

    pub fn delete_rule(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_ERRULE, "ERRULE_ID", "ERRULE_CODE", key)?;
            let id = row_id(row, "ERRULE_ID")?;
            delete_cascading(store, CFG_ERRULE, &[("ERRULE_ID", id.into())], &key.to_string())?;
            info!("deleted rule {key}");
            Ok(())
        })
    }

    pub fn list_fragments(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Fragment, store.rows(CFG_ERFRAG)))
    }

    pub fn get_fragment(&mut self, key: &RecordKey) -> Result<Record> {
        let store = self.manager.get_config_data()?;
        let row = require(store, CFG_ERFRAG, "ERFRAG_ID", "ERFRAG_CODE", key)?;
        Ok(Translator::new(store).to_external(EntityKind::Fragment, row))
    }

    /// Add a fragment from `{"fragment", "source", "description", "id"}`.
    ///
    /// # Errors
    ///
    /// Fails when the source refers to a fragment that does not exist.
    pub fn add_fragment(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let code = required_code(&record, "fragment")?;
            if store.get_record(CFG_ERFRAG, "ERFRAG_CODE", code.as_str()).is_some() {
                return Err(ConfigError::duplicate("fragment", &code));
            }
            let source = text_field(&record, "source").ok_or_else(|| ConfigError::invalid("source is required"))?;
            let depends = fragment_depends(store, &source)?;
            let id = choose_id(store, CFG_ERFRAG, "ERFRAG_ID", int_field(&record, "id")?, USER_ID_SEED)?;
            store.add_record(
                CFG_ERFRAG,
                row_from(json!({
                    "ERFRAG_ID": id,
                    "ERFRAG_CODE": code,
                    "ERFRAG_DESC": text_field(&record, "description").unwrap_or_else(|| code.clone()),
                    "ERFRAG_SOURCE": source,
                    "ERFRAG_DEPENDS": depends,
                })),
            );
            info!("added fragment {code} ({id})");
            Ok(id)
        })
    }

    /// Change the source or description of fragment `fragment`.
    pub fn set_fragment(&mut self, record: &Record) -> Result<()> {
        let code = required_code(record, "fragment")?;
        let record = record.clone();
        self.manager.mutate(|store| {
            require(store, CFG_ERFRAG, "ERFRAG_ID", "ERFRAG_CODE", &RecordKey::Code(code.clone()))?;
            let mut changes = Row::new();
            if let Some(source) = text_field(&record, "source") {
                if source_references(&source).any(|name| name == code) {
                    return Err(ConfigError::invalid(format!("fragment {code} cannot refer to itself")));
                }
                changes.insert("ERFRAG_DEPENDS".into(), fragment_depends(store, &source)?);
                changes.insert("ERFRAG_SOURCE".into(), source.into());
            }
            if let Some(description) = text_field(&record, "description") {
                changes.insert("ERFRAG_DESC".into(), description.into());
            }
            if changes.is_empty() {
                return Err(ConfigError::invalid("nothing to change"));
            }
            store.merge_record(CFG_ERFRAG, &[("ERFRAG_CODE", code.as_str().into())], changes);
            info!("updated fragment {code}");
            Ok(())
        })
    }

    /// Delete a fragment no rule and no other fragment uses.
    pub fn delete_fragment(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_ERFRAG, "ERFRAG_ID", "ERFRAG_CODE", key)?;
            let id = row_id(row, "ERFRAG_ID")?;
            let users = store
                .rows(CFG_ERFRAG)
                .filter(|other| {
                    other
                        .get("ERFRAG_DEPENDS")
                        .map(value_to_string)
                        .is_some_and(|depends| depends.split(',').any(|d| d.trim().parse::<i64>().ok() == Some(id)))
                })
                .count();
            if users > 0 {
                return Err(ConfigError::HasDependents {
                    entity: "fragment",
                    key: key.to_string(),
                    table: CFG_ERFRAG,
                    count: users,
                });
            }
            delete_cascading(store, CFG_ERFRAG, &[("ERFRAG_ID", id.into())], &key.to_string())?;
            info!("deleted fragment {key}");
            Ok(())
        })
    }
}

fn fragment_exists(store: &RecordStore, code: &str) -> Result<()> {
    store
        .get_record(CFG_ERFRAG, "ERFRAG_CODE", code)
        .map(|_| ())
        .ok_or_else(|| ConfigError::not_found("fragment", code))
}

fn match_level_exists(store: &RecordStore, rtype: i64) -> Result<()> {
    store
        .get_record(CFG_RTYPE, "RTYPE_ID", rtype)
        .map(|_| ())
        .ok_or_else(|| ConfigError::not_found("match level", rtype))
}

/// Names following `./` in a source, other than the `FRAGMENT` and
/// `SCORES` roots.
fn source_references(source: &str) -> impl Iterator<Item = String> + '_ {
    source
        .split("./")
        .skip(1)
        .map(|rest| {
            rest.chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|name| !name.is_empty() && name != "FRAGMENT" && name != "SCORES")
}

/// `ERFRAG_DEPENDS` for a source: the IDs of the fragments it combines, or
/// null for a source over scores.
fn fragment_depends(store: &RecordStore, source: &str) -> Result<Value> {
    if !source.to_uppercase().contains("./FRAGMENT") {
        return Ok(Value::Null);
    }
    let mut ids = Vec::new();
    for name in source_references(source) {
        let row = store
            .get_record(CFG_ERFRAG, "ERFRAG_CODE", name.as_str())
            .ok_or_else(|| ConfigError::not_found("fragment", &name))?;
        let id = row_id(row, "ERFRAG_ID")?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::from(
        ids.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
    ))
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
    fn test_fragment_depends_are_derived() {
        let mut manager = manager();
        manager
            .rules()
            .add_fragment(&record(json!({
                "fragment": "NAME_SSN_DOB",
                "source": "./FRAGMENT[./SAME_NAME>0 and ./SAME_SSN>0 and ./SAME_DOB>0]"
            })))
            .unwrap();
        let fragment = manager.rules().get_fragment(&RecordKey::parse("NAME_SSN_DOB")).unwrap();
        assert_eq!(fragment["depends"], "11,21,31");

        let err = manager
            .rules()
            .add_fragment(&record(json!({"fragment": "BAD", "source": "./FRAGMENT[./NOPE>0]"})))
            .unwrap_err();
        assert!(err.is_not_found());

        manager
            .rules()
            .add_fragment(&record(json!({"fragment": "SAME_PHONE", "source": "./SCORES/PHONE[./FULL_SCORE=100]"})))
            .unwrap();
        assert_eq!(manager.rules().get_fragment(&RecordKey::parse("SAME_PHONE")).unwrap()["depends"], Value::Null);
    }

    #[test]
    fn test_fragments_in_use_are_protected() {
        let mut manager = manager();
        // Used by rule CNAME and by fragment NAME_SSN.
        let err = manager.rules().delete_fragment(&RecordKey::parse("CLOSE_NAME")).unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { .. }));

        // Only used by rule SF1_CNAME.
        let err = manager.rules().delete_fragment(&RecordKey::parse("NAME_SSN")).unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { table: "CFG_ERRULE", .. }));
        manager.rules().delete_rule(&RecordKey::parse("SF1_CNAME")).unwrap();
        manager.rules().delete_fragment(&RecordKey::parse("NAME_SSN")).unwrap();
    }

    #[test]
    fn test_add_and_set_rule() {
        let mut manager = manager();
        let id = manager
            .rules()
            .add_rule(&record(json!({"rule": "sname_only", "fragment": "SAME_NAME", "resolve": "No", "relate": "Yes"})))
            .unwrap();
        let rule = manager.rules().get_rule(&RecordKey::Id(id)).unwrap();
        assert_eq!(rule["rtype_id"], 2);
        assert_eq!(rule["disqualifier"], Value::Null);

        manager
            .rules()
            .set_rule(&record(json!({"id": id, "disqualifier": "DIFF_SSN", "tier": 40})))
            .unwrap();
        let rule = manager.rules().get_rule(&RecordKey::parse("SNAME_ONLY")).unwrap();
        assert_eq!(rule["disqualifier"], "DIFF_SSN");
        assert_eq!(rule["tier"], 40);

        assert!(manager
            .rules()
            .set_rule(&record(json!({"id": id, "fragment": "MISSING"})))
            .unwrap_err()
            .is_not_found());
    }
}
