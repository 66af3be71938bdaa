//! Attribute mapping (`CFG_ATTR`).
//!
//! An attribute names an input field and maps it to one element of one
//! feature. Attributes reference features and elements by code.

use serde_json::{Value, json};

use super::{
    ConfigManager, choose_id, delete_cascading, flag_field, int_field, require, required_code, row_from,
    row_id, text_field,
};
use crate::{
    error::{ConfigError, Result},
    schema::{ATTRIBUTE_CLASSES, CFG_ATTR, CFG_FBOM, CFG_FELEM, CFG_FTYPE, USER_ID_SEED},
    store::{Record, RecordKey, RecordStore, Row},
    translate::{EntityKind, Translator, lookup},
};

const REQUIRED_VALUES: [&str; 4] = ["Yes", "No", "Any", "Desired"];

/// Attribute operations on a loaded configuration.
pub struct Attributes<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> Attributes<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    pub fn list(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Attribute, store.rows(CFG_ATTR)))
    }

    pub fn get(&mut self, key: &RecordKey) -> Result<Record> {
        let store = self.manager.get_config_data()?;
        let row = require(store, CFG_ATTR, "ATTR_ID", "ATTR_CODE", key)?;
        Ok(Translator::new(store).to_external(EntityKind::Attribute, row))
    }

    /// Add an attribute from `{"attribute", "class", "feature", "element",
    /// "required", "default", "internal", "id"}`.
    ///
    /// # Errors
    ///
    /// Fails when the feature does not exist or the element is not part of
    /// the feature.
    pub fn add_attribute(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| insert_attribute(store, &record))
    }

    /// Change fields of an existing attribute. `attribute` selects it.
    pub fn set_attribute(&mut self, record: &Record) -> Result<()> {
        let code = required_code(record, "attribute")?;
        let record = record.clone();
        self.manager.mutate(|store| {
            let current = require(store, CFG_ATTR, "ATTR_ID", "ATTR_CODE", &RecordKey::Code(code.clone()))?.clone();
            let mut changes = Row::new();
            for (name, value) in &record {
                let Some(map) = EntityKind::Attribute.field(name) else {
                    return Err(ConfigError::invalid(format!("unknown attribute field: {name}")));
                };
                match map.external {
                    "attribute" => {}
                    "id" => return Err(ConfigError::invalid("attribute id cannot be changed")),
                    "class" => {
                        changes.insert(map.internal.into(), Value::from(attribute_class(Some(value))?));
                    }
                    "required" => {
                        changes.insert(map.internal.into(), Value::from(required_value(Some(value))?));
                    }
                    "internal" => {
                        changes.insert(map.internal.into(), flag_field(&record, "internal", false));
                    }
                    _ => {
                        changes.insert(map.internal.into(), value.clone());
                    }
                }
            }

            let feature = changes
                .get("FTYPE_CODE")
                .or_else(|| current.get("FTYPE_CODE"))
                .cloned()
                .unwrap_or(Value::Null);
            let element = changes
                .get("FELEM_CODE")
                .or_else(|| current.get("FELEM_CODE"))
                .cloned()
                .unwrap_or(Value::Null);
            let (feature, element) = check_mapping(store, &feature, &element)?;
            if changes.contains_key("FTYPE_CODE") {
                changes.insert("FTYPE_CODE".into(), feature);
            }
            if changes.contains_key("FELEM_CODE") {
                changes.insert("FELEM_CODE".into(), element);
            }

            store.merge_record(CFG_ATTR, &[("ATTR_CODE", Value::from(code.as_str()))], changes);
            info!("updated attribute {code}");
            Ok(())
        })
    }

    pub fn delete_attribute(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_ATTR, "ATTR_ID", "ATTR_CODE", key)?;
            let id = row_id(row, "ATTR_ID")?;
            delete_cascading(store, CFG_ATTR, &[("ATTR_ID", Value::from(id))], &key.to_string())?;
            info!("deleted attribute {key}");
            Ok(())
        })
    }
}

fn attribute_class(value: Option<&Value>) -> Result<String> {
    let class = value
        .map(crate::store::value_to_string)
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "OTHER".to_string());
    if ATTRIBUTE_CLASSES.contains(&class.as_str()) {
        Ok(class)
    } else {
        Err(ConfigError::invalid(format!(
            "invalid attribute class {class}, expected one of {}",
            ATTRIBUTE_CLASSES.join(", ")
        )))
    }
}

fn required_value(value: Option<&Value>) -> Result<&'static str> {
    let Some(value) = value.map(crate::store::value_to_string) else {
        return Ok("No");
    };
    REQUIRED_VALUES
        .iter()
        .find(|r| r.eq_ignore_ascii_case(value.trim()))
        .copied()
        .ok_or_else(|| {
            ConfigError::invalid(format!(
                "invalid required value {value}, expected one of {}",
                REQUIRED_VALUES.join(", ")
            ))
        })
}

/// Validate a feature/element pair and return both as upper-cased codes.
///
/// A null element maps the attribute to the feature as a whole. A null
/// feature is only allowed with a null element.
fn check_mapping(store: &RecordStore, feature: &Value, element: &Value) -> Result<(Value, Value)> {
    let feature_code = crate::store::value_to_string(feature).trim().to_uppercase();
    let element_code = crate::store::value_to_string(element).trim().to_uppercase();

    if feature_code.is_empty() {
        if !element_code.is_empty() {
            return Err(ConfigError::invalid("an element needs a feature"));
        }
        return Ok((Value::Null, Value::Null));
    }
    let feature_row = store
        .get_record(CFG_FTYPE, "FTYPE_CODE", feature_code.as_str())
        .ok_or_else(|| ConfigError::not_found("feature", &feature_code))?;
    if element_code.is_empty() {
        return Ok((Value::from(feature_code), Value::Null));
    }
    let element_row = store
        .get_record(CFG_FELEM, "FELEM_CODE", element_code.as_str())
        .ok_or_else(|| ConfigError::not_found("element", &element_code))?;

    let linked = store
        .get_record_by_fields(
            CFG_FBOM,
            &[
                ("FTYPE_ID", row_id(feature_row, "FTYPE_ID")?.into()),
                ("FELEM_ID", row_id(element_row, "FELEM_ID")?.into()),
            ],
        )
        .is_some();
    if !linked {
        return Err(ConfigError::invalid(format!(
            "element {element_code} is not part of feature {feature_code}"
        )));
    }
    Ok((Value::from(feature_code), Value::from(element_code)))
}

/// Insert an attribute row. Shared with feature templates.
pub(crate) fn insert_attribute(store: &mut RecordStore, record: &Record) -> Result<i64> {
    let code = required_code(record, "attribute")?;
    if store.get_record(CFG_ATTR, "ATTR_CODE", code.as_str()).is_some() {
        return Err(ConfigError::duplicate("attribute", &code));
    }
    let class = attribute_class(lookup(record, "class"))?;
    let required = required_value(lookup(record, "required"))?;
    let (feature, element) = check_mapping(
        store,
        lookup(record, "feature").unwrap_or(&Value::Null),
        lookup(record, "element").unwrap_or(&Value::Null),
    )?;
    let default = text_field(record, "default").map_or(Value::Null, Value::from);
    let id = choose_id(store, CFG_ATTR, "ATTR_ID", int_field(record, "id")?, USER_ID_SEED)?;

    store.add_record(
        CFG_ATTR,
        row_from(json!({
            "ATTR_ID": id,
            "ATTR_CODE": code,
            "ATTR_CLASS": class,
            "FTYPE_CODE": feature,
            "FELEM_CODE": element,
            "FELEM_REQ": required,
            "DEFAULT_VALUE": default,
            "INTERNAL": flag_field(record, "internal", false),
        })),
    );
    debug!("added attribute {code} ({id})");
    Ok(id)
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
    fn test_add_attribute() {
        let mut manager = manager();
        let id = manager
            .attributes()
            .add_attribute(&record(json!({
                "attribute": "home_phone",
                "class": "phone",
                "feature": "PHONE",
                "element": "PHONE_NUM",
                "required": "yes"
            })))
            .unwrap();
        assert_eq!(id, 1402);

        let attr = manager.attributes().get(&RecordKey::parse("HOME_PHONE")).unwrap();
        assert_eq!(attr["class"], "PHONE");
        assert_eq!(attr["required"], "Yes");
        assert_eq!(attr["internal"], "No");
    }

    #[test]
    fn test_element_must_belong_to_feature() {
        let mut manager = manager();
        let err = manager
            .attributes()
            .add_attribute(&record(json!({
                "attribute": "BAD", "class": "PHONE", "feature": "PHONE", "element": "SURNAME"
            })))
            .unwrap_err();
        assert!(err.to_string().contains("not part of feature"));

        let err = manager
            .attributes()
            .add_attribute(&record(json!({"attribute": "BAD", "feature": "NOPE"})))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_set_attribute() {
        let mut manager = manager();
        manager
            .attributes()
            .set_attribute(&record(json!({"attribute": "NAME_MIDDLE", "internal": "Yes", "required": "desired"})))
            .unwrap();
        let attr = manager.attributes().get(&RecordKey::parse("NAME_MIDDLE")).unwrap();
        assert_eq!(attr["internal"], "Yes");
        assert_eq!(attr["required"], "Desired");

        assert!(manager
            .attributes()
            .set_attribute(&record(json!({"attribute": "NAME_MIDDLE", "id": 5})))
            .is_err());
    }
}
