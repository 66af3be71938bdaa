//! Features, their elements and templates.
//!
//! A feature row (`CFG_FTYPE`) owns its element list (`CFG_FBOM`) and the
//! calls made for it. Creating a feature from JSON can create all of those
//! in one step; deleting a feature removes them again, but never a feature
//! that attributes still map to.

use serde_json::{Value, json};

use super::{
    ConfigManager, delete_cascading, choose_id, flag_field, int_field, require, required_code, row_from,
    row_id, text_field,
};
use crate::{
    error::{ConfigError, Result},
    manager::{
        attributes::insert_attribute,
        calls::{NewCall, insert_call, insert_call_element, remove_call_element},
        elements::{element_id, insert_element},
        functions::function_id,
    },
    schema::{
        ALL_FEATURES, ALL_FEATURES_ID, CFG_ATTR, CFG_CFBOM, CFG_DFBOM, CFG_EFBOM, CFG_EFCALL, CFG_EFUNC, CFG_FBOM,
        CFG_FCLASS, CFG_FELEM, CFG_FTYPE, FunctionKind, NO_REFERENCE, USER_ID_SEED,
    },
    store::{Record, RecordKey, RecordStore, Row, value_as_i64, value_to_string},
    translate::{EntityKind, Translator, is_yes, lookup, parse_behavior, yes_no},
};

/// Flag columns of a feature and their defaults.
const FEATURE_FLAGS: [(&str, &str, bool); 5] = [
    ("anonymize", "ANONYMIZE", false),
    ("candidates", "USED_FOR_CAND", false),
    ("derived", "DERIVED", false),
    ("history", "PERSIST_HISTORY", true),
    ("matchKey", "SHOW_IN_MATCH_KEY", true),
];

/// Expression function maintaining the name hash.
const NAME_HASHER: &str = "NAME_HASHER";
/// Feature produced by the SSN last-four hash.
const SSN_LAST4: &str = "SSN_LAST4";

/// Feature templates: class, behavior, standardize and comparison functions
/// and element list.
struct Template {
    name: &'static str,
    class: &'static str,
    behavior: &'static str,
    standardize: &'static str,
    comparison: &'static str,
    elements: &'static [&'static str],
}

const TEMPLATES: [Template; 2] = [
    Template {
        name: "NAME",
        class: "NAME",
        behavior: "NAME",
        standardize: "PARSE_NAME",
        comparison: "GNR_COMP",
        elements: &["FULL_NAME", "SURNAME", "GIVEN_NAME"],
    },
    Template {
        name: "ADDRESS",
        class: "ADDRESS",
        behavior: "FM",
        standardize: "PARSE_ADDR",
        comparison: "ADDR_COMP",
        elements: &["ADDR_FULL", "ADDR_LINE1", "ADDR_CITY", "ADDR_STATE", "ADDR_POSTAL_CODE"],
    },
];

/// Feature operations on a loaded configuration.
pub struct Features<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> Features<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    /// Every feature with its functions and element list.
    pub fn list(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Feature, store.rows(CFG_FTYPE)))
    }

    pub fn get(&mut self, key: &RecordKey) -> Result<Record> {
        let store = self.manager.get_config_data()?;
        let row = require(store, CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", key)?;
        Ok(Translator::new(store).to_external(EntityKind::Feature, row))
    }

    /// Add a feature with default settings and no elements.
    pub fn add_feature(&mut self, code: &str) -> Result<i64> {
        let mut record = Record::new();
        record.insert("feature".into(), Value::from(code));
        self.add_feature_json(&record)
    }

    /// Add a feature from its JSON form.
    ///
    /// Besides the scalar fields, `standardize`, `expression` and
    /// `comparison` name functions to call and `elementList` lists elements
    /// as codes or `{"element", "expressed", "compared", "derived",
    /// "display", "datatype"}` objects. Missing elements are created.
    ///
    /// # Errors
    ///
    /// Fails without changing anything when the code exists, a referenced
    /// class or function is unknown, or the behavior code is malformed.
    pub fn add_feature_json(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| insert_feature(store, &record))
    }

    /// Change scalar fields of a feature. `feature` selects it.
    pub fn set_feature(&mut self, record: &Record) -> Result<()> {
        let code = required_code(record, "feature")?;
        let record = record.clone();
        self.manager.mutate(|store| {
            require(store, CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", &RecordKey::Code(code.clone()))?;
            let mut changes = Row::new();
            for (name, value) in &record {
                let Some(map) = EntityKind::Feature.field(name) else {
                    return Err(ConfigError::invalid(format!(
                        "{name} cannot be set here, use the element and call commands"
                    )));
                };
                match map.external {
                    "feature" => {}
                    "id" => return Err(ConfigError::invalid("feature id cannot be changed")),
                    "class" => {
                        changes.insert("FCLASS_ID".into(), class_id(store, &value_to_string(value))?.into());
                    }
                    "behavior" => {
                        let (frequency, exclusive, stable) = parse_behavior(&value_to_string(value))?;
                        changes.insert("FTYPE_FREQ".into(), frequency.into());
                        changes.insert("FTYPE_EXCL".into(), yes_no(exclusive));
                        changes.insert("FTYPE_STAB".into(), yes_no(stable));
                    }
                    "version" => {
                        let version = value_as_i64(value)
                            .ok_or_else(|| ConfigError::invalid("version must be an integer"))?;
                        changes.insert("VERSION".into(), version.into());
                    }
                    "description" => {
                        changes.insert(map.internal.into(), value.clone());
                    }
                    _ => {
                        changes.insert(map.internal.into(), yes_no(is_yes(value)));
                    }
                }
            }
            if changes.is_empty() {
                return Err(ConfigError::invalid("nothing to change"));
            }
            store.merge_record(CFG_FTYPE, &[("FTYPE_CODE", code.as_str().into())], changes);
            info!("updated feature {code}");
            Ok(())
        })
    }

    /// Delete a feature with its element list, calls, thresholds and
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HasDependents`] while attributes map to the
    /// feature or another feature's calls consume it.
    pub fn delete_feature(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", key)?;
            let id = row_id(row, "FTYPE_ID")?;
            let removed = delete_cascading(store, CFG_FTYPE, &[("FTYPE_ID", id.into())], &key.to_string())?;
            info!("deleted feature {key} ({} dependent rows)", removed.saturating_sub(1));
            Ok(())
        })
    }

    pub fn update_feature_version(&mut self, key: &RecordKey, version: i64) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", key)?;
            let id = row_id(row, "FTYPE_ID")?;
            let mut changes = Row::new();
            changes.insert("VERSION".into(), version.into());
            store.merge_record(CFG_FTYPE, &[("FTYPE_ID", id.into())], changes);
            info!("feature {key} is now version {version}");
            Ok(())
        })
    }

    /// Add `element` to `feature`, creating the element when needed.
    pub fn add_element_to_feature(&mut self, feature: &RecordKey, element: &str, exec_order: Option<i64>) -> Result<()> {
        let mut record = Record::new();
        record.insert("feature".into(), feature.value());
        record.insert("element".into(), Value::from(element));
        if let Some(order) = exec_order {
            record.insert("execOrder".into(), Value::from(order));
        }
        self.add_feature_element(&record)
    }

    /// Add an element to a feature from `{"feature", "element", "execOrder",
    /// "derived", "display", "displayDelim", "expressed", "compared",
    /// "datatype"}`.
    ///
    /// `expressed` and `compared` also list the element in the feature's
    /// first expression and comparison call.
    pub fn add_feature_element(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let feature = text_field(&record, "feature").ok_or_else(|| ConfigError::invalid("feature is required"))?;
            let ftype_id = feature_id(store, &feature)?;
            insert_feature_element(store, ftype_id, &record, None)?;
            info!("added element to feature {feature}");
            Ok(())
        })
    }

    /// Remove an element from a feature and from the feature's call lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HasDependents`] while attributes map to the
    /// feature/element pair.
    pub fn remove_element_from_feature(&mut self, feature: &RecordKey, element: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let feature_row = require(store, CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", feature)?;
            let ftype_id = row_id(feature_row, "FTYPE_ID")?;
            let feature_code = feature_row.get("FTYPE_CODE").map(value_to_string).unwrap_or_default();
            let element_row = require(store, CFG_FELEM, "FELEM_ID", "FELEM_CODE", element)?;
            let felem_id = row_id(element_row, "FELEM_ID")?;
            let element_code = element_row.get("FELEM_CODE").map(value_to_string).unwrap_or_default();
            let pair = format!("{feature_code}.{element_code}");

            let bom_key = [("FTYPE_ID", Value::from(ftype_id)), ("FELEM_ID", Value::from(felem_id))];
            if store.get_record_by_fields(CFG_FBOM, &bom_key).is_none() {
                return Err(ConfigError::not_found("feature element", &pair));
            }

            let mapped = store
                .rows(CFG_ATTR)
                .filter(|attr| {
                    attr.get("FTYPE_CODE").map(value_to_string).as_deref() == Some(feature_code.as_str())
                        && attr.get("FELEM_CODE").map(value_to_string).as_deref() == Some(element_code.as_str())
                })
                .count();
            if mapped > 0 {
                return Err(ConfigError::HasDependents {
                    entity: "feature element",
                    key: pair,
                    table: CFG_ATTR,
                    count: mapped,
                });
            }

            for table in [CFG_CFBOM, CFG_EFBOM, CFG_DFBOM] {
                let doomed: Vec<usize> = store
                    .indexed_rows(table)
                    .filter(|(_, row)| {
                        row.get("FTYPE_ID").and_then(value_as_i64) == Some(ftype_id)
                            && row.get("FELEM_ID").and_then(value_as_i64) == Some(felem_id)
                    })
                    .map(|(i, _)| i)
                    .collect();
                store.remove_rows(table, &doomed);
            }
            store.delete_record_by_fields(CFG_FBOM, &bom_key);
            info!("removed element {element_code} from feature {feature_code}");
            Ok(())
        })
    }

    /// Change how an element is shown or derived within a feature, from
    /// `{"feature", "element", "derived", "display", "displayDelim",
    /// "execOrder"}`.
    pub fn set_feature_element(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let feature = text_field(&record, "feature").ok_or_else(|| ConfigError::invalid("feature is required"))?;
            let element = text_field(&record, "element").ok_or_else(|| ConfigError::invalid("element is required"))?;
            let ftype_id = feature_id(store, &feature)?;
            let felem_id = element_id(store, &element)?;

            let mut changes = Row::new();
            if let Some(flag) = lookup(&record, "derived") {
                changes.insert("DERIVED".into(), yes_no(is_yes(flag)));
            }
            if let Some(flag) = lookup(&record, "display") {
                changes.insert("DISPLAY_LEVEL".into(), display_level(flag).into());
            }
            if let Some(delim) = lookup(&record, "displayDelim") {
                changes.insert("DISPLAY_DELIM".into(), delim.clone());
            }
            if let Some(order) = int_field(&record, "execOrder")? {
                changes.insert("EXEC_ORDER".into(), order.into());
            }
            if changes.is_empty() {
                return Err(ConfigError::invalid("nothing to change"));
            }
            let key = [("FTYPE_ID", Value::from(ftype_id)), ("FELEM_ID", Value::from(felem_id))];
            if !store.merge_record(CFG_FBOM, &key, changes) {
                return Err(ConfigError::not_found(
                    "feature element",
                    format!("{}.{}", feature.to_uppercase(), element.to_uppercase()),
                ));
            }
            info!("updated element {element} of feature {feature}");
            Ok(())
        })
    }

    /// Create `code` from the `NAME` or `ADDRESS` template together with an
    /// attribute per element, named `<CODE>_<ELEMENT>`.
    ///
    /// Template functions are only called when the configuration has them.
    pub fn apply_template(&mut self, template: &str, code: &str) -> Result<i64> {
        let template = TEMPLATES
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(template.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
                ConfigError::invalid(format!("unknown template {template}, expected one of {}", names.join(", ")))
            })?;
        let code = code.trim().to_uppercase();

        self.manager.mutate(|store| {
            let mut record = Record::new();
            record.insert("feature".into(), code.as_str().into());
            record.insert("description".into(), format!("{} feature", template.name).into());
            record.insert("class".into(), template.class.into());
            record.insert("behavior".into(), template.behavior.into());
            for (field, kind, function) in [
                ("standardize", FunctionKind::Standardize, template.standardize),
                ("comparison", FunctionKind::Comparison, template.comparison),
            ] {
                if function_id(store, kind, function).is_ok() {
                    record.insert(field.into(), function.into());
                }
            }
            let elements: Vec<Value> = template
                .elements
                .iter()
                .map(|element| json!({"element": element, "compared": "Yes", "display": "Yes"}))
                .collect();
            record.insert("elementList".into(), Value::Array(elements));
            let id = insert_feature(store, &record)?;

            for element in template.elements {
                let attribute = row_from(json!({
                    "attribute": format!("{code}_{element}"),
                    "class": template.class,
                    "feature": code,
                    "element": element,
                    "required": "Any",
                }));
                insert_attribute(store, &attribute)?;
            }
            info!("applied template {} to feature {code}", template.name);
            Ok(id)
        })
    }

    /// Add a feature element to the name hash.
    pub fn add_to_namehash(&mut self, feature: &str, element: &str) -> Result<()> {
        self.edit_hash(HashCall::Name, feature, element, true)
    }

    pub fn delete_from_namehash(&mut self, feature: &str, element: &str) -> Result<()> {
        self.edit_hash(HashCall::Name, feature, element, false)
    }

    /// Add a feature element to the hash producing `SSN_LAST4`.
    pub fn add_to_ssn_last4_hash(&mut self, feature: &str, element: &str) -> Result<()> {
        self.edit_hash(HashCall::SsnLast4, feature, element, true)
    }

    pub fn delete_from_ssn_last4_hash(&mut self, feature: &str, element: &str) -> Result<()> {
        self.edit_hash(HashCall::SsnLast4, feature, element, false)
    }

    fn edit_hash(&mut self, hash: HashCall, feature: &str, element: &str, add: bool) -> Result<()> {
        self.manager.mutate(|store| {
            let call_id = hash.call_id(store)?;
            let ftype_id = feature_id(store, feature)?;
            let felem_id = element_id(store, element)?;
            if add {
                insert_call_element(store, FunctionKind::Expression, call_id, ftype_id, felem_id, false)?;
            } else {
                remove_call_element(store, FunctionKind::Expression, call_id, ftype_id, felem_id)?;
            }
            info!(
                "{} {feature}.{element} {} {}",
                if add { "added" } else { "removed" },
                if add { "to" } else { "from" },
                hash.label()
            );
            Ok(())
        })
    }
}

#[derive(Clone, Copy)]
enum HashCall {
    Name,
    SsnLast4,
}

impl HashCall {
    fn label(self) -> &'static str {
        match self {
            HashCall::Name => "name hash",
            HashCall::SsnLast4 => "SSN last4 hash",
        }
    }

    /// The expression call whose element list is the hash.
    fn call_id(self, store: &RecordStore) -> Result<i64> {
        let (field, target) = match self {
            HashCall::Name => {
                let efunc = store
                    .get_record(CFG_EFUNC, "EFUNC_CODE", NAME_HASHER)
                    .ok_or_else(|| ConfigError::not_found("expression function", NAME_HASHER))?;
                ("EFUNC_ID", row_id(efunc, "EFUNC_ID")?)
            }
            HashCall::SsnLast4 => ("EFEAT_FTYPE_ID", feature_id(store, SSN_LAST4)?),
        };
        let call = store
            .get_record(CFG_EFCALL, field, target)
            .ok_or_else(|| ConfigError::not_found("expression call", self.label()))?;
        row_id(call, "EFCALL_ID")
    }
}

/// `FTYPE_ID` of a feature given by code or ID.
pub(crate) fn feature_id(store: &RecordStore, token: &str) -> Result<i64> {
    let row = require(store, CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", &RecordKey::parse(token))?;
    row_id(row, "FTYPE_ID")
}

/// Like [`feature_id`], but `ALL` means every feature.
pub(crate) fn feature_ref(store: &RecordStore, token: &str) -> Result<i64> {
    if token.trim().eq_ignore_ascii_case(ALL_FEATURES) {
        Ok(ALL_FEATURES_ID)
    } else {
        feature_id(store, token)
    }
}

fn class_id(store: &RecordStore, token: &str) -> Result<i64> {
    let row = require(store, CFG_FCLASS, "FCLASS_ID", "FCLASS_CODE", &RecordKey::parse(token))?;
    row_id(row, "FCLASS_ID")
}

fn display_level(flag: &Value) -> i64 {
    match value_as_i64(flag) {
        Some(level) => level,
        None => i64::from(is_yes(flag)),
    }
}

fn insert_feature(store: &mut RecordStore, record: &Record) -> Result<i64> {
    let code = required_code(record, "feature")?;
    if code == ALL_FEATURES {
        return Err(ConfigError::invalid(format!("{ALL_FEATURES} is reserved")));
    }
    if store.get_record(CFG_FTYPE, "FTYPE_CODE", code.as_str()).is_some() {
        return Err(ConfigError::duplicate("feature", &code));
    }
    let class = match text_field(record, "class") {
        Some(class) => class_id(store, &class)?,
        None => 1,
    };
    let (frequency, exclusive, stable) = parse_behavior(&text_field(record, "behavior").unwrap_or_else(|| "FM".into()))?;
    let version = int_field(record, "version")?.unwrap_or(1);
    let id = choose_id(store, CFG_FTYPE, "FTYPE_ID", int_field(record, "id")?, USER_ID_SEED)?;

    // Resolve functions before anything is written.
    let mut functions = Vec::new();
    for (field, kind) in [
        ("standardize", FunctionKind::Standardize),
        ("expression", FunctionKind::Expression),
        ("comparison", FunctionKind::Comparison),
    ] {
        if let Some(function) = text_field(record, field) {
            functions.push((kind, function_id(store, kind, &function)?));
        }
    }

    let mut row = row_from(json!({
        "FTYPE_ID": id,
        "FTYPE_CODE": code,
        "FTYPE_DESC": text_field(record, "description").unwrap_or_else(|| code.clone()),
        "FCLASS_ID": class,
        "FTYPE_FREQ": frequency,
        "FTYPE_EXCL": yes_no(exclusive),
        "FTYPE_STAB": yes_no(stable),
    }));
    for (external, internal, default) in FEATURE_FLAGS {
        row.insert(internal.into(), flag_field(record, external, default));
    }
    row.insert("RTYPE_ID".into(), 0.into());
    row.insert("VERSION".into(), version.into());
    store.add_record(CFG_FTYPE, row);

    let mut calls = Vec::new();
    for (kind, function) in functions {
        let call = NewCall {
            id: None,
            ftype_id: id,
            felem_id: NO_REFERENCE,
            function_id: function,
            exec_order: None,
        };
        calls.push((kind, insert_call(store, kind, &call)?));
    }

    let entries = lookup(record, "elementList").and_then(Value::as_array).cloned().unwrap_or_default();
    let has_comparison = calls.iter().any(|(kind, _)| *kind == FunctionKind::Comparison);
    for (position, entry) in entries.iter().enumerate() {
        let mut element = match entry {
            Value::Object(item) => item.clone(),
            other => row_from(json!({"element": value_to_string(other)})),
        };
        if has_comparison && lookup(&element, "compared").is_none() {
            element.insert("compared".into(), "Yes".into());
        }
        let order = i64::try_from(position).map_or(1, |p| p + 1);
        insert_feature_element(store, id, &element, Some(order))?;
    }

    info!("added feature {code} ({id})");
    Ok(id)
}

/// Insert the FBOM row for one element of a feature, creating the element
/// and call BOM rows as requested by the record.
fn insert_feature_element(store: &mut RecordStore, ftype_id: i64, record: &Record, order: Option<i64>) -> Result<()> {
    let code = required_code(record, "element")?;
    let felem_id = match store.get_record(CFG_FELEM, "FELEM_CODE", code.as_str()) {
        Some(row) => row_id(row, "FELEM_ID")?,
        None => {
            let mut element = Record::new();
            element.insert("element".into(), code.as_str().into());
            if let Some(datatype) = lookup(record, "datatype") {
                element.insert("datatype".into(), datatype.clone());
            }
            insert_element(store, &element)?
        }
    };

    let key = [("FTYPE_ID", Value::from(ftype_id)), ("FELEM_ID", Value::from(felem_id))];
    if store.get_record_by_fields(CFG_FBOM, &key).is_some() {
        return Err(ConfigError::duplicate("feature element", format!("{ftype_id}.{code}")));
    }
    let exec_order = match int_field(record, "execOrder")?.or(order) {
        Some(order) => order,
        None => store.next_exec_order(CFG_FBOM, ("FTYPE_ID", ftype_id.into()))?,
    };
    store.add_record(
        CFG_FBOM,
        row_from(json!({
            "FTYPE_ID": ftype_id,
            "FELEM_ID": felem_id,
            "EXEC_ORDER": exec_order,
            "DISPLAY_LEVEL": lookup(record, "display").map_or(1, display_level),
            "DISPLAY_DELIM": lookup(record, "displayDelim").cloned().unwrap_or(Value::Null),
            "DERIVED": flag_field(record, "derived", false),
        })),
    );

    for (field, kind) in [("expressed", FunctionKind::Expression), ("compared", FunctionKind::Comparison)] {
        if !lookup(record, field).is_some_and(is_yes) {
            continue;
        }
        let call = store
            .get_record_list(kind.call_table(), Some(("FTYPE_ID", ftype_id.into())))
            .into_iter()
            .min_by_key(|row| row.get("EXEC_ORDER").and_then(value_as_i64).unwrap_or(i64::MAX))
            .map(|row| row_id(row, kind.call_id()))
            .transpose()?;
        match call {
            Some(call_id) => insert_call_element(store, kind, call_id, ftype_id, felem_id, false)?,
            None => warn!("element {code} is {field} but the feature has no {} call", kind.label()),
        }
    }
    Ok(())
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
    fn test_add_feature_defaults() {
        let mut manager = manager();
        let id = manager.features().add_feature("passport").unwrap();
        assert_eq!(id, 1000);
        let feature = manager.features().get(&RecordKey::parse("PASSPORT")).unwrap();
        assert_eq!(feature["class"], "OTHER");
        assert_eq!(feature["behavior"], "FM");
        assert_eq!(feature["version"], 1);
        assert_eq!(feature["elementList"], json!([]));
        assert_eq!(feature["comparison"], "");
    }

    #[test]
    fn test_add_feature_with_elements_and_calls() {
        let mut manager = manager();
        manager
            .features()
            .add_feature_json(&record(json!({
                "feature": "ACCT",
                "class": "ISSUED_ID",
                "behavior": "F1ES",
                "comparison": "EXACT_COMP",
                "elementList": [{"element": "ID_NUM"}, {"element": "ACCT_TYPE", "compared": "No", "display": "No"}]
            })))
            .unwrap();

        let feature = manager.features().get(&RecordKey::parse("ACCT")).unwrap();
        assert_eq!(feature["behavior"], "F1ES");
        assert_eq!(feature["comparison"], "EXACT_COMP");
        assert_eq!(
            feature["elementList"],
            json!([
                {"element": "ID_NUM", "expressed": "No", "compared": "Yes", "derived": "No", "display": "Yes"},
                {"element": "ACCT_TYPE", "expressed": "No", "compared": "No", "derived": "No", "display": "No"}
            ])
        );
        assert!(manager.elements().get(&RecordKey::parse("ACCT_TYPE")).is_ok());
    }

    #[test]
    fn test_failed_add_feature_writes_nothing() {
        let mut manager = manager();
        let err = manager
            .features()
            .add_feature_json(&record(json!({"feature": "ACCT", "elementList": ["NEW_ELEM"], "comparison": "NOPE"})))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(manager.elements().get(&RecordKey::parse("NEW_ELEM")).is_err());
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_set_feature() {
        let mut manager = manager();
        manager
            .features()
            .set_feature(&record(json!({"feature": "PHONE", "behavior": "FF", "candidates": "Yes", "class": "OTHER"})))
            .unwrap();
        let phone = manager.features().get(&RecordKey::parse("PHONE")).unwrap();
        assert_eq!(phone["behavior"], "FF");
        assert_eq!(phone["candidates"], "Yes");
        assert_eq!(phone["class"], "OTHER");

        assert!(manager
            .features()
            .set_feature(&record(json!({"feature": "PHONE", "elementList": []})))
            .is_err());
        manager.features().update_feature_version(&RecordKey::parse("PHONE"), 7).unwrap();
        assert_eq!(manager.features().get(&RecordKey::parse("PHONE")).unwrap()["version"], 7);
    }

    #[test]
    fn test_feature_with_attributes_cannot_be_deleted() {
        let mut manager = manager();
        let err = manager.features().delete_feature(&RecordKey::parse("DOB")).unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { table: "CFG_ATTR", .. }));
        assert!(manager.features().get(&RecordKey::parse("DOB")).is_ok());
        assert!(manager.attributes().get(&RecordKey::parse("DATE_OF_BIRTH")).is_ok());

        manager.attributes().delete_attribute(&RecordKey::parse("DATE_OF_BIRTH")).unwrap();
        manager.features().delete_feature(&RecordKey::parse("DOB")).unwrap();
        assert!(manager.get_record("CFG_SFCALL", "FTYPE_ID", 7).is_none());
    }

    #[test]
    fn test_feature_elements() {
        let mut manager = manager();
        manager.features().add_feature("ACCT").unwrap();
        manager
            .features()
            .add_element_to_feature(&RecordKey::parse("ACCT"), "ACCT_NUM", Some(1))
            .unwrap();
        let err = manager
            .features()
            .add_element_to_feature(&RecordKey::parse("ACCT"), "ACCT_NUM", None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { .. }));

        manager
            .features()
            .set_feature_element(&record(json!({"feature": "ACCT", "element": "ACCT_NUM", "derived": "Yes"})))
            .unwrap();
        let acct = manager.features().get(&RecordKey::parse("ACCT")).unwrap();
        assert_eq!(acct["elementList"][0]["derived"], "Yes");

        // Attributes pin an element to its feature.
        let err = manager
            .features()
            .remove_element_from_feature(&RecordKey::parse("PHONE"), &RecordKey::parse("PHONE_NUM"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::HasDependents { .. }));

        manager
            .features()
            .remove_element_from_feature(&RecordKey::parse("NAME"), &RecordKey::parse("ORG_NAME"))
            .unwrap_err();
        manager.attributes().delete_attribute(&RecordKey::parse("NAME_ORG")).unwrap();
        manager
            .features()
            .remove_element_from_feature(&RecordKey::parse("NAME"), &RecordKey::parse("ORG_NAME"))
            .unwrap();
        assert!(manager.get_record_by_fields("CFG_CFBOM", &[("FTYPE_ID", 1.into()), ("FELEM_ID", 6.into())]).is_none());
        assert!(manager.get_record_by_fields("CFG_EFBOM", &[("FTYPE_ID", 1.into()), ("FELEM_ID", 6.into())]).is_none());
    }

    #[test]
    fn test_apply_template() {
        let mut manager = manager();
        manager.features().apply_template("name", "person_name").unwrap();
        let feature = manager.features().get(&RecordKey::parse("PERSON_NAME")).unwrap();
        assert_eq!(feature["class"], "NAME");
        assert_eq!(feature["comparison"], "GNR_COMP");
        assert_eq!(feature["standardize"], "PARSE_NAME");
        assert_eq!(feature["elementList"].as_array().unwrap().len(), 3);
        let attr = manager.attributes().get(&RecordKey::parse("PERSON_NAME_SURNAME")).unwrap();
        assert_eq!(attr["feature"], "PERSON_NAME");

        assert!(manager.features().apply_template("PHONE", "X").is_err());
    }

    #[test]
    fn test_hashes() {
        let mut manager = manager();
        manager.features().add_to_namehash("NAME", "MIDDLE_NAME").unwrap();
        assert!(manager
            .get_record_by_fields("CFG_EFBOM", &[("EFCALL_ID", 1.into()), ("FELEM_ID", 5.into())])
            .is_some());
        manager.features().delete_from_namehash("NAME", "MIDDLE_NAME").unwrap();
        assert!(manager.features().delete_from_namehash("NAME", "MIDDLE_NAME").unwrap_err().is_not_found());

        let err = manager.features().add_to_ssn_last4_hash("SSN", "ID_NUM").unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { .. }));
        manager.features().delete_from_ssn_last4_hash("SSN", "ID_NUM").unwrap();
    }
}
