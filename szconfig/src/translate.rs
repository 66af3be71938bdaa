//! Translation between internal rows and user-facing records.
//!
//! Each [`EntityKind`] owns one static table of [`FieldMap`]s. A field map
//! renames one internal column to one external field and, where the column
//! is a reference, converts between the stored ID and the code the user
//! sees. Translating out of the store can also add fields that do not exist
//! in the row at all (a feature's `elementList`, a call's `elementList`);
//! those are never read back in.
//!
//! Reference conventions:
//!
//! - `FTYPE_ID` `0` is shown as `"ALL"` and `"ALL"` is stored as `0`.
//! - A negative reference (normally `-1`) or a missing column is shown as
//!   `null`; `null` and `""` are stored as `-1`.
//! - An ID with no matching row is shown as the bare number and a number is
//!   always accepted as an ID.

use serde_json::{Value, json};

use crate::{
    error::{ConfigError, Result},
    schema::*,
    store::{Record, RecordStore, Row, value_as_i64, value_to_string},
};

/// How a column's value is converted on the way in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Copied as is.
    Plain,
    /// `FTYPE_ID` shown as `FTYPE_CODE`, with `0` meaning all features.
    Feature,
    /// `FELEM_ID` shown as `FELEM_CODE`.
    Element,
    /// `FCLASS_ID` shown as `FCLASS_CODE`.
    FeatureClass,
    /// Function ID of the given family shown as its code.
    Function(FunctionKind),
    /// `GPLAN_ID` shown as `GPLAN_CODE`.
    Plan,
    /// `FTYPE_FREQ`, `FTYPE_EXCL` and `FTYPE_STAB` combined into one
    /// behavior code such as `FME`.
    Behavior,
}

/// One internal column and the external field it is shown as.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub internal: &'static str,
    pub external: &'static str,
    pub conversion: Conversion,
}

const fn plain(internal: &'static str, external: &'static str) -> FieldMap {
    FieldMap {
        internal,
        external,
        conversion: Conversion::Plain,
    }
}

const fn conv(internal: &'static str, external: &'static str, conversion: Conversion) -> FieldMap {
    FieldMap {
        internal,
        external,
        conversion,
    }
}

/// Entity shapes the translator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    DataSource,
    Feature,
    Attribute,
    Element,
    FeatureElement,
    Function(FunctionKind),
    Call(FunctionKind),
    ComparisonThreshold,
    Rule,
    Fragment,
    GenericPlan,
    GenericThreshold,
    BehaviorOverride,
    SystemParameter,
    MatchLevel,
    FeatureClass,
}

const DATA_SOURCE: &[FieldMap] = &[
    plain("DSRC_ID", "id"),
    plain("DSRC_CODE", "dataSource"),
    plain("DSRC_DESC", "description"),
    plain("RETENTION_LEVEL", "retentionLevel"),
];

const FEATURE: &[FieldMap] = &[
    plain("FTYPE_ID", "id"),
    plain("FTYPE_CODE", "feature"),
    plain("FTYPE_DESC", "description"),
    conv("FCLASS_ID", "class", Conversion::FeatureClass),
    conv("FTYPE_FREQ", "behavior", Conversion::Behavior),
    plain("ANONYMIZE", "anonymize"),
    plain("USED_FOR_CAND", "candidates"),
    plain("DERIVED", "derived"),
    plain("PERSIST_HISTORY", "history"),
    plain("SHOW_IN_MATCH_KEY", "matchKey"),
    plain("VERSION", "version"),
];

const ATTRIBUTE: &[FieldMap] = &[
    plain("ATTR_ID", "id"),
    plain("ATTR_CODE", "attribute"),
    plain("ATTR_CLASS", "class"),
    plain("FTYPE_CODE", "feature"),
    plain("FELEM_CODE", "element"),
    plain("FELEM_REQ", "required"),
    plain("DEFAULT_VALUE", "default"),
    plain("INTERNAL", "internal"),
];

const ELEMENT: &[FieldMap] = &[
    plain("FELEM_ID", "id"),
    plain("FELEM_CODE", "element"),
    plain("FELEM_DESC", "description"),
    plain("DATA_TYPE", "datatype"),
    plain("TOKENIZE", "tokenize"),
];

const FEATURE_ELEMENT: &[FieldMap] = &[
    conv("FTYPE_ID", "feature", Conversion::Feature),
    conv("FELEM_ID", "element", Conversion::Element),
    plain("EXEC_ORDER", "execOrder"),
    plain("DISPLAY_LEVEL", "display"),
    plain("DISPLAY_DELIM", "displayDelim"),
    plain("DERIVED", "derived"),
];

macro_rules! function_fields {
    ($id:literal, $code:literal, $desc:literal) => {
        &[
            plain($id, "id"),
            plain($code, "function"),
            plain($desc, "description"),
            plain("CONNECT_STR", "connectStr"),
            plain("ANON_SUPPORT", "anonSupport"),
            plain("LANGUAGE", "language"),
        ]
    };
}

const CFUNC: &[FieldMap] = function_fields!("CFUNC_ID", "CFUNC_CODE", "CFUNC_DESC");
const EFUNC: &[FieldMap] = function_fields!("EFUNC_ID", "EFUNC_CODE", "EFUNC_DESC");
const SFUNC: &[FieldMap] = function_fields!("SFUNC_ID", "SFUNC_CODE", "SFUNC_DESC");
const DFUNC: &[FieldMap] = function_fields!("DFUNC_ID", "DFUNC_CODE", "DFUNC_DESC");

const CFCALL: &[FieldMap] = &[
    plain("CFCALL_ID", "id"),
    conv("FTYPE_ID", "feature", Conversion::Feature),
    conv("CFUNC_ID", "function", Conversion::Function(FunctionKind::Comparison)),
    plain("EXEC_ORDER", "execOrder"),
];

const EFCALL: &[FieldMap] = &[
    plain("EFCALL_ID", "id"),
    conv("FTYPE_ID", "feature", Conversion::Feature),
    conv("FELEM_ID", "element", Conversion::Element),
    conv("EFUNC_ID", "function", Conversion::Function(FunctionKind::Expression)),
    plain("EXEC_ORDER", "execOrder"),
    conv("EFEAT_FTYPE_ID", "expressionFeature", Conversion::Feature),
    plain("IS_VIRTUAL", "virtual"),
];

const SFCALL: &[FieldMap] = &[
    plain("SFCALL_ID", "id"),
    conv("FTYPE_ID", "feature", Conversion::Feature),
    conv("FELEM_ID", "element", Conversion::Element),
    conv("SFUNC_ID", "function", Conversion::Function(FunctionKind::Standardize)),
    plain("EXEC_ORDER", "execOrder"),
];

const DFCALL: &[FieldMap] = &[
    plain("DFCALL_ID", "id"),
    conv("FTYPE_ID", "feature", Conversion::Feature),
    conv("DFUNC_ID", "function", Conversion::Function(FunctionKind::Distinct)),
    plain("EXEC_ORDER", "execOrder"),
];

const CFRTN: &[FieldMap] = &[
    plain("CFRTN_ID", "id"),
    conv("CFUNC_ID", "function", Conversion::Function(FunctionKind::Comparison)),
    plain("CFUNC_RTNVAL", "scoreName"),
    conv("FTYPE_ID", "feature", Conversion::Feature),
    plain("EXEC_ORDER", "execOrder"),
    plain("SAME_SCORE", "sameScore"),
    plain("CLOSE_SCORE", "closeScore"),
    plain("LIKELY_SCORE", "likelyScore"),
    plain("PLAUSIBLE_SCORE", "plausibleScore"),
    plain("UN_LIKELY_SCORE", "unlikelyScore"),
];

const RULE: &[FieldMap] = &[
    plain("ERRULE_ID", "id"),
    plain("ERRULE_CODE", "rule"),
    plain("ERRULE_DESC", "description"),
    plain("RESOLVE", "resolve"),
    plain("RELATE", "relate"),
    plain("RTYPE_ID", "rtype_id"),
    plain("QUAL_ERFRAG_CODE", "fragment"),
    plain("DISQ_ERFRAG_CODE", "disqualifier"),
    plain("ERRULE_TIER", "tier"),
];

const FRAGMENT: &[FieldMap] = &[
    plain("ERFRAG_ID", "id"),
    plain("ERFRAG_CODE", "fragment"),
    plain("ERFRAG_DESC", "description"),
    plain("ERFRAG_SOURCE", "source"),
    plain("ERFRAG_DEPENDS", "depends"),
];

const GENERIC_PLAN: &[FieldMap] = &[
    plain("GPLAN_ID", "id"),
    plain("GPLAN_CODE", "plan"),
    plain("GPLAN_DESC", "description"),
];

const GENERIC_THRESHOLD: &[FieldMap] = &[
    conv("GPLAN_ID", "plan", Conversion::Plan),
    plain("BEHAVIOR", "behavior"),
    conv("FTYPE_ID", "feature", Conversion::Feature),
    plain("CANDIDATE_CAP", "candidateCap"),
    plain("SCORING_CAP", "scoringCap"),
    plain("SEND_TO_REDO", "sendToRedo"),
];

const BEHAVIOR_OVERRIDE: &[FieldMap] = &[
    conv("FTYPE_ID", "feature", Conversion::Feature),
    plain("UTYPE_CODE", "usageType"),
    conv("FTYPE_FREQ", "behavior", Conversion::Behavior),
];

const SYSTEM_PARAMETER: &[FieldMap] = &[
    plain("SPARM_ID", "id"),
    plain("SPARM_CODE", "parameter"),
    plain("SPARM_VALUE", "value"),
    plain("SPARM_DESC", "description"),
];

const MATCH_LEVEL: &[FieldMap] = &[
    plain("RTYPE_ID", "level"),
    plain("RTYPE_CODE", "code"),
    plain("RTYPE_DESC", "description"),
];

const FEATURE_CLASS: &[FieldMap] = &[
    plain("FCLASS_ID", "id"),
    plain("FCLASS_CODE", "class"),
    plain("FCLASS_DESC", "description"),
];

impl EntityKind {
    /// Field maps in external display order.
    pub fn fields(self) -> &'static [FieldMap] {
        match self {
            EntityKind::DataSource => DATA_SOURCE,
            EntityKind::Feature => FEATURE,
            EntityKind::Attribute => ATTRIBUTE,
            EntityKind::Element => ELEMENT,
            EntityKind::FeatureElement => FEATURE_ELEMENT,
            EntityKind::Function(FunctionKind::Comparison) => CFUNC,
            EntityKind::Function(FunctionKind::Expression) => EFUNC,
            EntityKind::Function(FunctionKind::Standardize) => SFUNC,
            EntityKind::Function(FunctionKind::Distinct) => DFUNC,
            EntityKind::Call(FunctionKind::Comparison) => CFCALL,
            EntityKind::Call(FunctionKind::Expression) => EFCALL,
            EntityKind::Call(FunctionKind::Standardize) => SFCALL,
            EntityKind::Call(FunctionKind::Distinct) => DFCALL,
            EntityKind::ComparisonThreshold => CFRTN,
            EntityKind::Rule => RULE,
            EntityKind::Fragment => FRAGMENT,
            EntityKind::GenericPlan => GENERIC_PLAN,
            EntityKind::GenericThreshold => GENERIC_THRESHOLD,
            EntityKind::BehaviorOverride => BEHAVIOR_OVERRIDE,
            EntityKind::SystemParameter => SYSTEM_PARAMETER,
            EntityKind::MatchLevel => MATCH_LEVEL,
            EntityKind::FeatureClass => FEATURE_CLASS,
        }
    }

    /// Table the entity's rows live in.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::DataSource => CFG_DSRC,
            EntityKind::Feature => CFG_FTYPE,
            EntityKind::Attribute => CFG_ATTR,
            EntityKind::Element => CFG_FELEM,
            EntityKind::FeatureElement => CFG_FBOM,
            EntityKind::Function(kind) => kind.function_table(),
            EntityKind::Call(kind) => kind.call_table(),
            EntityKind::ComparisonThreshold => CFG_CFRTN,
            EntityKind::Rule => CFG_ERRULE,
            EntityKind::Fragment => CFG_ERFRAG,
            EntityKind::GenericPlan => CFG_GPLAN,
            EntityKind::GenericThreshold => CFG_GENERIC_THRESHOLD,
            EntityKind::BehaviorOverride => CFG_FBOVR,
            EntityKind::SystemParameter => CFG_SPARM,
            EntityKind::MatchLevel => CFG_RTYPE,
            EntityKind::FeatureClass => CFG_FCLASS,
        }
    }

    /// Map for an external field name, matched case-insensitively.
    pub fn field(self, external: &str) -> Option<&'static FieldMap> {
        self.fields()
            .iter()
            .find(|m| m.external.eq_ignore_ascii_case(external))
    }
}

/// Whether a stored flag reads as set.
pub fn is_yes(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.to_ascii_uppercase().as_str(), "YES" | "Y" | "1" | "TRUE"),
        _ => false,
    }
}

/// Normalise a flag to `"Yes"`/`"No"`.
pub fn yes_no(flag: bool) -> Value {
    Value::from(if flag { "Yes" } else { "No" })
}

/// Combine frequency, exclusivity and stability into one behavior code.
pub fn encode_behavior(frequency: &str, exclusive: bool, stable: bool) -> String {
    let mut code = frequency.to_uppercase();
    if exclusive {
        code.push('E');
    }
    if stable {
        code.push('S');
    }
    code
}

/// Split a behavior code such as `FMES` into `("FM", true, true)`.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] for unknown frequencies or suffixes.
pub fn parse_behavior(code: &str) -> Result<(String, bool, bool)> {
    let code = code.trim().to_uppercase();
    let frequency = BEHAVIOR_CODES
        .iter()
        .map(|(frequency, _)| *frequency)
        .find(|f| code.starts_with(f))
        .ok_or_else(|| ConfigError::invalid(format!("invalid behavior code: {code}")))?;
    let (exclusive, stable) = match &code[frequency.len()..] {
        "" => (false, false),
        "E" => (true, false),
        "S" => (false, true),
        "ES" => (true, true),
        _ => return Err(ConfigError::invalid(format!("invalid behavior code: {code}"))),
    };
    Ok((frequency.to_string(), exclusive, stable))
}

/// Look up a value in a user record by field name, ignoring case.
pub fn lookup<'r>(record: &'r Record, name: &str) -> Option<&'r Value> {
    record
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Converts rows to records and back against one document.
pub struct Translator<'a> {
    store: &'a RecordStore,
}

impl<'a> Translator<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Rename and convert a row into its user-facing shape.
    pub fn to_external(&self, kind: EntityKind, row: &Row) -> Record {
        let mut record = Record::new();
        for map in kind.fields() {
            record.insert(map.external.to_string(), self.export_field(map, row));
        }
        match kind {
            EntityKind::Feature => self.decorate_feature(row, &mut record),
            EntityKind::Call(function) => self.decorate_call(function, row, &mut record),
            _ => {}
        }
        record
    }

    /// Translate a list of rows.
    pub fn to_external_list<'r>(&self, kind: EntityKind, rows: impl IntoIterator<Item = &'r Row>) -> Vec<Record> {
        rows.into_iter().map(|row| self.to_external(kind, row)).collect()
    }

    /// Rename and convert a user record into row columns.
    ///
    /// Only fields named in the entity's map are read. Fields synthesized by
    /// [`Translator::to_external`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when a referenced code does not
    /// exist and [`ConfigError::Validation`] for malformed behavior codes.
    pub fn to_internal(&self, kind: EntityKind, record: &Record) -> Result<Row> {
        let mut row = Row::new();
        for map in kind.fields() {
            if let Some(value) = lookup(record, map.external) {
                self.import_field(map, value, &mut row)?;
            }
        }
        Ok(row)
    }

    fn export_field(&self, map: &FieldMap, row: &Row) -> Value {
        match map.conversion {
            Conversion::Plain => row.get(map.internal).cloned().unwrap_or(Value::Null),
            Conversion::Behavior => match row.get(map.internal) {
                Some(freq) if !freq.is_null() => Value::from(encode_behavior(
                    &value_to_string(freq),
                    row.get("FTYPE_EXCL").is_some_and(is_yes),
                    row.get("FTYPE_STAB").is_some_and(is_yes),
                )),
                _ => Value::Null,
            },
            reference => {
                let Some(raw) = row.get(map.internal) else {
                    return Value::Null;
                };
                let Some(id) = value_as_i64(raw) else {
                    return raw.clone();
                };
                self.code_for(reference, id)
            }
        }
    }

    fn import_field(&self, map: &FieldMap, value: &Value, row: &mut Row) -> Result<()> {
        match map.conversion {
            Conversion::Plain => {
                row.insert(map.internal.to_string(), value.clone());
            }
            Conversion::Behavior => {
                let (frequency, exclusive, stable) = parse_behavior(&value_to_string(value))?;
                row.insert(map.internal.to_string(), Value::from(frequency));
                row.insert("FTYPE_EXCL".to_string(), yes_no(exclusive));
                row.insert("FTYPE_STAB".to_string(), yes_no(stable));
            }
            reference => {
                let id = self.id_for(reference, value)?;
                row.insert(map.internal.to_string(), Value::from(id));
            }
        }
        Ok(())
    }

    fn reference_table(reference: Conversion) -> (&'static str, &'static str, &'static str, &'static str) {
        match reference {
            Conversion::Feature => (CFG_FTYPE, "FTYPE_ID", "FTYPE_CODE", "feature"),
            Conversion::Element => (CFG_FELEM, "FELEM_ID", "FELEM_CODE", "element"),
            Conversion::FeatureClass => (CFG_FCLASS, "FCLASS_ID", "FCLASS_CODE", "feature class"),
            Conversion::Function(kind) => (
                kind.function_table(),
                kind.function_id(),
                kind.function_code(),
                "function",
            ),
            Conversion::Plan => (CFG_GPLAN, "GPLAN_ID", "GPLAN_CODE", "generic plan"),
            Conversion::Plain | Conversion::Behavior => ("", "", "", "record"),
        }
    }

    fn code_for(&self, reference: Conversion, id: i64) -> Value {
        if reference == Conversion::Feature && id == ALL_FEATURES_ID {
            return Value::from(ALL_FEATURES);
        }
        if id < 0 {
            return Value::Null;
        }
        let (table, id_field, code_field, _) = Self::reference_table(reference);
        self.store
            .get_record(table, id_field, id)
            .and_then(|row| row.get(code_field))
            .cloned()
            .unwrap_or_else(|| Value::from(id))
    }

    fn id_for(&self, reference: Conversion, value: &Value) -> Result<i64> {
        if let Some(id) = value.as_i64() {
            return Ok(id);
        }
        let code = value_to_string(value).trim().to_uppercase();
        if code.is_empty() {
            return Ok(NO_REFERENCE);
        }
        if reference == Conversion::Feature && code == ALL_FEATURES {
            return Ok(ALL_FEATURES_ID);
        }
        let (table, id_field, code_field, entity) = Self::reference_table(reference);
        self.store
            .get_record(table, code_field, code.as_str())
            .and_then(|row| row.get(id_field))
            .and_then(value_as_i64)
            .ok_or_else(|| ConfigError::not_found(entity, code))
    }

    /// Code of the first function called for a feature, by `EXEC_ORDER`.
    fn first_function(&self, kind: FunctionKind, ftype_id: &Value) -> Value {
        let call = self
            .store
            .rows(kind.call_table())
            .filter(|row| row.get("FTYPE_ID").is_some_and(|v| value_as_i64(v) == value_as_i64(ftype_id)))
            .min_by_key(|row| row.get("EXEC_ORDER").and_then(value_as_i64).unwrap_or(i64::MAX));
        match call.and_then(|row| row.get(kind.function_id())).and_then(value_as_i64) {
            Some(id) => self.code_for(Conversion::Function(kind), id),
            None => Value::from(""),
        }
    }

    fn has_bom_row(&self, table: &str, ftype_id: &Value, felem_id: &Value) -> bool {
        self.store
            .get_record_by_fields(
                table,
                &[("FTYPE_ID", ftype_id.clone()), ("FELEM_ID", felem_id.clone())],
            )
            .is_some()
    }

    fn decorate_feature(&self, row: &Row, record: &mut Record) {
        let ftype_id = row.get("FTYPE_ID").cloned().unwrap_or(Value::Null);
        record.insert(
            "standardize".into(),
            self.first_function(FunctionKind::Standardize, &ftype_id),
        );
        record.insert(
            "expression".into(),
            self.first_function(FunctionKind::Expression, &ftype_id),
        );
        record.insert(
            "comparison".into(),
            self.first_function(FunctionKind::Comparison, &ftype_id),
        );

        let mut members: Vec<&Row> = self
            .store
            .get_record_list(CFG_FBOM, Some(("FTYPE_ID", ftype_id.clone())));
        members.sort_by_key(|fbom| fbom.get("EXEC_ORDER").and_then(value_as_i64).unwrap_or(0));

        let elements: Vec<Value> = members
            .into_iter()
            .map(|fbom| {
                let felem_id = fbom.get("FELEM_ID").cloned().unwrap_or(Value::Null);
                let element = value_as_i64(&felem_id)
                    .map(|id| self.code_for(Conversion::Element, id))
                    .unwrap_or(Value::Null);
                let display = fbom
                    .get("DISPLAY_LEVEL")
                    .and_then(value_as_i64)
                    .is_some_and(|level| level != 0);
                json!({
                    "element": element,
                    "expressed": yes_no(self.has_bom_row(CFG_EFBOM, &ftype_id, &felem_id)),
                    "compared": yes_no(self.has_bom_row(CFG_CFBOM, &ftype_id, &felem_id)),
                    "derived": yes_no(fbom.get("DERIVED").is_some_and(is_yes)),
                    "display": yes_no(display),
                })
            })
            .collect();
        record.insert("elementList".into(), Value::Array(elements));
    }

    fn decorate_call(&self, kind: FunctionKind, row: &Row, record: &mut Record) {
        let Some(bom_table) = kind.bom_table() else {
            return;
        };
        let call_id = row.get(kind.call_id()).cloned().unwrap_or(Value::Null);
        let mut members = self
            .store
            .get_record_list(bom_table, Some((kind.call_id(), call_id)));
        members.sort_by_key(|bom| bom.get("EXEC_ORDER").and_then(value_as_i64).unwrap_or(0));

        let elements: Vec<Value> = members
            .into_iter()
            .map(|bom| {
                let mut entry = Record::new();
                entry.insert(
                    "feature".into(),
                    bom.get("FTYPE_ID")
                        .and_then(value_as_i64)
                        .map(|id| self.code_for(Conversion::Feature, id))
                        .unwrap_or(Value::Null),
                );
                entry.insert(
                    "element".into(),
                    bom.get("FELEM_ID")
                        .and_then(value_as_i64)
                        .map(|id| self.code_for(Conversion::Element, id))
                        .unwrap_or(Value::Null),
                );
                if let Some(required) = bom.get("FELEM_REQ") {
                    entry.insert("required".into(), required.clone());
                }
                Value::Object(entry)
            })
            .collect();
        record.insert("elementList".into(), Value::Array(elements));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn sample_store() -> RecordStore {
        RecordStore::from_value(json!({
            "G2_CONFIG": {
                "CFG_FCLASS": [{"FCLASS_ID": 1, "FCLASS_CODE": "OTHER"}, {"FCLASS_ID": 2, "FCLASS_CODE": "NAME"}],
                "CFG_FTYPE": [{
                    "FTYPE_ID": 1, "FTYPE_CODE": "NAME", "FCLASS_ID": 2,
                    "FTYPE_FREQ": "NAME", "FTYPE_EXCL": "No", "FTYPE_STAB": "No",
                    "ANONYMIZE": "No", "USED_FOR_CAND": "No", "DERIVED": "No",
                    "SHOW_IN_MATCH_KEY": "Yes", "VERSION": 2
                }],
                "CFG_FELEM": [
                    {"FELEM_ID": 2, "FELEM_CODE": "FULL_NAME"},
                    {"FELEM_ID": 3, "FELEM_CODE": "SURNAME"}
                ],
                "CFG_FBOM": [
                    {"FTYPE_ID": 1, "FELEM_ID": 3, "EXEC_ORDER": 2, "DISPLAY_LEVEL": 0, "DERIVED": "No"},
                    {"FTYPE_ID": 1, "FELEM_ID": 2, "EXEC_ORDER": 1, "DISPLAY_LEVEL": 1, "DERIVED": "No"}
                ],
                "CFG_CFUNC": [{"CFUNC_ID": 1, "CFUNC_CODE": "NAME_COMP"}],
                "CFG_EFUNC": [{"EFUNC_ID": 7, "EFUNC_CODE": "NAME_KEY"}],
                "CFG_CFCALL": [{"CFCALL_ID": 5, "FTYPE_ID": 1, "CFUNC_ID": 1, "EXEC_ORDER": 1}],
                "CFG_CFBOM": [{"CFCALL_ID": 5, "FTYPE_ID": 1, "FELEM_ID": 2, "EXEC_ORDER": 1}],
                "CFG_CFRTN": [{"CFRTN_ID": 1, "CFUNC_ID": 1, "FTYPE_ID": 0, "CFUNC_RTNVAL": "FULL_SCORE"}]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_behavior_codes() {
        assert_eq!(parse_behavior("fmes").unwrap(), ("FM".into(), true, true));
        assert_eq!(parse_behavior("NAME").unwrap(), ("NAME".into(), false, false));
        assert_eq!(parse_behavior("NONE").unwrap(), ("NONE".into(), false, false));
        assert_eq!(parse_behavior("F1E").unwrap(), ("F1".into(), true, false));
        assert!(parse_behavior("FMX").is_err());
        assert!(parse_behavior("XX").is_err());
        assert_eq!(encode_behavior("FVM", false, true), "FVMS");
    }

    #[test]
    fn test_feature_to_external() {
        let store = sample_store();
        let translator = Translator::new(&store);
        let row = store.get_record(CFG_FTYPE, "FTYPE_CODE", "NAME").unwrap();
        let feature = translator.to_external(EntityKind::Feature, row);

        assert_eq!(feature["feature"], json!("NAME"));
        assert_eq!(feature["class"], json!("NAME"));
        assert_eq!(feature["behavior"], json!("NAME"));
        assert_eq!(feature["comparison"], json!("NAME_COMP"));
        assert_eq!(feature["expression"], json!(""));
        let elements = feature["elementList"].as_array().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0]["element"], json!("FULL_NAME"));
        assert_eq!(elements[0]["compared"], json!("Yes"));
        assert_eq!(elements[0]["display"], json!("Yes"));
        assert_eq!(elements[1]["element"], json!("SURNAME"));
        assert_eq!(elements[1]["compared"], json!("No"));
    }

    #[test]
    fn test_all_features_sentinel() {
        let store = sample_store();
        let translator = Translator::new(&store);
        let row = store.get_record(CFG_CFRTN, "CFRTN_ID", 1).unwrap();
        let threshold = translator.to_external(EntityKind::ComparisonThreshold, row);
        assert_eq!(threshold["feature"], json!("ALL"));
        assert_eq!(threshold["function"], json!("NAME_COMP"));

        let back = translator
            .to_internal(EntityKind::ComparisonThreshold, &threshold)
            .unwrap();
        assert_eq!(back["FTYPE_ID"], json!(0));
        assert_eq!(back["CFUNC_ID"], json!(1));
    }

    #[test]
    fn test_round_trip_mapped_fields() {
        let store = sample_store();
        let translator = Translator::new(&store);
        let external = record(json!({
            "id": 1, "feature": "NAME", "class": "OTHER", "behavior": "FME",
            "anonymize": "No", "candidates": "Yes", "derived": "No",
            "matchKey": "Yes", "version": 3
        }));
        let row = translator.to_internal(EntityKind::Feature, &external).unwrap();
        assert_eq!(row["FCLASS_ID"], json!(1));
        assert_eq!(row["FTYPE_EXCL"], json!("Yes"));

        let again = translator.to_external(EntityKind::Feature, &row);
        for (key, value) in &external {
            assert_eq!(&again[key], value, "field {key}");
        }
    }

    /// Every field of `external` survives `to_internal` then `to_external`.
    fn assert_round_trip(translator: &Translator<'_>, kind: EntityKind, external: &Record) -> Row {
        let row = translator.to_internal(kind, external).unwrap();
        let again = translator.to_external(kind, &row);
        for (key, value) in external {
            assert_eq!(&again[key], value, "{kind:?} field {key}");
        }
        row
    }

    #[test]
    fn test_round_trip_plain_kinds() {
        let store = sample_store();
        let translator = Translator::new(&store);

        let source = record(json!({
            "id": 1001, "dataSource": "CUSTOMER", "description": "", "retentionLevel": "Remember"
        }));
        let row = assert_round_trip(&translator, EntityKind::DataSource, &source);
        assert_eq!(row["DSRC_DESC"], json!(""));

        let attribute = record(json!({
            "id": 1001, "attribute": "NAME_FULL", "class": "IDENTITY", "feature": "NAME",
            "element": "FULL_NAME", "required": "No", "default": null, "internal": "No"
        }));
        let row = assert_round_trip(&translator, EntityKind::Attribute, &attribute);
        assert_eq!(row["FTYPE_CODE"], json!("NAME"));
        assert_eq!(row["DEFAULT_VALUE"], Value::Null);

        let element = record(json!({
            "id": 4, "element": "GIVEN_NAME", "description": "", "datatype": "string", "tokenize": "No"
        }));
        assert_round_trip(&translator, EntityKind::Element, &element);

        let function = record(json!({
            "id": 7, "function": "NAME_KEY", "description": "Name keys", "connectStr": "g2NameKeys",
            "anonSupport": "Yes", "language": null
        }));
        let row = assert_round_trip(&translator, EntityKind::Function(FunctionKind::Expression), &function);
        assert_eq!(row["EFUNC_CODE"], json!("NAME_KEY"));

        let rule = record(json!({
            "id": 100, "rule": "SAME_A1", "description": "", "resolve": "Yes", "relate": "No",
            "rtype_id": 1, "fragment": "SAME_A1", "disqualifier": null, "tier": 10
        }));
        let row = assert_round_trip(&translator, EntityKind::Rule, &rule);
        assert_eq!(row["DISQ_ERFRAG_CODE"], Value::Null);

        let fragment = record(json!({
            "id": 11, "fragment": "SAME_A1", "description": "",
            "source": "./FRAGMENT[./SAME_NAME>0]", "depends": ""
        }));
        let row = assert_round_trip(&translator, EntityKind::Fragment, &fragment);
        assert_eq!(row["ERFRAG_DEPENDS"], json!(""));
    }

    #[test]
    fn test_round_trip_call_references() {
        let store = sample_store();
        let translator = Translator::new(&store);

        let call = record(json!({
            "id": 20, "feature": "NAME", "element": "FULL_NAME", "function": "NAME_KEY",
            "execOrder": 1, "expressionFeature": null, "virtual": "No"
        }));
        let row = assert_round_trip(&translator, EntityKind::Call(FunctionKind::Expression), &call);
        assert_eq!(row["FTYPE_ID"], json!(1));
        assert_eq!(row["FELEM_ID"], json!(2));
        assert_eq!(row["EFUNC_ID"], json!(7));
        assert_eq!(row["EFEAT_FTYPE_ID"], json!(NO_REFERENCE));

        // An empty reference is stored as -1 and read back as null.
        let unset = record(json!({"id": 21, "feature": "", "element": "", "function": "NAME_KEY"}));
        let row = translator
            .to_internal(EntityKind::Call(FunctionKind::Expression), &unset)
            .unwrap();
        assert_eq!(row["FTYPE_ID"], json!(NO_REFERENCE));
        assert_eq!(row["FELEM_ID"], json!(NO_REFERENCE));
        let shown = translator.to_external(EntityKind::Call(FunctionKind::Expression), &row);
        assert_eq!(shown["feature"], Value::Null);
        assert_eq!(shown["element"], Value::Null);
        assert_eq!(shown["elementList"], json!([]));

        let comparison = record(json!({"id": 5, "feature": "NAME", "function": "NAME_COMP", "execOrder": 1}));
        assert_round_trip(&translator, EntityKind::Call(FunctionKind::Comparison), &comparison);
    }

    #[test]
    fn test_call_element_list() {
        let store = sample_store();
        let translator = Translator::new(&store);
        let row = store.get_record(CFG_CFCALL, "CFCALL_ID", 5).unwrap();
        let call = translator.to_external(EntityKind::Call(FunctionKind::Comparison), row);
        assert_eq!(call["feature"], json!("NAME"));
        assert_eq!(call["elementList"], json!([{"feature": "NAME", "element": "FULL_NAME"}]));
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let store = sample_store();
        let translator = Translator::new(&store);
        let err = translator
            .to_internal(EntityKind::Call(FunctionKind::Comparison), &record(json!({"feature": "PHONE"})))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_input_field_names_ignore_case() {
        let store = sample_store();
        let translator = Translator::new(&store);
        let row = translator
            .to_internal(EntityKind::DataSource, &record(json!({"DATASOURCE": "CUSTOMER"})))
            .unwrap();
        assert_eq!(row["DSRC_CODE"], json!("CUSTOMER"));
    }
}
