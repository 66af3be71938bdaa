//! Function calls and their element lists.
//!
//! A call binds a feature to a function of one family. Comparison,
//! expression and distinct calls list the elements they consume in a BOM
//! table; standardize calls name at most one element directly.

use serde_json::{Value, json};

use super::{ConfigManager, choose_id, delete_cascading, int_field, require, row_from, text_field};
use crate::{
    error::{ConfigError, Result},
    manager::{elements::element_id, features::feature_ref, functions::function_id},
    schema::{CFG_FBOM, CFG_FTYPE, FunctionKind, NO_REFERENCE, USER_ID_SEED},
    store::{Record, RecordKey, RecordStore, Row, value_as_i64},
    translate::{EntityKind, Translator, is_yes, lookup, yes_no},
};

/// Call operations of one family on a loaded configuration.
pub struct Calls<'m> {
    manager: &'m mut ConfigManager,
    kind: FunctionKind,
}

impl<'m> Calls<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager, kind: FunctionKind) -> Self {
        Self { manager, kind }
    }

    pub fn list(&mut self) -> Result<Vec<Record>> {
        let kind = self.kind;
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::Call(kind), store.rows(kind.call_table())))
    }

    /// A call by ID, or every call made for a feature given by code.
    pub fn get(&mut self, key: &RecordKey) -> Result<Vec<Record>> {
        let kind = self.kind;
        let store = self.manager.get_config_data()?;
        let rows: Vec<&Row> = match key {
            RecordKey::Id(id) => store.get_record_list(kind.call_table(), Some((kind.call_id(), (*id).into()))),
            RecordKey::Code(code) => {
                let ftype_id = feature_ref(store, code)?;
                store.get_record_list(kind.call_table(), Some(("FTYPE_ID", ftype_id.into())))
            }
        };
        if rows.is_empty() {
            return Err(ConfigError::not_found(crate::schema::entity_name(kind.call_table()), key));
        }
        Ok(Translator::new(store).to_external_list(EntityKind::Call(kind), rows))
    }

    /// Add a call from `{"feature", "function", "element", "execOrder",
    /// "expressionFeature", "virtual", "elementList", "id"}`.
    ///
    /// `elementList` entries are element codes or `{"element", "feature",
    /// "required"}` objects; `feature` defaults to the call's feature.
    pub fn add_call(&mut self, record: &Record) -> Result<i64> {
        let kind = self.kind;
        let record = record.clone();
        self.manager.mutate(|store| {
            let feature = text_field(&record, "feature").ok_or_else(|| ConfigError::invalid("feature is required"))?;
            let function =
                text_field(&record, "function").ok_or_else(|| ConfigError::invalid("function is required"))?;
            let ftype_id = feature_ref(store, &feature)?;
            let func_id = function_id(store, kind, &function)?;
            let felem_id = match text_field(&record, "element") {
                Some(element) => element_id(store, &element)?,
                None => NO_REFERENCE,
            };

            let call = NewCall {
                id: int_field(&record, "id")?,
                ftype_id,
                felem_id,
                function_id: func_id,
                exec_order: int_field(&record, "execOrder")?,
            };
            let call_id = insert_call(store, kind, &call)?;

            if kind == FunctionKind::Expression {
                let mut changes = Row::new();
                if let Some(expressed) = text_field(&record, "expressionFeature") {
                    changes.insert("EFEAT_FTYPE_ID".into(), feature_ref(store, &expressed)?.into());
                }
                if let Some(flag) = lookup(&record, "virtual") {
                    changes.insert("IS_VIRTUAL".into(), yes_no(is_yes(flag)));
                }
                store.merge_record(kind.call_table(), &[(kind.call_id(), call_id.into())], changes);
            }

            for entry in lookup(&record, "elementList").and_then(Value::as_array).into_iter().flatten() {
                let (element_feature, element, required) = match entry {
                    Value::Object(item) => (
                        text_field(item, "feature").unwrap_or_else(|| feature.clone()),
                        text_field(item, "element").ok_or_else(|| ConfigError::invalid("elementList entry needs an element"))?,
                        lookup(item, "required").map(is_yes).unwrap_or(false),
                    ),
                    other => (feature.clone(), crate::store::value_to_string(other), false),
                };
                let element_ftype = feature_ref(store, &element_feature)?;
                let element_felem = element_id(store, &element)?;
                insert_call_element(store, kind, call_id, element_ftype, element_felem, required)?;
            }

            info!("added {} call {call_id} for {feature}", kind.label());
            Ok(call_id)
        })
    }

    /// Delete a call and its element list.
    pub fn delete_call(&mut self, call_id: i64) -> Result<()> {
        let kind = self.kind;
        self.manager.mutate(|store| {
            delete_cascading(store, kind.call_table(), &[(kind.call_id(), call_id.into())], &call_id.to_string())?;
            info!("deleted {} call {call_id}", kind.label());
            Ok(())
        })
    }

    /// Add `{"element", "feature", "required"}` to call `id`. `feature`
    /// defaults to the call's own feature.
    pub fn add_call_element(&mut self, record: &Record) -> Result<()> {
        let kind = self.kind;
        let record = record.clone();
        self.manager.mutate(|store| {
            let (call_id, ftype_id, felem_id) = resolve_call_element(store, kind, &record)?;
            let required = lookup(&record, "required").is_some_and(is_yes);
            insert_call_element(store, kind, call_id, ftype_id, felem_id, required)?;
            info!("added element {felem_id} to {} call {call_id}", kind.label());
            Ok(())
        })
    }

    /// Remove `{"element", "feature"}` from call `id`.
    pub fn delete_call_element(&mut self, record: &Record) -> Result<()> {
        let kind = self.kind;
        let record = record.clone();
        self.manager.mutate(|store| {
            let (call_id, ftype_id, felem_id) = resolve_call_element(store, kind, &record)?;
            remove_call_element(store, kind, call_id, ftype_id, felem_id)?;
            info!("removed element {felem_id} from {} call {call_id}", kind.label());
            Ok(())
        })
    }
}

fn bom_table(kind: FunctionKind) -> Result<&'static str> {
    kind.bom_table()
        .ok_or_else(|| ConfigError::invalid(format!("{} calls have no element list", kind.label())))
}

fn resolve_call_element(store: &RecordStore, kind: FunctionKind, record: &Record) -> Result<(i64, i64, i64)> {
    bom_table(kind)?;
    let call_id = int_field(record, "id")?.ok_or_else(|| ConfigError::invalid("id is required"))?;
    let call = require(store, kind.call_table(), kind.call_id(), kind.call_id(), &RecordKey::Id(call_id))?;
    let ftype_id = match text_field(record, "feature") {
        Some(feature) => feature_ref(store, &feature)?,
        None => call.get("FTYPE_ID").and_then(value_as_i64).unwrap_or(NO_REFERENCE),
    };
    let element = text_field(record, "element").ok_or_else(|| ConfigError::invalid("element is required"))?;
    Ok((call_id, ftype_id, element_id(store, &element)?))
}

/// Columns of a call row that differ between insertions.
pub(crate) struct NewCall {
    pub id: Option<i64>,
    pub ftype_id: i64,
    pub felem_id: i64,
    pub function_id: i64,
    pub exec_order: Option<i64>,
}

/// Insert a call row. Comparison and distinct calls are limited to one per
/// feature.
pub(crate) fn insert_call(store: &mut RecordStore, kind: FunctionKind, call: &NewCall) -> Result<i64> {
    let table = kind.call_table();
    let same_feature = store.get_record_list(table, Some(("FTYPE_ID", call.ftype_id.into())));
    if matches!(kind, FunctionKind::Comparison | FunctionKind::Distinct) && !same_feature.is_empty() {
        return Err(ConfigError::invalid(format!(
            "feature {} already has a {} call",
            call.ftype_id,
            kind.label()
        )));
    }
    let exec_order = match call.exec_order {
        Some(order) => order,
        None => store.next_exec_order(table, ("FTYPE_ID", call.ftype_id.into()))?,
    };
    let id = choose_id(store, table, kind.call_id(), call.id, USER_ID_SEED)?;

    let row = match kind {
        FunctionKind::Comparison => json!({
            "CFCALL_ID": id, "FTYPE_ID": call.ftype_id, "CFUNC_ID": call.function_id, "EXEC_ORDER": exec_order,
        }),
        FunctionKind::Expression => json!({
            "EFCALL_ID": id, "FTYPE_ID": call.ftype_id, "FELEM_ID": call.felem_id, "EFUNC_ID": call.function_id,
            "EXEC_ORDER": exec_order, "EFEAT_FTYPE_ID": NO_REFERENCE, "IS_VIRTUAL": "No",
        }),
        FunctionKind::Standardize => json!({
            "SFCALL_ID": id, "FTYPE_ID": call.ftype_id, "FELEM_ID": call.felem_id, "SFUNC_ID": call.function_id,
            "EXEC_ORDER": exec_order,
        }),
        FunctionKind::Distinct => json!({
            "DFCALL_ID": id, "FTYPE_ID": call.ftype_id, "DFUNC_ID": call.function_id, "EXEC_ORDER": exec_order,
        }),
    };
    store.add_record(table, row_from(row));
    debug!("added {} call {id}", kind.label());
    Ok(id)
}

/// Append an element to a call's BOM.
///
/// The element must belong to the feature it is listed under.
pub(crate) fn insert_call_element(
    store: &mut RecordStore,
    kind: FunctionKind,
    call_id: i64,
    ftype_id: i64,
    felem_id: i64,
    required: bool,
) -> Result<()> {
    let table = bom_table(kind)?;
    let key = [
        (kind.call_id(), Value::from(call_id)),
        ("FTYPE_ID", Value::from(ftype_id)),
        ("FELEM_ID", Value::from(felem_id)),
    ];
    if store.get_record_by_fields(table, &key).is_some() {
        return Err(ConfigError::duplicate("call element", format!("{call_id}/{ftype_id}/{felem_id}")));
    }
    if ftype_id > 0
        && store
            .get_record_by_fields(CFG_FBOM, &[("FTYPE_ID", ftype_id.into()), ("FELEM_ID", felem_id.into())])
            .is_none()
    {
        let feature = store
            .get_record(CFG_FTYPE, "FTYPE_ID", ftype_id)
            .and_then(|row| row.get("FTYPE_CODE"))
            .map(crate::store::value_to_string)
            .unwrap_or_else(|| ftype_id.to_string());
        return Err(ConfigError::invalid(format!("element {felem_id} is not part of feature {feature}")));
    }

    let exec_order = store.next_exec_order(table, (kind.call_id(), call_id.into()))?;
    let mut row = Row::new();
    row.insert(kind.call_id().into(), Value::from(call_id));
    row.insert("FTYPE_ID".into(), Value::from(ftype_id));
    row.insert("FELEM_ID".into(), Value::from(felem_id));
    row.insert("EXEC_ORDER".into(), Value::from(exec_order));
    if kind == FunctionKind::Expression {
        row.insert("FELEM_REQ".into(), yes_no(required));
    }
    store.add_record(table, row);
    Ok(())
}

/// Remove an element from a call's BOM.
pub(crate) fn remove_call_element(
    store: &mut RecordStore,
    kind: FunctionKind,
    call_id: i64,
    ftype_id: i64,
    felem_id: i64,
) -> Result<()> {
    let table = bom_table(kind)?;
    let removed = store.delete_record_by_fields(
        table,
        &[
            (kind.call_id(), Value::from(call_id)),
            ("FTYPE_ID", Value::from(ftype_id)),
            ("FELEM_ID", Value::from(felem_id)),
        ],
    );
    if removed {
        Ok(())
    } else {
        Err(ConfigError::not_found("call element", format!("{call_id}/{ftype_id}/{felem_id}")))
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
    fn test_get_by_id_or_feature() {
        let mut manager = manager();
        let by_id = manager.calls(FunctionKind::Comparison).get(&RecordKey::Id(2)).unwrap();
        assert_eq!(by_id[0]["feature"], "ADDRESS");
        assert_eq!(by_id[0]["elementList"].as_array().unwrap().len(), 4);

        let by_feature = manager.calls(FunctionKind::Expression).get(&RecordKey::parse("name")).unwrap();
        assert_eq!(by_feature.len(), 1);
        assert_eq!(by_feature[0]["function"], "NAME_HASHER");

        let err = manager.calls(FunctionKind::Comparison).get(&RecordKey::Id(99)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_one_comparison_call_per_feature() {
        let mut manager = manager();
        let err = manager
            .calls(FunctionKind::Comparison)
            .add_call(&record(json!({"feature": "NAME", "function": "EXACT_COMP"})))
            .unwrap_err();
        assert!(err.to_string().contains("already has"));

        let id = manager
            .calls(FunctionKind::Expression)
            .add_call(&record(json!({
                "feature": "ADDRESS",
                "function": "EXPRESS_BOM",
                "expressionFeature": "NAME_KEY",
                "elementList": ["ADDR_CITY", {"element": "ADDR_POSTAL_CODE", "required": "Yes"}]
            })))
            .unwrap();
        let call = manager.calls(FunctionKind::Expression).get(&RecordKey::Id(id)).unwrap();
        assert_eq!(call[0]["expressionFeature"], "NAME_KEY");
        assert_eq!(
            call[0]["elementList"],
            json!([
                {"feature": "ADDRESS", "element": "ADDR_CITY", "required": "No"},
                {"feature": "ADDRESS", "element": "ADDR_POSTAL_CODE", "required": "Yes"}
            ])
        );
    }

    #[test]
    fn test_call_elements() {
        let mut manager = manager();
        manager
            .calls(FunctionKind::Distinct)
            .add_call_element(&record(json!({"id": 1, "element": "ORG_NAME"})))
            .unwrap();
        let err = manager
            .calls(FunctionKind::Distinct)
            .add_call_element(&record(json!({"id": 1, "element": "ADDR_CITY"})))
            .unwrap_err();
        assert!(err.to_string().contains("not part of feature NAME"));

        manager
            .calls(FunctionKind::Distinct)
            .delete_call_element(&record(json!({"id": 1, "element": "ORG_NAME"})))
            .unwrap();
        assert!(manager
            .calls(FunctionKind::Standardize)
            .add_call_element(&record(json!({"id": 1, "element": "FULL_NAME"})))
            .is_err());
    }

    #[test]
    fn test_delete_call_removes_element_list() {
        let mut manager = manager();
        manager.calls(FunctionKind::Comparison).delete_call(1).unwrap();
        assert!(manager.get_record("CFG_CFBOM", "CFCALL_ID", 1).is_none());
    }
}
