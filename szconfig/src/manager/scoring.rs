//! Generic plans, generic thresholds and behavior overrides.
//!
//! A generic plan (`CFG_GPLAN`) groups candidate and scoring caps per
//! behavior (`CFG_GENERIC_THRESHOLD`). Behavior overrides (`CFG_FBOVR`)
//! give a feature a different behavior for one usage type.

use serde_json::{Value, json};

use super::{ConfigManager, choose_id, delete_cascading, int_field, require, required_code, row_from, row_id, text_field};
use crate::{
    error::{ConfigError, Result},
    manager::features::feature_ref,
    schema::{ALL_FEATURES, CFG_FBOVR, CFG_GENERIC_THRESHOLD, CFG_GPLAN},
    store::{Record, RecordKey, RecordStore, Row},
    translate::{EntityKind, Translator, is_yes, lookup, parse_behavior, yes_no},
};

/// The ingestion plan every configuration needs.
const PROTECTED_PLAN: i64 = 1;

/// Plan, threshold and override operations on a loaded configuration.
pub struct Scoring<'m> {
    manager: &'m mut ConfigManager,
}

impl<'m> Scoring<'m> {
    pub(super) fn new(manager: &'m mut ConfigManager) -> Self {
        Self { manager }
    }

    pub fn list_plans(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::GenericPlan, store.rows(CFG_GPLAN)))
    }

    /// Copy plan `existingPlan` and its thresholds to a new plan from
    /// `{"existingPlan", "newPlan", "description"}`.
    pub fn clone_plan(&mut self, record: &Record) -> Result<i64> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let source = text_field(&record, "existingPlan")
                .ok_or_else(|| ConfigError::invalid("existingPlan is required"))?;
            let source_id = plan_id(store, &source)?;
            let code = required_code(&record, "newPlan")?;
            if store.get_record(CFG_GPLAN, "GPLAN_CODE", code.as_str()).is_some() {
                return Err(ConfigError::duplicate("generic plan", &code));
            }
            let id = choose_id(store, CFG_GPLAN, "GPLAN_ID", None, 1)?;
            store.add_record(
                CFG_GPLAN,
                row_from(json!({
                    "GPLAN_ID": id,
                    "GPLAN_CODE": code,
                    "GPLAN_DESC": text_field(&record, "description").unwrap_or_else(|| code.clone()),
                })),
            );

            let copies: Vec<Row> = store
                .get_record_list(CFG_GENERIC_THRESHOLD, Some(("GPLAN_ID", source_id.into())))
                .into_iter()
                .map(|row| {
                    let mut copy = row.clone();
                    copy.insert("GPLAN_ID".into(), id.into());
                    copy
                })
                .collect();
            let count = copies.len();
            for copy in copies {
                store.add_record(CFG_GENERIC_THRESHOLD, copy);
            }
            info!("cloned plan {source} to {code} ({id}) with {count} thresholds");
            Ok(id)
        })
    }

    /// Delete a plan and its thresholds. Plan 1 cannot be deleted.
    pub fn delete_plan(&mut self, key: &RecordKey) -> Result<()> {
        self.manager.mutate(|store| {
            let row = require(store, CFG_GPLAN, "GPLAN_ID", "GPLAN_CODE", key)?;
            let id = row_id(row, "GPLAN_ID")?;
            if id == PROTECTED_PLAN {
                return Err(ConfigError::invalid(format!("generic plan {key} cannot be deleted")));
            }
            delete_cascading(store, CFG_GPLAN, &[("GPLAN_ID", id.into())], &key.to_string())?;
            info!("deleted generic plan {key}");
            Ok(())
        })
    }

    /// Thresholds of every plan, or of one.
    pub fn list_thresholds(&mut self, plan: Option<&str>) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        let rows = match plan {
            Some(plan) => store.get_record_list(CFG_GENERIC_THRESHOLD, Some(("GPLAN_ID", plan_id(store, plan)?.into()))),
            None => store.get_record_list(CFG_GENERIC_THRESHOLD, None),
        };
        Ok(Translator::new(store).to_external_list(EntityKind::GenericThreshold, rows))
    }

    /// Add a threshold from `{"plan", "behavior", "feature",
    /// "candidateCap", "scoringCap", "sendToRedo"}`.
    ///
    /// `feature` defaults to `ALL`. `scoringCap` -1 means no cap.
    pub fn add_threshold(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let key = ThresholdKey::from_record(store, &record)?;
            if store.get_record_by_fields(CFG_GENERIC_THRESHOLD, &key.fields()).is_some() {
                return Err(ConfigError::duplicate("generic threshold", &key.label));
            }
            let candidate_cap = int_field(&record, "candidateCap")?
                .ok_or_else(|| ConfigError::invalid("candidateCap is required"))?;
            let scoring_cap = int_field(&record, "scoringCap")?
                .ok_or_else(|| ConfigError::invalid("scoringCap is required"))?;
            store.add_record(
                CFG_GENERIC_THRESHOLD,
                row_from(json!({
                    "GPLAN_ID": key.plan,
                    "BEHAVIOR": key.behavior,
                    "FTYPE_ID": key.feature,
                    "CANDIDATE_CAP": candidate_cap,
                    "SCORING_CAP": scoring_cap,
                    "SEND_TO_REDO": yes_no(lookup(&record, "sendToRedo").map_or(true, is_yes)),
                })),
            );
            info!("added generic threshold {}", key.label);
            Ok(())
        })
    }

    /// Shorthand for a threshold that applies to every feature.
    pub fn add_entity_score(&mut self, record: &Record) -> Result<()> {
        let mut record = record.clone();
        record.retain(|name, _| !name.eq_ignore_ascii_case("feature"));
        record.insert("feature".into(), ALL_FEATURES.into());
        self.add_threshold(&record)
    }

    /// Change the caps of the threshold selected by plan, behavior and
    /// feature.
    pub fn set_threshold(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let key = ThresholdKey::from_record(store, &record)?;
            let mut changes = Row::new();
            if let Some(cap) = int_field(&record, "candidateCap")? {
                changes.insert("CANDIDATE_CAP".into(), cap.into());
            }
            if let Some(cap) = int_field(&record, "scoringCap")? {
                changes.insert("SCORING_CAP".into(), cap.into());
            }
            if let Some(flag) = lookup(&record, "sendToRedo") {
                changes.insert("SEND_TO_REDO".into(), yes_no(is_yes(flag)));
            }
            if changes.is_empty() {
                return Err(ConfigError::invalid("nothing to change"));
            }
            if !store.merge_record(CFG_GENERIC_THRESHOLD, &key.fields(), changes) {
                return Err(ConfigError::not_found("generic threshold", &key.label));
            }
            info!("updated generic threshold {}", key.label);
            Ok(())
        })
    }

    pub fn delete_threshold(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let key = ThresholdKey::from_record(store, &record)?;
            if !store.delete_record_by_fields(CFG_GENERIC_THRESHOLD, &key.fields()) {
                return Err(ConfigError::not_found("generic threshold", &key.label));
            }
            info!("deleted generic threshold {}", key.label);
            Ok(())
        })
    }

    pub fn list_overrides(&mut self) -> Result<Vec<Record>> {
        let store = self.manager.get_config_data()?;
        Ok(Translator::new(store).to_external_list(EntityKind::BehaviorOverride, store.rows(CFG_FBOVR)))
    }

    /// Add `{"feature", "usageType", "behavior"}`.
    pub fn add_override(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let (ftype_id, usage, label) = override_key(store, &record)?;
            let behavior = text_field(&record, "behavior").ok_or_else(|| ConfigError::invalid("behavior is required"))?;
            let (frequency, exclusive, stable) = parse_behavior(&behavior)?;
            let key = [("FTYPE_ID", Value::from(ftype_id)), ("UTYPE_CODE", Value::from(usage.as_str()))];
            if store.get_record_by_fields(CFG_FBOVR, &key).is_some() {
                return Err(ConfigError::duplicate("behavior override", &label));
            }
            store.add_record(
                CFG_FBOVR,
                row_from(json!({
                    "FTYPE_ID": ftype_id,
                    "UTYPE_CODE": usage,
                    "FTYPE_FREQ": frequency,
                    "FTYPE_EXCL": yes_no(exclusive),
                    "FTYPE_STAB": yes_no(stable),
                })),
            );
            info!("added behavior override {label}");
            Ok(())
        })
    }

    /// Delete the override selected by `{"feature", "usageType"}`.
    pub fn delete_override(&mut self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.manager.mutate(|store| {
            let (ftype_id, usage, label) = override_key(store, &record)?;
            let key = [("FTYPE_ID", Value::from(ftype_id)), ("UTYPE_CODE", Value::from(usage))];
            if !store.delete_record_by_fields(CFG_FBOVR, &key) {
                return Err(ConfigError::not_found("behavior override", &label));
            }
            info!("deleted behavior override {label}");
            Ok(())
        })
    }
}

fn plan_id(store: &RecordStore, token: &str) -> Result<i64> {
    let row = require(store, CFG_GPLAN, "GPLAN_ID", "GPLAN_CODE", &RecordKey::parse(token))?;
    row_id(row, "GPLAN_ID")
}

fn override_key(store: &RecordStore, record: &Record) -> Result<(i64, String, String)> {
    let feature = required_code(record, "feature")?;
    let usage = required_code(record, "usageType")?;
    let ftype_id = feature_ref(store, &feature)?;
    Ok((ftype_id, usage.clone(), format!("{feature}/{usage}")))
}

/// Identity of a generic threshold row.
struct ThresholdKey {
    plan: i64,
    behavior: String,
    feature: i64,
    label: String,
}

impl ThresholdKey {
    fn from_record(store: &RecordStore, record: &Record) -> Result<Self> {
        let plan = text_field(record, "plan").ok_or_else(|| ConfigError::invalid("plan is required"))?;
        let behavior = required_code(record, "behavior")?;
        parse_behavior(&behavior)?;
        let feature = text_field(record, "feature").unwrap_or_else(|| ALL_FEATURES.into());
        Ok(Self {
            plan: plan_id(store, &plan)?,
            feature: feature_ref(store, &feature)?,
            label: format!("{}/{behavior}/{}", plan.to_uppercase(), feature.to_uppercase()),
            behavior,
        })
    }

    fn fields(&self) -> [(&'static str, Value); 3] {
        [
            ("GPLAN_ID", Value::from(self.plan)),
            ("BEHAVIOR", Value::from(self.behavior.as_str())),
            ("FTYPE_ID", Value::from(self.feature)),
        ]
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
    fn test_clone_and_delete_plan() {
        let mut manager = manager();
        let id = manager
            .scoring()
            .clone_plan(&record(json!({"existingPlan": "INGEST", "newPlan": "bulk"})))
            .unwrap();
        assert_eq!(id, 3);
        assert_eq!(manager.scoring().list_thresholds(Some("BULK")).unwrap().len(), 4);

        manager.scoring().delete_plan(&RecordKey::parse("BULK")).unwrap();
        assert!(manager.scoring().list_thresholds(None).unwrap().iter().all(|t| t["plan"] != "BULK"));
        assert!(manager.scoring().delete_plan(&RecordKey::Id(1)).is_err());
    }

    #[test]
    fn test_thresholds() {
        let mut manager = manager();
        manager
            .scoring()
            .add_entity_score(&record(json!({
                "plan": "SEARCH", "behavior": "FM", "feature": "NAME", "candidateCap": 5, "scoringCap": -1
            })))
            .unwrap();
        let added = manager
            .scoring()
            .list_thresholds(Some("SEARCH"))
            .unwrap()
            .into_iter()
            .find(|t| t["behavior"] == "FM")
            .unwrap();
        assert_eq!(added["feature"], "ALL");
        assert_eq!(added["sendToRedo"], "Yes");

        let key = json!({"plan": "SEARCH", "behavior": "FM", "candidateCap": 50});
        manager.scoring().set_threshold(&record(key.clone())).unwrap();
        manager.scoring().delete_threshold(&record(key.clone())).unwrap();
        assert!(manager.scoring().delete_threshold(&record(key)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_behavior_overrides() {
        let mut manager = manager();
        let item = json!({"feature": "PHONE", "usageType": "mobile", "behavior": "F1E"});
        manager.scoring().add_override(&record(item.clone())).unwrap();
        assert!(matches!(
            manager.scoring().add_override(&record(item)).unwrap_err(),
            ConfigError::Duplicate { .. }
        ));
        let overrides = manager.scoring().list_overrides().unwrap();
        assert_eq!(overrides[0]["behavior"], "F1E");
        assert_eq!(overrides[0]["usageType"], "MOBILE");

        manager
            .scoring()
            .delete_override(&record(json!({"feature": "PHONE", "usageType": "MOBILE"})))
            .unwrap();
        assert!(manager.scoring().list_overrides().unwrap().is_empty());
    }
}
