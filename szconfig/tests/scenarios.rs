use serde_json::{Value, json};
use szconfig::{
    ConfigError, ConfigManager, RecordKey,
    backend::{LocalRepository, MemoryBackend},
};

fn loaded(doc: Value) -> ConfigManager {
    let backend = MemoryBackend::with_document(&doc, "scenario").unwrap();
    let mut manager = ConfigManager::new(Box::new(backend));
    manager.initialize().unwrap();
    manager
}

fn template_manager() -> ConfigManager {
    let mut manager = ConfigManager::new(Box::new(MemoryBackend::new()));
    manager.initialize().unwrap();
    manager
}

#[test]
fn test_add_data_source_to_empty_table() {
    let mut manager = loaded(json!({"G2_CONFIG": {"CFG_DSRC": []}}));

    manager.data_sources().add_data_source("CUSTOMER").unwrap();

    let sources = manager.get_record_list("CFG_DSRC", None);
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["DSRC_CODE"], "CUSTOMER");
    assert!(sources[0]["DSRC_ID"].as_i64().unwrap() >= 1000);
}

#[test]
fn test_duplicate_feature_is_rejected() {
    let mut manager = loaded(json!({"G2_CONFIG": {"CFG_FTYPE": []}}));

    manager.features().add_feature("SSN").unwrap();
    let err = manager.features().add_feature("SSN").unwrap_err();

    assert!(matches!(err, ConfigError::Duplicate { .. }));
    assert_eq!(manager.features().list().unwrap().len(), 1);
}

#[test]
fn test_element_membership_round_trip() {
    let mut manager = loaded(json!({"G2_CONFIG": {
        "CFG_FTYPE": [{"FTYPE_ID": 1, "FTYPE_CODE": "NAME", "FCLASS_ID": 2, "FTYPE_FREQ": "NAME"}],
        "CFG_FELEM": [{"FELEM_ID": 2, "FELEM_CODE": "FULL_NAME", "DATA_TYPE": "string"}],
        "CFG_FBOM": [],
        "CFG_ATTR": [],
    }}));

    manager
        .features()
        .add_element_to_feature(&RecordKey::from("NAME"), "FULL_NAME", Some(1))
        .unwrap();
    let key = [("FTYPE_ID", json!(1)), ("FELEM_ID", json!(2))];
    assert!(manager.get_record_by_fields("CFG_FBOM", &key).is_some());

    manager
        .features()
        .remove_element_from_feature(&RecordKey::from("NAME"), &RecordKey::from("FULL_NAME"))
        .unwrap();
    assert!(manager.get_record_by_fields("CFG_FBOM", &key).is_none());
}

#[test]
fn test_export_import_preserves_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut original = template_manager();
    original.data_sources().add_data_source("CUSTOMER").unwrap();
    original.features().apply_template("NAME", "ALIAS_NAME").unwrap();
    original.export_config_to_file(&path).unwrap();
    let expected = original.get_config_data().unwrap().clone();

    let mut reloaded = template_manager();
    reloaded.import_config_from_file(&path).unwrap();
    assert!(reloaded.is_dirty());
    assert_eq!(reloaded.get_config_data().unwrap(), &expected);
}

#[test]
fn test_saved_configuration_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let saved = {
        let repository = LocalRepository::open(dir.path()).unwrap();
        let mut manager = ConfigManager::new(Box::new(repository));
        manager.initialize().unwrap();
        manager.data_sources().add_data_source("WATCHLIST").unwrap();
        manager.save_config("Added WATCHLIST").unwrap()
    };

    let repository = LocalRepository::open(dir.path()).unwrap();
    let mut manager = ConfigManager::new(Box::new(repository));
    manager.initialize().unwrap();
    assert_eq!(manager.current_config_id(), Some(saved));
    assert!(manager.data_sources().get(&RecordKey::from("WATCHLIST")).is_ok());

    let registry = manager.get_config_registry().unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry[1]["CONFIG_COMMENTS"], "Added WATCHLIST");
}

#[test]
fn test_failed_edit_keeps_session_clean() {
    let mut manager = template_manager();
    let before = manager.get_config_data().unwrap().clone();

    let err = manager
        .features()
        .add_feature_json(
            &json!({"feature": "BADGE", "comparison": "NO_SUCH_COMP", "elementList": ["BADGE_NUM"]})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!manager.is_dirty());
    assert_eq!(manager.get_config_data().unwrap(), &before);
}
