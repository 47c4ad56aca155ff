// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证导入配置读取与 Schema 定义加载
// ==========================================


use data_import_engine::config::{config_keys, ConfigManager, ImportConfigReader, ImportSettings};
use data_import_engine::importer::{ImportError, SchemaRegistry};
use std::time::Duration;
use test_helpers::create_test_db;

#[tokio::test]
async fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config_manager = ConfigManager::new(&db_path);
    assert!(
        config_manager.is_ok(),
        "ConfigManager should be created successfully"
    );
}

#[tokio::test]
async fn test_settings_default_when_unset() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let config = ConfigManager::new(&db_path).unwrap();

    let settings = config.load_settings().await.unwrap();

    assert_eq!(settings, ImportSettings::default());
    assert_eq!(settings.commit_timeout(), Some(Duration::from_millis(30_000)));
}

#[tokio::test]
async fn test_settings_persist_across_managers() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    {
        let config = ConfigManager::new(&db_path).unwrap();
        config.set_global_config_value(config_keys::SKIP_DUPLICATES, "off").unwrap();
        config.set_global_config_value(config_keys::COMMIT_TIMEOUT_MS, "0").unwrap();
        config.set_global_config_value(config_keys::VALIDATION_WORKERS, "8").unwrap();
        config.set_global_config_value(config_keys::HEADER_OFFSET, "3").unwrap();
    }

    let config = ConfigManager::new(&db_path).unwrap();
    let settings = config.load_settings().await.unwrap();

    assert!(!settings.skip_duplicates);
    assert_eq!(settings.commit_timeout(), None);
    assert_eq!(settings.validation_workers, 8);
    assert_eq!(settings.header_offset, 3);
}

#[test]
fn test_schema_registry_from_config() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let config = ConfigManager::new(&db_path).unwrap();
    let json = r#"{
        "assets": {
            "name": "Assets",
            "description": "Fixed assets",
            "unique_key": "tag",
            "fields": [
                {"key": "tag", "label": "Asset Tag", "required": true, "type": "string",
                 "aliases": ["asset_id"], "transformer": {"kind": "lowercase"}},
                {"key": "value", "label": "Value", "type": "number",
                 "validator": {"kind": "range", "min": 0, "message": "Must be positive"},
                 "transformer": {"kind": "currency"},
                 "on_blank": {"kind": "default", "value": 0}}
            ]
        }
    }"#;
    config
        .set_global_config_value(config_keys::IMPORT_SCHEMAS, json)
        .unwrap();

    let registry = config.load_schema_registry().unwrap();

    assert_eq!(registry.targets().collect::<Vec<_>>(), vec!["assets"]);
    assert_eq!(registry.get("assets").unwrap().fields[1].label, "Value");
    assert!(matches!(
        registry.get("products"),
        Err(ImportError::UnknownTarget(_))
    ));
}

#[test]
fn test_invalid_schema_definition_rejected() {
    let json = r#"{"broken": {"name": "Broken", "description": "", "unique_key": "missing",
                   "fields": [{"key": "a", "label": "A", "type": "string"}]}}"#;

    assert!(matches!(
        SchemaRegistry::from_json(json),
        Err(ImportError::InvalidSchema { ref target, .. }) if target == "broken"
    ));
}
