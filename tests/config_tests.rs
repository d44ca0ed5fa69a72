use nestvm::config::{DatastoreConfig, ServiceConfig};
use std::path::PathBuf;

#[test]
fn table_path_follows_database_name() {
    let mut config = DatastoreConfig {
        database: "graph".to_string(),
        ..DatastoreConfig::default()
    };
    assert_eq!(config.table_path(), PathBuf::from("graph.db"));

    config.store = Some(PathBuf::from("/tmp/other.db"));
    assert_eq!(config.table_path(), PathBuf::from("/tmp/other.db"));
}

#[test]
fn description_never_contains_the_password() {
    let config = DatastoreConfig {
        password: "hunter2".to_string(),
        ..DatastoreConfig::default()
    };
    let text = config.describe();
    assert!(!text.contains("hunter2"));
    assert!(text.contains("nestvm@localhost/nestvm"));
    assert!(text.contains("password set"));
}

#[test]
fn service_defaults() {
    let config = ServiceConfig::default();
    assert_eq!(config.ip, "127.0.0.1");
    assert_eq!(config.port, 12345);
    assert_eq!(config.static_dir, PathBuf::from("static"));
}
