use super::load_existing_config as load_existing_config_impl;
use super::test_connection;
use tempfile::TempDir;
use url::Url;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.base_dir, temp_dir.path());
    assert!(!config.embedder.model.is_empty());
    assert!(config.embedder.batch_size > 0);
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[index\n").expect("should write");

    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.index.name, "kit");
}

#[test]
fn unreachable_endpoint() {
    let url = Url::parse("http://127.0.0.1:1/").expect("url should parse");
    assert!(!test_connection(&url));
}
