use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let mut original_config = Config::default();
    original_config
        .generator
        .set_url("https://inference.example.com/generate")
        .expect("url is valid");
    original_config.generator.backend = GeneratorBackend::Predict;

    let toml_content = toml::to_string_pretty(&original_config)
        .expect("config should convert to toml string successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let content =
        fs::read_to_string(&config_path).expect("should read from config_path successfully");
    let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

    assert_eq!(original_config, loaded_config);
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [embedder
        url = "http://localhost:11434"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn unknown_backend_is_rejected() {
    let toml_str = r#"
        [generator]
        backend = "carrier-pigeon"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
    assert!(result.is_err());
}

#[test]
fn config_dir_is_named_after_the_tool() {
    if let Ok(dir) = get_config_dir() {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .expect("config dir has a name");
        assert!(name == ".rag-kit" || name == "rag-kit");
    }
}
