use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert!(config.ollama.batch_size > 0);
}

#[test]
fn load_existing_config_reads_saved_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = load_existing_config_impl(temp_dir.path()).expect("defaults load");
    config.ollama.generation_model = "mistral:latest".to_string();
    config.save().expect("config saves");

    let loaded = load_existing_config_impl(temp_dir.path()).expect("saved config loads");
    assert_eq!(loaded.ollama.generation_model, "mistral:latest");
}
