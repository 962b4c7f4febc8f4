//! Integration tests for Configuration System

use crate::integration::test_utils::{with_isolated_env, write_global_config, write_workspace_config};
use shotlist::config::{ConfigLoader, ValidationError};
use shotlist::generation::ReferencePolicy;
use shotlist::StudioError;
use tempfile::TempDir;

#[test]
fn test_defaults_without_any_source() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_isolated_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());

    assert_eq!(config.generation.reference_policy, ReferencePolicy::Degrade);
    assert_eq!(config.audio.voice, "Zephyr");
    assert_eq!(config.audio.frame_size, 4096);
    assert_eq!(config.audio.input_sample_rate, 16_000);
    assert_eq!(config.audio.output_sample_rate, 24_000);
    assert!(config.provider.api_key.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_global_config(
        &test_dir,
        r#"
[audio]
voice = "Puck"
frame_size = 2048

[video]
poll_interval_secs = 5
"#,
    );
    write_workspace_config(
        workspace.path(),
        r#"
[audio]
voice = "Kore"

[provider.models]
image = "image-preview"
"#,
    );

    let config = with_isolated_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());

    assert_eq!(config.audio.voice, "Kore");
    assert_eq!(config.audio.frame_size, 2048);
    assert_eq!(config.video.poll_interval_secs, 5);
    assert_eq!(config.provider.models.image, "image-preview");
}

#[test]
fn test_environment_overrides_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(
        workspace.path(),
        r#"
[generation]
reference_policy = "degrade"
"#,
    );

    let config = with_isolated_env(
        &test_dir,
        &[
            ("SHOTLIST__GENERATION__REFERENCE_POLICY", "strict"),
            ("SHOTLIST__AUDIO__FRAME_SIZE", "1024"),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.generation.reference_policy, ReferencePolicy::Strict);
    assert_eq!(config.audio.frame_size, 1024);
}

#[test]
fn test_env_specific_workspace_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(workspace.path(), "[audio]\nvoice = \"Kore\"\n");
    std::fs::write(
        workspace.path().join("config").join("production.toml"),
        "[audio]\nvoice = \"Charon\"\n",
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, &[("SHOTLIST_ENV", "production")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.audio.voice, "Charon");
}

#[test]
fn test_api_key_falls_back_to_conventional_variables() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_isolated_env(&test_dir, &[("GEMINI_API_KEY", "from-gemini")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });
    assert_eq!(config.provider.api_key.as_deref(), Some("from-gemini"));

    let config = with_isolated_env(&test_dir, &[("API_KEY", "from-generic")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });
    assert_eq!(config.provider.api_key.as_deref(), Some("from-generic"));

    write_workspace_config(workspace.path(), "[provider]\napi_key = \"from-file\"\n");
    let config = with_isolated_env(&test_dir, &[("GEMINI_API_KEY", "from-gemini")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });
    assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
}

#[test]
fn test_invalid_values_are_reported_per_section() {
    let test_dir = TempDir::new().unwrap();
    let config_file = test_dir.path().join("broken.toml");
    std::fs::write(
        &config_file,
        r#"
[provider]
endpoint = "ftp://example.com"

[audio]
frame_size = 0

[video]
poll_interval_secs = 30
timeout_secs = 10
"#,
    )
    .unwrap();

    let config = with_isolated_env(&test_dir, &[], || ConfigLoader::load_from_file(&config_file).unwrap());
    let errors = config.validate().unwrap_err();

    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], ValidationError::Provider(_)));
    assert!(matches!(errors[1], ValidationError::Audio(_)));
    assert!(matches!(errors[2], ValidationError::Video(_)));

    match config.validated() {
        Err(StudioError::ConfigError(message)) => assert!(message.contains("audio:")),
        other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unknown_reference_policy_fails_to_load() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(workspace.path(), "[generation]\nreference_policy = \"lenient\"\n");

    let result = with_isolated_env(&test_dir, &[], || ConfigLoader::load(workspace.path()));

    assert!(matches!(result, Err(StudioError::ConfigError(_))));
}
