//! Configuration loading from disk.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use tempfile::TempDir;

use nltype::testing::ScriptedOracle;
use nltype::{Config, NlTypeError, OracleProvider, Pipeline, ResponsivenessLevel};

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("nltype.toml");
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
            [oracle]
            provider = "openai"
            model = "gpt-5-mini"
            level = "high"
            api_key = "sk-test"

            [pipeline]
            concurrency = 2
        "#,
    );

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.oracle.provider, OracleProvider::OpenAi);
    assert_eq!(config.oracle.level, ResponsivenessLevel::High);
    assert_eq!(config.oracle.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.pipeline.concurrency, 2);
    // Unset sections keep their defaults
    assert_eq!(config.annotator.max_context_chars, 2000);
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, NlTypeError::Config(_)));
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[oracle\nmodel = ");
    assert!(Config::from_file(&path).is_err());
}

#[tokio::test]
async fn test_configured_model_reaches_oracle() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
            [oracle]
            model = "custom-model"
            level = "medium"

            [annotator]
            max_context_chars = 10
        "#,
    );
    let config = Config::from_file(&path).unwrap();

    let oracle = Arc::new(ScriptedOracle::new(["The dog (animal) is barking."]));
    let pipeline = Pipeline::new(oracle.clone(), &config);
    let typed = [nltype::grammar::parse_line(nltype::Stage::Annotate, "The dog (object) is barking.").unwrap()]
        .into_iter()
        .collect();

    // Verification fails on the exhausted script; the revision request is what matters
    let _ = pipeline
        .revise(&typed, Some("dogs are animals, not objects"))
        .await;

    let request = &oracle.requests()[0];
    assert_eq!(request.model, "custom-model");
    assert_eq!(request.level, ResponsivenessLevel::Medium);
    assert!(request.prompt().contains("dogs are a"));
    assert!(!request.prompt().contains("dogs are animals"));
}
