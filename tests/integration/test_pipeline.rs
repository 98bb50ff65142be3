//! End-to-end pipeline tests.

use std::sync::Arc;

use async_trait::async_trait;
use nltype::testing::ScriptedOracle;
use nltype::{CompletionRequest, Config, NlTypeError, Oracle, Pipeline, Stage, Verdict};

/// Answers each stage from the live input alone, so concurrent runs cannot
/// steal each other's scripted completions.
struct EchoOracle;

#[async_trait]
impl Oracle for EchoOracle {
    async fn complete(&self, request: &CompletionRequest) -> nltype::Result<String> {
        let prompt = request.prompt();
        let input = prompt
            .rsplit("Input text:\n")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        if prompt.starts_with("Parse the following") {
            Ok(input)
        } else if prompt.starts_with("Given a list of simple") {
            // "The X is barking." → "The X (animal) is barking."
            Ok(input.replacen(" is ", " (animal) is ", 1))
        } else if prompt.starts_with("Given a list of typed") {
            Ok("The animal is barking.".to_string())
        } else {
            Ok("TypeCheckPassed".to_string())
        }
    }

    fn name(&self) -> &str {
        "echo"
    }
}

#[tokio::test]
async fn test_check_produces_complete_report() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The rock is sleeping on the table.",
        "The rock (natural-object) is sleeping on (spatial) the table (object).",
        "The natural-object is sleeping on (spatial) the object.",
        "TypeError\nThe natural-object is sleeping on (spatial) the object.\nA natural-object cannot sleep.",
    ]));
    let pipeline = Pipeline::new(oracle.clone(), &Config::default());

    let report = pipeline.check("The rock is sleeping on the table.").await.unwrap();

    assert_eq!(report.input, "The rock is sleeping on the table.");
    assert_eq!(report.propositions.len(), 1);
    assert_eq!(report.typed.label_count(), 3);
    assert!(matches!(report.verdict, Verdict::Fail(_)));
    assert_eq!(report.metadata.oracle_calls, 4);
    assert!(report.metadata.completed_at >= report.metadata.started_at);

    // Every stage request uses the configured model and level
    let config = Config::default();
    for request in oracle.requests() {
        assert_eq!(request.model, config.oracle.model);
        assert_eq!(request.level, config.oracle.level);
    }

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["verdict"]["status"], "fail");
    assert_eq!(json["verdict"]["diagnostics"][0]["index"], 0);
}

#[tokio::test]
async fn test_check_never_loops_on_failure() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The rock is sleeping.",
        "The rock (natural-object) is sleeping.",
        "The natural-object is sleeping.",
        "TypeError\nThe natural-object is sleeping.\nA natural-object cannot sleep.",
        "unused",
    ]));
    let pipeline = Pipeline::new(oracle.clone(), &Config::default());

    let report = pipeline.check("The rock is sleeping.").await.unwrap();
    assert!(!report.verdict.is_pass());
    assert_eq!(oracle.remaining(), 1);
}

#[tokio::test]
async fn test_decomposition_failure_aborts_run() {
    let oracle = Arc::new(ScriptedOracle::new(["Sure! Here are the sentences:\nA rock plays trumpet."]));
    let pipeline = Pipeline::new(oracle.clone(), &Config::default());

    let err = pipeline.check("A rock plays trumpet.").await.unwrap_err();
    assert_eq!(err.as_contract().map(|v| v.stage), Some(Stage::Decompose));
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn test_revise_then_verify() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The rock (animal) is sleeping.",
        "The animal is sleeping.",
        "TypeCheckPassed",
    ]));
    let pipeline = Pipeline::new(oracle, &Config::default());

    let typed = [nltype::grammar::parse_line(Stage::Annotate, "The rock (natural-object) is sleeping.").unwrap()]
        .into_iter()
        .collect();
    let report = pipeline
        .revise(&typed, Some("In this story the rock is a pet turtle's name."))
        .await
        .unwrap();

    assert_eq!(report.changes.len(), 1);
    assert!(report.verdict.is_pass());
}

#[tokio::test]
async fn test_check_many_preserves_input_order() {
    let pipeline = Pipeline::new(Arc::new(EchoOracle), &Config::default());
    let texts = ["The dog is barking.", "The puppy is barking.", "The hound is barking."];

    let results = pipeline.check_many(&texts, 2).await;

    assert_eq!(results.len(), 3);
    for (text, result) in texts.iter().zip(&results) {
        let report = result.as_ref().unwrap();
        assert_eq!(report.input, *text);
        assert!(report.verdict.is_pass());
    }
}

#[tokio::test]
async fn test_check_many_isolates_failures() {
    let pipeline = Pipeline::new(Arc::new(EchoOracle), &Config::default());
    let texts = ["The dog is barking.", "", "The hound is barking."];

    let results = pipeline.check_many(&texts, 4).await;

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(NlTypeError::InvalidInput(_))));
    assert!(results[2].is_ok());
}

#[tokio::test]
#[ignore = "requires API key"]
async fn test_live_oracle_end_to_end() {
    let pipeline = Pipeline::from_config(&Config::default()).unwrap();
    let report = pipeline.check("The boy is playing soccer in the park.").await.unwrap();
    assert!(report.verdict.is_pass());
}
