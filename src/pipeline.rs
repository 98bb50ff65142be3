//! End-to-end orchestration: decompose → annotate → verify.
//!
//! A run is a single pass. Any stage failure aborts the run; no later stage
//! is invoked with a guessed fallback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotator::{AnnotationMode, Annotator};
use crate::config::{AnnotatorConfig, Config};
use crate::decomposer::Decomposer;
use crate::error::{NlTypeError, Result};
use crate::oracle::{self, CompletionRequest, Oracle, StageSettings};
use crate::types::{GeneralizedRewrite, LabelChange, Proposition, TypedText, Verdict};
use crate::verifier::Verifier;

/// Timing and cost of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub oracle_calls: usize,
}

/// Result of checking one input text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub run_id: Uuid,
    pub input: String,
    pub propositions: Vec<Proposition>,
    pub typed: TypedText,
    pub rewrite: GeneralizedRewrite,
    pub verdict: Verdict,
    pub metadata: RunMetadata,
}

/// Result of revising and re-verifying an existing typed text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionReport {
    pub run_id: Uuid,
    pub typed: TypedText,
    pub changes: Vec<LabelChange>,
    pub rewrite: GeneralizedRewrite,
    pub verdict: Verdict,
    pub metadata: RunMetadata,
}

/// Counts the calls one run makes through a shared oracle.
struct CountingOracle {
    inner: Arc<dyn Oracle>,
    calls: AtomicUsize,
}

#[async_trait]
impl Oracle for CountingOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.complete(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Per-run stage set, built around a fresh call counter.
struct Run {
    id: Uuid,
    started_at: DateTime<Utc>,
    clock: std::time::Instant,
    oracle: Arc<CountingOracle>,
    decomposer: Decomposer,
    annotator: Annotator,
    verifier: Verifier,
}

impl Run {
    fn metadata(&self) -> RunMetadata {
        RunMetadata {
            started_at: self.started_at,
            completed_at: Utc::now(),
            elapsed_ms: self.clock.elapsed().as_millis() as u64,
            oracle_calls: self.oracle.calls.load(Ordering::Relaxed),
        }
    }
}

/// The three stages wired around one shared oracle.
#[derive(Clone)]
pub struct Pipeline {
    oracle: Arc<dyn Oracle>,
    settings: StageSettings,
    annotator: AnnotatorConfig,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(oracle: Arc<dyn Oracle>, config: &Config) -> Self {
        Self {
            oracle,
            settings: StageSettings::from(&config.oracle),
            annotator: config.annotator.clone(),
            concurrency: config.pipeline.concurrency.max(1),
        }
    }

    /// Build a pipeline with the oracle provider named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let oracle = oracle::from_config(&config.oracle)?;
        Ok(Self::new(oracle, config))
    }

    /// Default bound for [`Pipeline::check_many`].
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn start(&self) -> Run {
        let counting = Arc::new(CountingOracle {
            inner: self.oracle.clone(),
            calls: AtomicUsize::new(0),
        });
        let oracle: Arc<dyn Oracle> = counting.clone();

        Run {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: std::time::Instant::now(),
            oracle: counting,
            decomposer: Decomposer::new(oracle.clone(), self.settings.clone()),
            annotator: Annotator::with_config(oracle.clone(), self.settings.clone(), self.annotator.clone()),
            verifier: Verifier::new(oracle, self.settings.clone()),
        }
    }

    /// Decompose, annotate and verify `text` once.
    pub async fn check(&self, text: &str) -> Result<CheckReport> {
        let run = self.start();
        let propositions = run.decomposer.decompose(text).await?;
        let typed = run
            .annotator
            .annotate(&propositions, AnnotationMode::Fresh, None)
            .await?;
        let (rewrite, verdict) = run.verifier.verify(&typed).await?;

        let metadata = run.metadata();
        tracing::info!(
            run_id = %run.id,
            propositions = propositions.len(),
            passed = verdict.is_pass(),
            oracle_calls = metadata.oracle_calls,
            elapsed_ms = metadata.elapsed_ms,
            "Check complete"
        );

        Ok(CheckReport {
            run_id: run.id,
            input: text.to_string(),
            propositions,
            typed,
            rewrite,
            verdict,
            metadata,
        })
    }

    /// Re-annotate `typed` in revision mode and verify the result once.
    pub async fn revise(&self, typed: &TypedText, context: Option<&str>) -> Result<RevisionReport> {
        let run = self.start();
        let revised = run.annotator.revise(typed, context).await?;
        let changes = typed.label_changes(&revised);
        let (rewrite, verdict) = run.verifier.verify(&revised).await?;

        let metadata = run.metadata();
        tracing::info!(
            run_id = %run.id,
            changes = changes.len(),
            passed = verdict.is_pass(),
            oracle_calls = metadata.oracle_calls,
            "Revision complete"
        );

        Ok(RevisionReport {
            run_id: run.id,
            typed: revised,
            changes,
            rewrite,
            verdict,
            metadata,
        })
    }

    /// Verify already-annotated text without decomposing or annotating.
    pub async fn verify(&self, typed: &TypedText) -> Result<(GeneralizedRewrite, Verdict)> {
        let run = self.start();
        run.verifier.verify(typed).await
    }

    /// Check independent texts concurrently, at most `concurrency` at a time.
    ///
    /// Results come back in input order, each one independent of the others.
    pub async fn check_many<S>(&self, texts: &[S], concurrency: usize) -> Vec<Result<CheckReport>>
    where
        S: AsRef<str> + Sync,
    {
        let concurrency = concurrency.max(1);
        tracing::info!(texts = texts.len(), concurrency, "Starting batch check");

        let mut results: Vec<(usize, Result<CheckReport>)> = stream::iter(texts.iter().enumerate())
            .map(|(index, text)| async move { (index, self.check(text.as_ref()).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let results: Vec<Result<CheckReport>> = results.into_iter().map(|(_, r)| r).collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(failed, total = results.len(), "Some batch inputs failed");
        }
        results
    }

    /// The decomposer alone, sharing this pipeline's oracle and settings.
    pub fn decomposer(&self) -> Decomposer {
        Decomposer::new(self.oracle.clone(), self.settings.clone())
    }

    /// The annotator alone, sharing this pipeline's oracle and settings.
    pub fn annotator(&self) -> Annotator {
        Annotator::with_config(self.oracle.clone(), self.settings.clone(), self.annotator.clone())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("oracle", &self.oracle.name())
            .field("settings", &self.settings)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// Reject an input list that has nothing to check.
pub fn ensure_inputs<S: AsRef<str>>(texts: &[S]) -> Result<()> {
    if texts.iter().all(|t| t.as_ref().trim().is_empty()) {
        return Err(NlTypeError::InvalidInput("no input texts".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;

    const PARK: &str = "The boy is playing soccer in the park.";

    fn pipeline(script: Vec<&str>) -> (Arc<ScriptedOracle>, Pipeline) {
        let oracle = Arc::new(ScriptedOracle::new(script));
        let pipeline = Pipeline::new(oracle.clone(), &Config::default());
        (oracle, pipeline)
    }

    #[tokio::test]
    async fn test_check_passes_plausible_text() {
        let (oracle, pipeline) = pipeline(vec![
            PARK,
            "The boy (human) is playing soccer (action) in (spatial) the park (location).",
            "The human is playing an action in (spatial) the location.",
            "TypeCheckPassed",
        ]);

        let report = pipeline.check(PARK).await.unwrap();
        assert!(report.verdict.is_pass());
        assert_eq!(report.propositions.len(), 1);
        assert_eq!(report.typed.label_count(), 4);
        assert_eq!(report.metadata.oracle_calls, 4);
        assert_eq!(oracle.call_count(), 4);
    }

    #[tokio::test]
    async fn test_stage_failure_stops_the_run() {
        let (oracle, pipeline) = pipeline(vec![
            PARK,
            "The boy (athlete) is playing soccer (action) in (spatial) the park (location).",
            "should never be requested",
        ]);

        let err = pipeline.check(PARK).await.unwrap_err();
        assert!(err.as_contract().is_some_and(|v| v.is_taxonomy()));
        assert_eq!(oracle.call_count(), 2);
        assert_eq!(oracle.remaining(), 1);
    }

    #[tokio::test]
    async fn test_revise_reports_changes() {
        let (_, pipeline) = pipeline(vec![
            "The dog (animal) is barking.",
            "The animal is barking.",
            "TypeCheckPassed",
        ]);
        let typed: TypedText = [crate::grammar::parse_line(
            crate::error::Stage::Annotate,
            "The dog (object) is barking.",
        )
        .unwrap()]
        .into_iter()
        .collect();

        let report = pipeline.revise(&typed, Some("dogs are animals")).await.unwrap();
        assert_eq!(report.changes.len(), 1);
        assert!(report.verdict.is_pass());
        assert_eq!(report.metadata.oracle_calls, 3);
    }

    #[test]
    fn test_ensure_inputs() {
        assert!(ensure_inputs(&["", "  "]).is_err());
        assert!(ensure_inputs(&["A rock plays trumpet."]).is_ok());
    }
}
