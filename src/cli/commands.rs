//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use nltype::{
    grammar, pipeline, AnnotationMode, Config, Pipeline, Proposition, Stage, TypedText, Verdict,
};

use super::output::{self, BatchEntry, CheckOutcome};

/// Run the decompose command.
pub async fn run_decompose(config: &Config, text: String, json_output: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let propositions = pipeline.decomposer().decompose(&text).await?;
    output::print_propositions(&propositions, json_output)
}

/// Run the annotate command, in fresh or revision mode.
pub async fn run_annotate(
    config: &Config,
    lines: Vec<String>,
    revise: bool,
    context: Option<String>,
    json_output: bool,
) -> Result<()> {
    let (mode, propositions) = if revise {
        (AnnotationMode::Revision, parse_annotated(&lines)?)
    } else {
        let plain: Vec<Proposition> = lines.iter().map(|l| Proposition::plain(l.trim())).collect();
        (AnnotationMode::Fresh, plain)
    };

    let pipeline = Pipeline::from_config(config)?;
    let typed = pipeline
        .annotator()
        .annotate(&propositions, mode, context.as_deref())
        .await?;

    if revise {
        let before: TypedText = propositions.into_iter().collect();
        output::print_revision(&before.label_changes(&typed), &typed, json_output)
    } else {
        output::print_typed(&typed, json_output)
    }
}

/// Run the verify command on already-annotated lines.
pub async fn run_verify(config: &Config, lines: Vec<String>, json_output: bool) -> Result<()> {
    let typed: TypedText = parse_annotated(&lines)?.into_iter().collect();
    let pipeline = Pipeline::from_config(config)?;
    let (rewrite, verdict) = pipeline.verify(&typed).await?;
    output::print_verification(&rewrite, &verdict, json_output)
}

/// Run the full pipeline, then revise while the verdict fails and attempts remain.
pub async fn run_check(
    config: &Config,
    text: String,
    max_revisions: usize,
    context: Option<String>,
    json_output: bool,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.check(&text).await?;

    let mut typed = report.typed.clone();
    let mut verdict = report.verdict.clone();
    let mut revisions = Vec::new();

    while !verdict.is_pass() && revisions.len() < max_revisions {
        let feedback = revision_context(&verdict, context.as_deref());
        tracing::info!(attempt = revisions.len() + 1, "Revising after failed verdict");

        let revision = pipeline.revise(&typed, Some(&feedback)).await?;
        if revision.changes.is_empty() {
            tracing::warn!("Revision changed no labels, stopping");
            revisions.push(revision);
            break;
        }
        typed = revision.typed.clone();
        verdict = revision.verdict.clone();
        revisions.push(revision);
    }

    output::print_check(&CheckOutcome { report, revisions }, json_output)
}

/// Run the batch command.
pub async fn run_batch(
    config: &Config,
    file: PathBuf,
    concurrency: Option<usize>,
    json_output: bool,
) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let texts: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    pipeline::ensure_inputs(&texts)?;

    let pipeline = Pipeline::from_config(config)?;
    let concurrency = concurrency.unwrap_or_else(|| pipeline.concurrency());
    let results = pipeline.check_many(&texts, concurrency).await;

    let entries: Vec<BatchEntry> = texts
        .iter()
        .zip(&results)
        .map(|(input, result)| BatchEntry::new(input, result))
        .collect();
    output::print_batch(&entries, json_output)?;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        bail!("{} of {} inputs failed", failed, results.len());
    }
    Ok(())
}

/// Run the taxonomy command.
pub fn run_taxonomy(json_output: bool) -> Result<()> {
    output::print_taxonomy(json_output)
}

fn parse_annotated(lines: &[String]) -> Result<Vec<Proposition>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            grammar::parse_line(Stage::Annotate, line.trim())
                .with_context(|| format!("Invalid annotated line {}", i + 1))
        })
        .collect()
}

/// Guidance for a revision attempt: the user's context plus every diagnostic.
fn revision_context(verdict: &Verdict, context: Option<&str>) -> String {
    let mut parts: Vec<String> = context.map(|c| c.to_string()).into_iter().collect();
    parts.push("The type checker rejected the following generalized sentences.".to_string());
    for diagnostic in verdict.diagnostics() {
        parts.push(format!("{} {}", diagnostic.proposition, diagnostic.explanation));
    }
    parts.join(" ")
}
