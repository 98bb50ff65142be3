//! Output formatting for CLI commands.
//!
//! This module handles formatting output as either JSON or human-readable text.

use anyhow::Result;
use nltype::{
    taxonomy, CheckReport, EntityType, GeneralizedRewrite, Label, LabelChange, Proposition,
    RelationType, RevisionReport, TypedText, Verdict,
};
use serde::Serialize;

/// A checked text together with any revision attempts made after it.
#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub report: CheckReport,
    pub revisions: Vec<RevisionReport>,
}

impl CheckOutcome {
    /// The verdict of the last attempt.
    pub fn final_verdict(&self) -> &Verdict {
        self.revisions
            .last()
            .map(|r| &r.verdict)
            .unwrap_or(&self.report.verdict)
    }
}

/// One line of a batch run.
#[derive(Debug, Serialize)]
pub struct BatchEntry<'a> {
    pub input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a CheckReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> BatchEntry<'a> {
    pub fn new(input: &'a str, result: &'a nltype::Result<CheckReport>) -> Self {
        match result {
            Ok(report) => Self {
                input,
                report: Some(report),
                error: None,
            },
            Err(e) => Self {
                input,
                report: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct TaxonomyListing {
    entities: Vec<TaxonomyEntry>,
    relations: Vec<TaxonomyEntry>,
}

#[derive(Serialize)]
struct TaxonomyEntry {
    label: &'static str,
    examples: &'static [&'static str],
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_numbered<S: AsRef<str>>(heading: &str, lines: &[S]) {
    println!("{}:", heading);
    for (i, line) in lines.iter().enumerate() {
        println!("  {}. {}", i + 1, line.as_ref());
    }
}

fn print_verdict(verdict: &Verdict) {
    match verdict {
        Verdict::Pass => println!("Verdict: {}", verdict),
        Verdict::Fail(violations) => {
            println!("Verdict: {} type error(s)", violations.len());
            for d in violations.iter() {
                println!("  [{}] {}", d.index + 1, d.proposition);
                println!("      {}", d.explanation);
            }
        }
    }
}

fn describe_label(label: &Option<Label>) -> &str {
    label.as_ref().map(Label::as_str).unwrap_or("-")
}

/// Print decomposed propositions.
pub fn print_propositions(propositions: &[Proposition], json: bool) -> Result<()> {
    if json {
        return print_json(propositions);
    }
    for p in propositions {
        println!("{}", p.text);
    }
    Ok(())
}

/// Print freshly annotated text.
pub fn print_typed(typed: &TypedText, json: bool) -> Result<()> {
    if json {
        return print_json(typed);
    }
    for line in typed.lines() {
        println!("{}", line);
    }
    Ok(())
}

/// Print revised text and the labels that changed.
pub fn print_revision(changes: &[LabelChange], typed: &TypedText, json: bool) -> Result<()> {
    if json {
        #[derive(Serialize)]
        struct Revision<'a> {
            typed: &'a TypedText,
            changes: &'a [LabelChange],
        }
        return print_json(&Revision { typed, changes });
    }

    for line in typed.lines() {
        println!("{}", line);
    }
    if changes.is_empty() {
        println!("\nNo labels changed.");
    } else {
        println!("\nChanged labels:");
        for c in changes {
            println!(
                "  [{}] {}: {} -> {}",
                c.proposition + 1,
                c.span,
                describe_label(&c.from),
                describe_label(&c.to)
            );
        }
    }
    Ok(())
}

/// Print a verification result.
pub fn print_verification(rewrite: &GeneralizedRewrite, verdict: &Verdict, json: bool) -> Result<()> {
    if json {
        #[derive(Serialize)]
        struct Verification<'a> {
            rewrite: &'a GeneralizedRewrite,
            verdict: &'a Verdict,
        }
        return print_json(&Verification { rewrite, verdict });
    }

    print_numbered("Generalized", &rewrite.lines());
    println!();
    print_verdict(verdict);
    Ok(())
}

/// Print a full check, including revision attempts.
pub fn print_check(outcome: &CheckOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }

    let report = &outcome.report;
    let plain: Vec<&str> = report.propositions.iter().map(|p| p.text.as_str()).collect();
    print_numbered("Propositions", &plain);
    print_numbered("Typed", &report.typed.lines());
    print_numbered("Generalized", &report.rewrite.lines());
    print_verdict(&report.verdict);

    for (i, revision) in outcome.revisions.iter().enumerate() {
        println!("\n--- Revision {} ({} label(s) changed) ---", i + 1, revision.changes.len());
        print_numbered("Typed", &revision.typed.lines());
        print_numbered("Generalized", &revision.rewrite.lines());
        print_verdict(&revision.verdict);
    }

    let calls: usize = report.metadata.oracle_calls
        + outcome
            .revisions
            .iter()
            .map(|r| r.metadata.oracle_calls)
            .sum::<usize>();
    println!(
        "\n{} ({} oracle calls, {}ms)",
        if outcome.final_verdict().is_pass() { "PASS" } else { "FAIL" },
        calls,
        report.metadata.elapsed_ms
    );
    Ok(())
}

/// Print batch results in input order.
pub fn print_batch(entries: &[BatchEntry], json: bool) -> Result<()> {
    if json {
        return print_json(entries);
    }

    for (i, entry) in entries.iter().enumerate() {
        let status = match (&entry.report, &entry.error) {
            (Some(report), _) if report.verdict.is_pass() => "PASS".to_string(),
            (Some(report), _) => format!("FAIL ({} type error(s))", report.verdict.diagnostics().len()),
            (None, Some(error)) => format!("ERROR: {}", error),
            (None, None) => "ERROR".to_string(),
        };
        println!("{:>4}. {:<40} {}", i + 1, truncate(entry.input, 40), status);
    }

    let passed = entries
        .iter()
        .filter(|e| e.report.is_some_and(|r| r.verdict.is_pass()))
        .count();
    println!("\nTotal: {} inputs, {} passed", entries.len(), passed);
    Ok(())
}

/// Print the taxonomy listing.
pub fn print_taxonomy(json: bool) -> Result<()> {
    if json {
        let listing = TaxonomyListing {
            entities: EntityType::ALL
                .iter()
                .map(|t| TaxonomyEntry {
                    label: t.as_str(),
                    examples: t.examples(),
                })
                .collect(),
            relations: RelationType::ALL
                .iter()
                .map(|t| TaxonomyEntry {
                    label: t.as_str(),
                    examples: t.examples(),
                })
                .collect(),
        };
        return print_json(&listing);
    }

    print!("{}", taxonomy::render_entity_listing());
    println!();
    print!("{}", taxonomy::render_relation_listing());
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
