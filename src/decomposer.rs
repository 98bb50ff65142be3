//! Decomposition of raw text into minimal declarative propositions.
//!
//! The decomposer never judges plausibility: nonsensical or metaphorical
//! input is split like any other text.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::{ContractViolation, NlTypeError, Result, Stage};
use crate::oracle::{Oracle, StageSettings};
use crate::prompt::{FewShot, PromptBuilder};
use crate::types::Proposition;

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]\s|\d+[.)]\s)").expect("Invalid regex"));

const EXAMPLES: &[FewShot] = &[
    FewShot {
        input_heading: "Input text:",
        input: &["Alice, who is Bob's sister, loves to play chess with her friend Charlie."],
        output_heading: "Parsed sentences:",
        output: &[
            "Alice is Bob's sister.",
            "Alice loves to play chess with Charlie.",
            "Alice is friends with Charlie.",
        ],
    },
    FewShot {
        input_heading: "Input text:",
        input: &["Ideas sleep furiously and a rock plays trumpet."],
        output_heading: "Parsed sentences:",
        output: &["Ideas sleep furiously.", "A rock plays trumpet."],
    },
    FewShot {
        input_heading: "Input text:",
        input: &["Before the sun rises, the cat jumps over the lazy dog and the bird sings a song."],
        output_heading: "Parsed sentences:",
        output: &[
            "The cat jumps over the lazy dog before the sun rises.",
            "The bird sings a song before the sun rises.",
        ],
    },
];

/// Splits text into independently readable propositions.
pub struct Decomposer {
    oracle: Arc<dyn Oracle>,
    settings: StageSettings,
}

impl Decomposer {
    pub fn new(oracle: Arc<dyn Oracle>, settings: StageSettings) -> Self {
        Self { oracle, settings }
    }

    /// Prompt segments for `text`.
    pub fn build_prompt(text: &str) -> Vec<String> {
        PromptBuilder::new()
            .segment(
                "Parse the following natural language text into short, declarative sentences \
                 that capture the main entities and their relationships.\n",
            )
            .segment(
                "Every sentence must be understandable on its own: repeat shared subjects and \
                 distribute temporal or causal clauses to every sentence they apply to. \
                 State possessive or family relations as their own sentences.\n",
            )
            .examples(EXAMPLES)
            .segment(
                "Now, parse the following text. Only generate the list of parsed sentences, \
                 split by newlines, without any additional commentary or explanation.\n",
            )
            .input(&[text])
            .build()
    }

    /// Split `text` into an ordered, non-empty list of untyped propositions.
    pub async fn decompose(&self, text: &str) -> Result<Vec<Proposition>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NlTypeError::InvalidInput("text to decompose is empty".to_string()));
        }

        let request = self.settings.request(Self::build_prompt(text));
        tracing::debug!(
            oracle = self.oracle.name(),
            prompt_chars = request.prompt().len(),
            "Requesting decomposition"
        );

        let output = self.oracle.complete(&request).await?;
        let propositions = parse_output(&output)?;

        tracing::info!(count = propositions.len(), "Text decomposed");
        Ok(propositions)
    }
}

/// Parse a decomposition completion: one proposition per non-blank line.
pub fn parse_output(output: &str) -> std::result::Result<Vec<Proposition>, ContractViolation> {
    let mut propositions = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("```") {
            return Err(ContractViolation::grammar(
                Stage::Decompose,
                "completion is wrapped in a code fence",
            ));
        }
        if line.ends_with(':') {
            return Err(ContractViolation::grammar(
                Stage::Decompose,
                format!("extraneous commentary line: {}", line),
            ));
        }
        if LIST_MARKER.is_match(line) {
            return Err(ContractViolation::grammar(
                Stage::Decompose,
                format!("list marker instead of a plain sentence: {}", line),
            ));
        }
        propositions.push(Proposition::plain(line));
    }

    if propositions.is_empty() {
        return Err(ContractViolation::grammar(
            Stage::Decompose,
            "completion contains no propositions",
        ));
    }

    Ok(propositions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound_output() {
        let output = "The cat jumps over the dog before the sun rises.\n\
                      The bird sings before the sun rises.\n";
        let propositions = parse_output(output).unwrap();

        assert_eq!(propositions.len(), 2);
        assert!(propositions.iter().all(|p| p.text.contains("before the sun rises")));
        assert!(propositions.iter().all(|p| !p.is_annotated()));
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let propositions = parse_output("\n  Alice is Bob's sister.  \n\n\nAlice plays chess.\n").unwrap();
        assert_eq!(propositions[0].text, "Alice is Bob's sister.");
        assert_eq!(propositions[1].text, "Alice plays chess.");
    }

    #[test]
    fn test_single_clause_unchanged() {
        let propositions = parse_output("The boy is playing soccer in the park.").unwrap();
        assert_eq!(propositions.len(), 1);
        assert_eq!(propositions[0].text, "The boy is playing soccer in the park.");
    }

    #[test]
    fn test_empty_output_is_violation() {
        let err = parse_output("   \n\n").unwrap_err();
        assert_eq!(err.stage, Stage::Decompose);
    }

    #[test]
    fn test_commentary_is_violation() {
        assert!(parse_output("Parsed sentences:\nA rock plays trumpet.").is_err());
        assert!(parse_output("- A rock plays trumpet.").is_err());
        assert!(parse_output("1. A rock plays trumpet.").is_err());
        assert!(parse_output("```\nA rock plays trumpet.\n```").is_err());
    }

    #[test]
    fn test_prompt_ends_with_input() {
        let segments = Decomposer::build_prompt("Ideas sleep furiously.");
        assert_eq!(segments.last().unwrap(), "Input text:\nIdeas sleep furiously.\n");
        assert!(segments.iter().any(|s| s.contains("Parsed sentences:")));
    }
}
