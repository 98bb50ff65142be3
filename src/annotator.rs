//! Type annotation of propositions against the closed taxonomy.
//!
//! Two modes share one output grammar:
//! - **Fresh**: untyped propositions get a label for every eligible entity and
//!   relation-bearing preposition, chosen from the literal reading of the word.
//! - **Revision**: already-labeled propositions get the fewest label changes
//!   that make them consistent, optionally guided by a free-form context hint.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::AnnotatorConfig;
use crate::error::{ContractViolation, NlTypeError, Result, Stage};
use crate::grammar;
use crate::oracle::{Oracle, StageSettings};
use crate::prompt::{self, FewShot, PromptBuilder};
use crate::types::{Proposition, TypedText};

/// How the annotator treats existing labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationMode {
    /// Input is untyped; label everything eligible.
    Fresh,
    /// Input is typed, possibly wrongly; correct with minimal changes.
    Revision,
}

const LITERAL_READING: &str = "Please type each sentence based on the most common, literal \
    interpretation of the words corresponding to entities and prepositions, without making any \
    inferences or assumptions about how these entities and prepositions interact.\n";

const RELATION_RULE: &str = "Only type the prepositions that explicitly indicate a relationship \
    between entities, and fall into one of the following categories.\n";

const TIE_BREAK: &str = "When a word plausibly fits more than one entity type, prefer the most \
    specific common usage illustrated by the examples above over a more abstract category \
    (e.g., a dog is an animal, not an object group).\n";

const FRESH_EXAMPLES: &[FewShot] = &[
    FewShot {
        input_heading: "Input sentences:",
        input: &["The boy is playing soccer in the park."],
        output_heading: "Typed Sentences:",
        output: &["The boy (human) is playing soccer (action) in (spatial) the park (location)."],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &[
            "My dog is sleeping on his bed before sunset.",
            "My dog has a dream of getting treats.",
        ],
        output_heading: "Typed Sentences:",
        output: &[
            "My dog (animal) is sleeping on (spatial) his bed (object) before (temporal) sunset (time).",
            "My dog (animal) has a dream (cognitive) of getting treats (possession).",
        ],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &[
            "The teacher writes the equals sign on the board with chalk.",
            "The teacher computes the answer to 1 + 1.",
        ],
        output_heading: "Typed Sentences:",
        output: &[
            "The teacher (human) writes the equals sign (communication) on (spatial) the board (object) with (instrumental) chalk (object).",
            "The teacher (human) computes the answer (cognitive) to 1 (numeral) + 1 (numeral).",
        ],
    },
];

const REVISION_EXAMPLES: &[FewShot] = &[
    FewShot {
        input_heading: "Input sentences:",
        input: &["The dog (object) is barking."],
        output_heading: "Revised Sentences:",
        output: &["The dog (animal) is barking."],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &[
            "My dog (animal) is sleeping on (temporal) his bed (object) before (temporal) sunset (time).",
            "My dog (animal) has a dream (cognitive) of getting treats (possession).",
        ],
        output_heading: "Revised Sentences:",
        output: &[
            "My dog (animal) is sleeping on (spatial) his bed (object) before (temporal) sunset (time).",
            "My dog (animal) has a dream (cognitive) of getting treats (possession).",
        ],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &["The teacher (human) writes the equals sign (attribute) on (spatial) the board (object) with (instrumental) chalk (object)."],
        output_heading: "Revised Sentences:",
        output: &["The teacher (human) writes the equals sign (communication) on (spatial) the board (object) with (instrumental) chalk (object)."],
    },
];

/// Assigns taxonomy labels to propositions.
pub struct Annotator {
    oracle: Arc<dyn Oracle>,
    settings: StageSettings,
    config: AnnotatorConfig,
}

impl Annotator {
    pub fn new(oracle: Arc<dyn Oracle>, settings: StageSettings) -> Self {
        Self::with_config(oracle, settings, AnnotatorConfig::default())
    }

    pub fn with_config(oracle: Arc<dyn Oracle>, settings: StageSettings, config: AnnotatorConfig) -> Self {
        Self {
            oracle,
            settings,
            config,
        }
    }

    /// Prompt segments for annotating `propositions` in `mode`.
    pub fn build_prompt(
        &self,
        propositions: &[Proposition],
        mode: AnnotationMode,
        context: Option<&str>,
    ) -> Vec<String> {
        let context = prompt::sanitize_context(context, self.config.max_context_chars);

        let builder = match mode {
            AnnotationMode::Fresh => PromptBuilder::new().segment(
                "Given a list of simple, declarative sentences, infer the types of the main \
                 entities and the prepositions relating them.\n",
            ),
            AnnotationMode::Revision => PromptBuilder::new().segment(
                "You will receive a list of sentences that have been annotated with the types of \
                 their main entities and the prepositions relating them.\n\
                 However, some of the sentences may contain errors in their type annotations that \
                 make them implausible or inconsistent with real-world knowledge.\n\
                 Your task is to identify and correct these errors. Please make the minimal number \
                 of revisions necessary: keep correct labels as they are, do not add labels to \
                 words that have none, and do not reword the sentences.\n\
                 Again, please only type entities and prepositions, and use the correct type system \
                 for each one.\n",
            ),
        };

        let builder = match context {
            Some(context) => builder.segment(format!(
                "Here is some context to help you revise the annotations: {}\n",
                context
            )),
            None => builder.segment(LITERAL_READING),
        };

        let (examples, instruction) = match mode {
            AnnotationMode::Fresh => (
                FRESH_EXAMPLES,
                "Now, type the following text. Only generate the list of typed sentences, one per \
                 input sentence and in the same order, without any additional commentary or \
                 explanation.\n",
            ),
            AnnotationMode::Revision => (
                REVISION_EXAMPLES,
                "Now, revise the following text. Only generate the list of revised sentences, one \
                 per input sentence and in the same order, without any additional commentary or \
                 explanation.\n",
            ),
        };

        let lines: Vec<String> = propositions
            .iter()
            .map(|p| match mode {
                AnnotationMode::Fresh => p.text.clone(),
                AnnotationMode::Revision => p.render(),
            })
            .collect();

        builder
            .entity_listing()
            .segment(RELATION_RULE)
            .relation_listing()
            .segment(TIE_BREAK)
            .examples(examples)
            .segment(instruction)
            .input(&lines)
            .build()
    }

    /// Annotate `propositions` in `mode`, optionally guided by `context`.
    pub async fn annotate(
        &self,
        propositions: &[Proposition],
        mode: AnnotationMode,
        context: Option<&str>,
    ) -> Result<TypedText> {
        if propositions.is_empty() {
            return Err(NlTypeError::InvalidInput("no propositions to annotate".to_string()));
        }
        if mode == AnnotationMode::Revision && !propositions.iter().any(Proposition::is_annotated) {
            return Err(NlTypeError::InvalidInput(
                "revision requires annotated propositions".to_string(),
            ));
        }

        let request = self
            .settings
            .request(self.build_prompt(propositions, mode, context));
        tracing::debug!(
            oracle = self.oracle.name(),
            ?mode,
            propositions = propositions.len(),
            has_context = context.is_some(),
            "Requesting annotation"
        );

        let output = self.oracle.complete(&request).await?;
        let typed = parse_output(propositions, mode, &output)?;

        if mode == AnnotationMode::Revision {
            let before: TypedText = propositions.iter().cloned().collect();
            tracing::debug!(changes = before.label_changes(&typed).len(), "Annotations revised");
        }
        tracing::info!(?mode, labels = typed.label_count(), "Propositions annotated");
        Ok(typed)
    }

    /// Fresh annotation of untyped propositions.
    pub async fn annotate_fresh(&self, propositions: &[Proposition]) -> Result<TypedText> {
        self.annotate(propositions, AnnotationMode::Fresh, None).await
    }

    /// Revision of an existing typed text.
    pub async fn revise(&self, typed: &TypedText, context: Option<&str>) -> Result<TypedText> {
        self.annotate(&typed.propositions, AnnotationMode::Revision, context)
            .await
    }
}

/// Parse an annotation completion against the propositions it annotates.
pub fn parse_output(
    input: &[Proposition],
    mode: AnnotationMode,
    output: &str,
) -> std::result::Result<TypedText, ContractViolation> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() != input.len() {
        return Err(ContractViolation::grammar(
            Stage::Annotate,
            format!(
                "expected {} annotated lines, got {}",
                input.len(),
                lines.len()
            ),
        ));
    }

    let mut propositions = Vec::with_capacity(lines.len());
    for (index, (line, original)) in lines.iter().zip(input).enumerate() {
        let proposition = grammar::parse_line_against(Stage::Annotate, line, &original.text)?;

        if !grammar::same_surface(&proposition.text, &original.text) {
            return Err(ContractViolation::grammar(
                Stage::Annotate,
                format!(
                    "line {} does not reproduce its proposition: expected '{}', got '{}'",
                    index + 1,
                    original.text,
                    proposition.text
                ),
            ));
        }

        if mode == AnnotationMode::Revision {
            check_revision_scope(index, original, &proposition)?;
        }

        propositions.push(proposition);
    }

    Ok(TypedText::new(propositions))
}

/// Revision may only relabel spans that already carried a label.
fn check_revision_scope(
    index: usize,
    original: &Proposition,
    revised: &Proposition,
) -> std::result::Result<(), ContractViolation> {
    let labeled: HashSet<String> = original
        .labels()
        .into_iter()
        .map(|(_, span, _)| span.to_lowercase())
        .collect();

    for (_, span, label) in revised.labels() {
        if !labeled.contains(&span.to_lowercase()) {
            return Err(ContractViolation::grammar(
                Stage::Annotate,
                format!(
                    "line {} labels '{}' ({}) which was unlabeled in the input",
                    index + 1,
                    span,
                    label
                ),
            ));
        }
    }
    Ok(())
}
