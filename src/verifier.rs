//! Two-phase consistency verification.
//!
//! Phase A rewrites every typed term into its type name so that phase B can
//! judge plausibility from type combinations alone, independent of the words
//! that were used. Phase B must answer `TypeCheckPassed` or one `TypeError`
//! block per implausible proposition.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{ContractViolation, NlTypeError, Result, Stage};
use crate::grammar;
use crate::oracle::{Oracle, StageSettings};
use crate::prompt::{FewShot, PromptBuilder};
use crate::taxonomy::{EntityType, RelationType};
use crate::types::{Diagnostic, EntityAnnotation, GeneralizedRewrite, Proposition, TypedText, Verdict};

/// Sole content of a passing judgment.
pub const PASS_TOKEN: &str = "TypeCheckPassed";

/// Opens every diagnostic block of a failing judgment.
pub const ERROR_TOKEN: &str = "TypeError";

const REWRITE_EXAMPLES: &[FewShot] = &[
    FewShot {
        input_heading: "Input sentences:",
        input: &["The boy (human) is playing soccer (action) in (spatial) the park (location)."],
        output_heading: "Output sentences:",
        output: &["The human is playing an action in (spatial) the location."],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &[
            "My dog (animal) is sleeping on (spatial) his bed (object) before (temporal) sunset (time).",
            "My dog (animal) has a dream (cognitive) of getting treats (possession).",
            "My dog (animal) is happy (feeling) because of (causal) the treat (possession).",
        ],
        output_heading: "Output sentences:",
        output: &[
            "My animal is sleeping on (spatial) his object before (temporal) a time.",
            "My animal has a cognitive state of getting a possession.",
            "My animal is experiencing a feeling because of (causal) a possession.",
        ],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &[
            "The teacher (human) writes the equals sign (communication) on (spatial) the board (object) with (instrumental) chalk (object).",
            "The teacher (human) computes the answer (cognitive) to 1 (numeral) + 1 (numeral).",
        ],
        output_heading: "Output sentences:",
        output: &[
            "The human writes a communication on (spatial) the object with (instrumental) the object.",
            "The human computes a cognitive state to a numeral + a numeral.",
        ],
    },
];

const JUDGMENT_EXAMPLES: &[FewShot] = &[
    FewShot {
        input_heading: "Input sentences:",
        input: &["The human is playing an action in (spatial) the location."],
        output_heading: "Output:",
        output: &["TypeCheckPassed"],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &[
            "The object is sleeping on (spatial) the body-part before (temporal) the natural-phenomenon.",
            "The object is below (spatial) the object.",
        ],
        output_heading: "Output:",
        output: &[
            "TypeError",
            "The object is sleeping on (spatial) the body-part before (temporal) the natural-phenomenon.",
            "Sleeping is an action that cannot be performed by an object.",
        ],
    },
    FewShot {
        input_heading: "Input sentences:",
        input: &["The human writes a communication on (spatial) the object with (instrumental) the attribute."],
        output_heading: "Output:",
        output: &[
            "TypeError",
            "The human writes a communication on (spatial) the object with (instrumental) the attribute.",
            "An attribute (e.g., red, tall, beautiful) cannot be used as an instrument to perform an action.",
        ],
    },
];

/// Generalizes typed text and judges its plausibility.
pub struct Verifier {
    oracle: Arc<dyn Oracle>,
    settings: StageSettings,
}

impl Verifier {
    pub fn new(oracle: Arc<dyn Oracle>, settings: StageSettings) -> Self {
        Self { oracle, settings }
    }

    /// Prompt segments for the generalization phase.
    pub fn build_rewrite_prompt(typed: &TypedText) -> Vec<String> {
        PromptBuilder::new()
            .segment("Given a list of typed sentences, rewrite each sentence to replace each entity with its type.\n")
            .segment(
                "Write entity types bare (e.g., \"the human\"), keep the type hint after each typed \
                 preposition (e.g., \"in (spatial)\"), and keep every other word as it is.\n",
            )
            .taxonomy()
            .examples(REWRITE_EXAMPLES)
            .segment(
                "Now, rewrite the following text. Only generate the list of rewritten sentences, \
                 one per input sentence and in the same order, split by newlines, without any \
                 additional commentary or explanation.\n",
            )
            .input(&typed.lines())
            .build()
    }

    /// Prompt segments for the plausibility phase.
    pub fn build_judgment_prompt(rewrite: &GeneralizedRewrite) -> Vec<String> {
        PromptBuilder::new()
            .segment(
                "You will receive a list of sentences, which have been rewritten to replace their \
                 original entities with generalized types. Additionally, relationships between \
                 entities have been annotated with their type (e.g., spatial, temporal, causal).\n",
            )
            .segment(
                "Your task is to check whether each sentence can plausibly describe a situation in \
                 the real world, based on your world knowledge and understanding of how different \
                 types of entities can interact. Judge only the combination of types and relations, \
                 using the categories below.\n",
            )
            .segment(format!(
                "If you encounter a sentence that seems implausible or inconsistent with real-world \
                 knowledge, return the phrase `{}` on its own line, followed by the sentence that \
                 caused the error on the next line, and a brief description of the cause of the \
                 error naming the invalid type combination. Repeat this for every implausible \
                 sentence, in input order.\n",
                ERROR_TOKEN
            ))
            .segment(format!("If all sentences seem plausible, return only `{}`.\n", PASS_TOKEN))
            .taxonomy()
            .examples(JUDGMENT_EXAMPLES)
            .segment(
                "Now, type check the following text. Format your response precisely like the \
                 examples, omitting `Output:`.\n",
            )
            .input(&rewrite.lines())
            .build()
    }

    /// Phase A: rewrite typed text into its type-generalized form.
    pub async fn generalize(&self, typed: &TypedText) -> Result<GeneralizedRewrite> {
        if typed.is_empty() {
            return Err(NlTypeError::InvalidInput("no propositions to verify".to_string()));
        }

        let request = self.settings.request(Self::build_rewrite_prompt(typed));
        tracing::debug!(
            oracle = self.oracle.name(),
            propositions = typed.len(),
            "Requesting generalization"
        );

        let output = self.oracle.complete(&request).await?;
        let rewrite = parse_rewrite(typed, &output)?;

        tracing::debug!(lines = rewrite.len(), "Typed text generalized");
        Ok(rewrite)
    }

    /// Phase B: judge the plausibility of a generalized rewrite.
    pub async fn judge(&self, rewrite: &GeneralizedRewrite) -> Result<Verdict> {
        let request = self.settings.request(Self::build_judgment_prompt(rewrite));
        tracing::debug!(oracle = self.oracle.name(), "Requesting plausibility judgment");

        let output = self.oracle.complete(&request).await?;
        let verdict = parse_verdict(rewrite, &output)?;

        tracing::info!(
            passed = verdict.is_pass(),
            diagnostics = verdict.diagnostics().len(),
            "Typed text verified"
        );
        Ok(verdict)
    }

    /// Generalize, then judge. Judgment only starts once generalization succeeded.
    pub async fn verify(&self, typed: &TypedText) -> Result<(GeneralizedRewrite, Verdict)> {
        let rewrite = self.generalize(typed).await?;
        let verdict = self.judge(&rewrite).await?;
        Ok((rewrite, verdict))
    }
}

// ============================================================================
// Phase A parsing
// ============================================================================

/// Parse a generalization completion against its source typed text.
///
/// The rewrite must keep exactly the source's types: every entity type as a
/// bare type name, every relation type as an inline hint, and nothing new.
pub fn parse_rewrite(
    typed: &TypedText,
    output: &str,
) -> std::result::Result<GeneralizedRewrite, ContractViolation> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() != typed.len() {
        return Err(ContractViolation::grammar(
            Stage::Generalize,
            format!(
                "expected {} rewritten lines, got {}",
                typed.len(),
                lines.len()
            ),
        ));
    }

    let propositions = lines
        .iter()
        .zip(typed.iter())
        .enumerate()
        .map(|(index, (line, source))| generalize_line(index, line, source))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(GeneralizedRewrite::new(TypedText::new(propositions)))
}

fn generalize_line(
    index: usize,
    line: &str,
    source: &Proposition,
) -> std::result::Result<Proposition, ContractViolation> {
    let violation = |reason: String| {
        ContractViolation::grammar(Stage::Generalize, format!("line {}: {}", index + 1, reason))
    };

    let mut rewritten = grammar::parse_line_against(Stage::Generalize, line, &source.text)?;

    if let Some(entity) = rewritten.entities.first() {
        return Err(violation(format!(
            "entity type '({})' must be written bare, not as a label",
            entity.entity_type
        )));
    }

    let source_relations: BTreeSet<RelationType> = source.relation_types().collect();
    let rewritten_relations: BTreeSet<RelationType> = rewritten.relation_types().collect();
    if let Some(extra) = rewritten_relations.difference(&source_relations).next() {
        return Err(violation(format!("introduces relation type '{}'", extra)));
    }
    if let Some(missing) = source_relations.difference(&rewritten_relations).next() {
        return Err(violation(format!("drops relation type '{}'", missing)));
    }

    // A type name may appear once per labeled entity of that type, plus once
    // per untyped word of the source that already spells it.
    for t in EntityType::ALL {
        let labeled = source.entity_types().filter(|&s| s == t).count();
        let allowed = labeled + untyped_occurrences(source, t);
        let found = grammar::type_name_matches(&rewritten.text, t).len();
        if found > allowed {
            return Err(violation(if labeled == 0 {
                format!("introduces entity type '{}'", t)
            } else {
                format!("has more '{}' entities than its source", t)
            }));
        }
    }

    let mut claimed: Vec<(usize, usize)> = Vec::with_capacity(source.entities.len());
    let mut cursor = 0;
    for entity_type in source.entity_types() {
        let unclaimed: Vec<(usize, usize)> = grammar::type_name_matches(&rewritten.text, entity_type)
            .into_iter()
            .filter(|m| !claimed.contains(m))
            .collect();
        let (start, end) = unclaimed
            .iter()
            .find(|&&(start, _)| start >= cursor)
            .or_else(|| unclaimed.first())
            .copied()
            .ok_or_else(|| violation(format!("drops entity type '{}'", entity_type)))?;
        claimed.push((start, end));
        cursor = end;
    }

    let mut entities: Vec<EntityAnnotation> = claimed
        .into_iter()
        .zip(source.entity_types())
        .map(|((start, end), entity_type)| EntityAnnotation {
            span: rewritten.text[start..end].to_string(),
            entity_type,
            start,
            end,
        })
        .collect();
    entities.sort_by_key(|e| e.end);
    rewritten.entities = entities;

    Ok(rewritten)
}

/// Occurrences of `entity_type`'s name among the words of `source` that carry no label.
fn untyped_occurrences(source: &Proposition, entity_type: EntityType) -> usize {
    grammar::type_name_matches(&source.text, entity_type)
        .into_iter()
        .filter(|&(start, end)| {
            !source
                .entities
                .iter()
                .any(|e| e.start <= start && end <= e.end)
        })
        .count()
}

// ============================================================================
// Phase B parsing
// ============================================================================

/// If `line` opens a `TypeError` block, the proposition written on the same line.
fn error_opener(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(ERROR_TOKEN)?;
    if rest.is_empty() || rest.starts_with(':') || rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start_matches(':').trim())
    } else {
        None
    }
}

/// Parse a plausibility completion into a [`Verdict`].
pub fn parse_verdict(
    rewrite: &GeneralizedRewrite,
    output: &str,
) -> std::result::Result<Verdict, ContractViolation> {
    let malformed = |reason: String| {
        ContractViolation::grammar(Stage::Judge, format!("malformed verdict: {}", reason))
    };

    if output.trim() == PASS_TOKEN {
        return Ok(Verdict::Pass);
    }

    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(malformed("empty completion".to_string()));
    }
    if lines.iter().any(|l| l.contains(PASS_TOKEN)) {
        return Err(malformed(format!(
            "`{}` must be the only content of a passing verdict",
            PASS_TOKEN
        )));
    }

    let mut blocks: Vec<(Option<&str>, Vec<&str>)> = Vec::new();
    for &line in &lines {
        match error_opener(line) {
            Some(inline) => {
                let inline = (!inline.is_empty()).then_some(inline);
                blocks.push((inline, Vec::new()));
            }
            None => match blocks.last_mut() {
                Some((_, body)) => body.push(line),
                None => {
                    return Err(malformed(format!(
                        "expected `{}` or `{}`, found: {}",
                        PASS_TOKEN, ERROR_TOKEN, line
                    )))
                }
            },
        }
    }

    let lines_of_rewrite = rewrite.lines();
    let mut diagnostics = Vec::with_capacity(blocks.len());
    let mut last_index = None;
    for (inline, body) in blocks {
        let mut body = body.into_iter();
        let proposition = match inline {
            Some(p) => p,
            None => body
                .next()
                .ok_or_else(|| malformed(format!("`{}` block without a proposition", ERROR_TOKEN)))?,
        };
        let explanation = body.collect::<Vec<_>>().join(" ");
        if explanation.is_empty() {
            return Err(malformed(format!(
                "`{}` block for '{}' has no explanation",
                ERROR_TOKEN, proposition
            )));
        }

        // Identical generalized lines are matched in turn, so each block
        // claims the first matching line after the previous diagnostic.
        let from = last_index.map_or(0, |last| last + 1);
        let index = match rewrite.position_of_from(proposition, from) {
            Some(index) => index,
            None if rewrite.position_of(proposition).is_some() => {
                return Err(malformed(
                    "diagnostics are not in proposition order".to_string(),
                ))
            }
            None => {
                return Err(malformed(format!(
                    "'{}' is not one of the generalized propositions",
                    proposition
                )))
            }
        };
        last_index = Some(index);

        diagnostics.push(Diagnostic {
            index,
            proposition: lines_of_rewrite[index].clone(),
            explanation,
        });
    }

    Verdict::fail(diagnostics).ok_or_else(|| malformed("no diagnostics".to_string()))
}
