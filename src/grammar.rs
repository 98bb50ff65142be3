//! Inline annotation grammar: `term (label)` for entities, `preposition (relation)`
//! for typed relations.
//!
//! A parenthesised group is a label group when its content looks like a word
//! label (`[A-Za-z][A-Za-z _-]*`) and the group is not already part of the
//! source text; anything else in parentheses is ordinary text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ContractViolation, Stage};
use crate::taxonomy::{EntityType, Label};
use crate::types::{EntityAnnotation, Proposition, RelationAnnotation};

static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)").expect("Invalid regex"));

static LABEL_CONTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-Za-z][A-Za-z _-]*\s*$").expect("Invalid regex"));

/// Matches each entity type name in either its hyphenated or spaced spelling.
static TYPE_NAMES: LazyLock<Vec<(EntityType, Regex)>> = LazyLock::new(|| {
    EntityType::ALL
        .into_iter()
        .map(|t| {
            let pattern = format!(r"(?i)\b{}\b", t.as_str().replace('-', "[- ]"));
            (t, Regex::new(&pattern).expect("Invalid regex"))
        })
        .collect()
});

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "my", "his", "her", "its", "our", "their", "your", "this", "that", "these",
    "those", "some", "every", "each",
];

const MULTI_WORD_PREPOSITIONS: &[&str] = &[
    "in front of",
    "on top of",
    "because of",
    "due to",
    "next to",
    "out of",
    "instead of",
    "according to",
    "away from",
];

/// How many tokens back a determiner may sit from the end of an entity span.
const DETERMINER_WINDOW: usize = 3;

// ============================================================================
// Parsing
// ============================================================================

/// Parse one inline-annotated line into a [`Proposition`].
///
/// Labels outside the taxonomy are taxonomy violations; a label with no
/// preceding term is a grammar violation.
pub fn parse_line(stage: Stage, line: &str) -> Result<Proposition, ContractViolation> {
    parse_line_against(stage, line, "")
}

/// Parse an annotated line produced from `source`, a plain proposition text.
///
/// Parenthesised groups that occur verbatim in `source` belong to the
/// sentence itself and are kept as text.
pub fn parse_line_against(
    stage: Stage,
    line: &str,
    source: &str,
) -> Result<Proposition, ContractViolation> {
    let line = line.trim();
    let mut plain = String::with_capacity(line.len());
    let mut entities = Vec::new();
    let mut relations = Vec::new();
    let mut cursor = 0;
    let mut boundary = 0;

    for group in PAREN_GROUP.captures_iter(line) {
        let Some(whole) = group.get(0) else {
            continue;
        };
        let content = &group[1];
        if !LABEL_CONTENT.is_match(content) || source.contains(whole.as_str()) {
            continue;
        }

        let label: Label = content
            .parse()
            .map_err(|_| ContractViolation::taxonomy(stage, content.trim()))?;

        plain.push_str(line[cursor..whole.start()].trim_end());
        cursor = whole.end();
        let end = plain.len();

        let (start, span) = match label {
            Label::Entity(_) => entity_span(&plain, boundary, end),
            Label::Relation(_) => relation_span(&plain, boundary, end),
        }
        .ok_or_else(|| {
            ContractViolation::grammar(
                stage,
                format!("label '({})' does not follow a term in: {}", content.trim(), line),
            )
        })?;

        match label {
            Label::Entity(entity_type) => entities.push(EntityAnnotation {
                span,
                entity_type,
                start,
                end,
            }),
            Label::Relation(relation_type) => relations.push(RelationAnnotation {
                preposition: span,
                relation_type,
                start,
                end,
            }),
        }
        boundary = end;
    }

    plain.push_str(&line[cursor..]);

    Ok(Proposition {
        text: plain,
        entities,
        relations,
    })
}

/// Whitespace-separated tokens of `text[from..to]` with absolute byte offsets.
fn tokens(text: &str, from: usize, to: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text[from..to].char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((from + s, from + i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((from + s, to));
    }
    out
}

/// Tokens after the last clause punctuation between `boundary` and `end`.
fn candidate_tokens(plain: &str, boundary: usize, end: usize) -> Vec<(usize, usize)> {
    let all = tokens(plain, boundary, end);
    let cut = all
        .iter()
        .rposition(|&(s, e)| plain[s..e].ends_with([',', ';', ':', '.', '!', '?']))
        .map(|i| i + 1)
        .unwrap_or(0);
    all[cut..].to_vec()
}

fn entity_span(plain: &str, boundary: usize, end: usize) -> Option<(usize, String)> {
    let candidates = candidate_tokens(plain, boundary, end);
    let last = candidates.len().checked_sub(1)?;

    let window_start = last.saturating_sub(DETERMINER_WINDOW);
    let determiner = (window_start..last)
        .rev()
        .find(|&i| {
            let (s, e) = candidates[i];
            DETERMINERS.contains(&plain[s..e].to_lowercase().as_str())
        });

    let first = match determiner {
        Some(i) => i + 1,
        None => {
            let mut first = last;
            let capitalized = |i: usize| {
                let (s, _) = candidates[i];
                plain[s..].starts_with(|c: char| c.is_uppercase())
            };
            if capitalized(last) {
                while first > 0 && capitalized(first - 1) {
                    first -= 1;
                }
            }
            first
        }
    };

    let start = candidates[first].0;
    Some((start, plain[start..end].to_string()))
}

fn relation_span(plain: &str, boundary: usize, end: usize) -> Option<(usize, String)> {
    let candidates = candidate_tokens(plain, boundary, end);
    let last = candidates.len().checked_sub(1)?;

    for phrase in MULTI_WORD_PREPOSITIONS {
        let words = phrase.split(' ').count();
        if words > candidates.len() {
            continue;
        }
        let start = candidates[last + 1 - words].0;
        if plain[start..end].to_lowercase() == *phrase {
            return Some((start, plain[start..end].to_string()));
        }
    }

    let start = candidates[last].0;
    Some((start, plain[start..end].to_string()))
}

// ============================================================================
// Rendering
// ============================================================================

/// Write every label inline after its span.
pub fn render(proposition: &Proposition) -> String {
    let mut out = String::with_capacity(proposition.text.len() + 16 * proposition.labels().len());
    let mut cursor = 0;
    for (end, _, label) in proposition.labels() {
        if end < cursor || end > proposition.text.len() {
            continue;
        }
        out.push_str(&proposition.text[cursor..end]);
        out.push_str(" (");
        out.push_str(label.as_str());
        out.push(')');
        cursor = end;
    }
    out.push_str(&proposition.text[cursor..]);
    out
}

// ============================================================================
// Surface Comparison
// ============================================================================

fn normalize_surface(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', '?'])
        .trim_end()
        .to_lowercase()
}

/// Whether two plain clauses have the same surface text.
///
/// Case, whitespace runs and trailing sentence punctuation are ignored.
pub fn same_surface(a: &str, b: &str) -> bool {
    normalize_surface(a) == normalize_surface(b)
}

/// Locate `entity_type`'s name as a whole word in `text`, at or after `from`.
///
/// Occurrences inside a longer type name (`object` in `natural-object`) are
/// skipped.
pub fn find_type_name(text: &str, entity_type: EntityType, from: usize) -> Option<(usize, usize)> {
    type_name_matches(text, entity_type)
        .into_iter()
        .find(|&(start, _)| start >= from)
}

/// Every whole-word occurrence of `entity_type`'s name in `text`, in order.
pub fn type_name_matches(text: &str, entity_type: EntityType) -> Vec<(usize, usize)> {
    let Some((_, regex)) = TYPE_NAMES.iter().find(|(t, _)| *t == entity_type) else {
        return Vec::new();
    };
    regex
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .filter(|&(start, end)| !inside_longer_name(text, entity_type, start, end))
        .collect()
}

fn inside_longer_name(text: &str, entity_type: EntityType, start: usize, end: usize) -> bool {
    TYPE_NAMES
        .iter()
        .filter(|(t, _)| t.as_str().len() > entity_type.as_str().len())
        .any(|(_, regex)| {
            regex
                .find_iter(text)
                .any(|m| m.start() <= start && end <= m.end())
        })
}
