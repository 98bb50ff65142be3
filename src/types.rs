//! Core data model: propositions, typed text, generalized rewrites and verdicts.

use serde::{Deserialize, Serialize};

use crate::grammar;
use crate::taxonomy::{EntityType, Label, RelationType};

// ============================================================================
// Propositions
// ============================================================================

/// An entity span typed with an [`EntityType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnnotation {
    /// The surface span as it appears in the proposition text.
    pub span: String,
    pub entity_type: EntityType,
    /// Byte offset of the span in the plain proposition text.
    pub start: usize,
    /// Byte offset just past the span; the label is rendered here.
    pub end: usize,
}

/// A relation-bearing preposition typed with a [`RelationType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationAnnotation {
    pub preposition: String,
    pub relation_type: RelationType,
    pub start: usize,
    pub end: usize,
}

/// A minimal declarative clause, optionally carrying type annotations.
///
/// `text` is always the plain clause; annotations point into it by offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposition {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<EntityAnnotation>,
    #[serde(default)]
    pub relations: Vec<RelationAnnotation>,
}

impl Proposition {
    /// An untyped proposition.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Whether any entity or relation carries a label.
    pub fn is_annotated(&self) -> bool {
        !self.entities.is_empty() || !self.relations.is_empty()
    }

    /// All labels keyed by the offset they are rendered at, in text order.
    pub fn labels(&self) -> Vec<(usize, &str, Label)> {
        let mut labels: Vec<(usize, &str, Label)> = self
            .entities
            .iter()
            .map(|e| (e.end, e.span.as_str(), Label::Entity(e.entity_type)))
            .chain(
                self.relations
                    .iter()
                    .map(|r| (r.end, r.preposition.as_str(), Label::Relation(r.relation_type))),
            )
            .collect();
        labels.sort_by_key(|(end, _, _)| *end);
        labels
    }

    pub fn entity_types(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.entities.iter().map(|e| e.entity_type)
    }

    pub fn relation_types(&self) -> impl Iterator<Item = RelationType> + '_ {
        self.relations.iter().map(|r| r.relation_type)
    }

    /// The clause with labels written inline, e.g. `The boy (human) is ...`.
    pub fn render(&self) -> String {
        grammar::render(self)
    }
}

impl std::fmt::Display for Proposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// ============================================================================
// Typed Text
// ============================================================================

/// One label that differs between two annotations of the same text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChange {
    /// Index of the proposition within the typed text.
    pub proposition: usize,
    pub span: String,
    /// `None` when the span was unlabeled before.
    pub from: Option<Label>,
    /// `None` when the label was removed.
    pub to: Option<Label>,
}

/// An ordered sequence of annotated propositions in discourse order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedText {
    pub propositions: Vec<Proposition>,
}

impl TypedText {
    pub fn new(propositions: Vec<Proposition>) -> Self {
        Self { propositions }
    }

    pub fn len(&self) -> usize {
        self.propositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.propositions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Proposition> {
        self.propositions.iter()
    }

    /// Inline-annotated lines, one per proposition.
    pub fn lines(&self) -> Vec<String> {
        self.propositions.iter().map(Proposition::render).collect()
    }

    /// Number of labels across all propositions.
    pub fn label_count(&self) -> usize {
        self.propositions
            .iter()
            .map(|p| p.entities.len() + p.relations.len())
            .sum()
    }

    /// Labels that differ between `self` and a revised annotation of the same text.
    ///
    /// Annotations are matched by proposition index and rendering offset.
    pub fn label_changes(&self, revised: &TypedText) -> Vec<LabelChange> {
        let mut changes = Vec::new();
        let count = self.len().max(revised.len());

        for index in 0..count {
            let before = self.propositions.get(index).map(|p| p.labels()).unwrap_or_default();
            let after = revised.propositions.get(index).map(|p| p.labels()).unwrap_or_default();

            for (end, span, label) in &before {
                match after.iter().find(|(e, _, _)| e == end) {
                    Some((_, _, new_label)) if new_label == label => {}
                    Some((_, new_span, new_label)) => changes.push(LabelChange {
                        proposition: index,
                        span: new_span.to_string(),
                        from: Some(*label),
                        to: Some(*new_label),
                    }),
                    None => changes.push(LabelChange {
                        proposition: index,
                        span: span.to_string(),
                        from: Some(*label),
                        to: None,
                    }),
                }
            }

            for (end, span, label) in &after {
                if !before.iter().any(|(e, _, _)| e == end) {
                    changes.push(LabelChange {
                        proposition: index,
                        span: span.to_string(),
                        from: None,
                        to: Some(*label),
                    });
                }
            }
        }

        changes
    }
}

impl FromIterator<Proposition> for TypedText {
    fn from_iter<I: IntoIterator<Item = Proposition>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TypedText {
    type Item = &'a Proposition;
    type IntoIter = std::slice::Iter<'a, Proposition>;

    fn into_iter(self) -> Self::IntoIter {
        self.propositions.iter()
    }
}

// ============================================================================
// Generalized Rewrite
// ============================================================================

/// A [`TypedText`] whose typed surface terms were replaced by their type names.
///
/// Entity annotations point at the type-name occurrences; relation hints are
/// kept inline. Derived from, and only meaningful next to, its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneralizedRewrite {
    typed: TypedText,
}

impl GeneralizedRewrite {
    pub(crate) fn new(typed: TypedText) -> Self {
        Self { typed }
    }

    pub fn propositions(&self) -> &[Proposition] {
        &self.typed.propositions
    }

    /// The rewrite as annotator-compatible typed text.
    pub fn as_typed_text(&self) -> &TypedText {
        &self.typed
    }

    pub fn into_typed_text(self) -> TypedText {
        self.typed
    }

    pub fn len(&self) -> usize {
        self.typed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.typed.is_empty()
    }

    /// Rewritten lines as they are sent to plausibility judgment: type names
    /// bare, relation hints inline.
    pub fn lines(&self) -> Vec<String> {
        self.typed.propositions.iter().map(hinted).collect()
    }

    /// Index of the rewritten line with the same surface as `text`.
    pub fn position_of(&self, text: &str) -> Option<usize> {
        self.position_of_from(text, 0)
    }

    /// Like [`position_of`](Self::position_of), considering only lines at or after `start`.
    pub fn position_of_from(&self, text: &str, start: usize) -> Option<usize> {
        self.lines()
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, line)| grammar::same_surface(line, text))
            .map(|(index, _)| index)
    }
}

fn hinted(p: &Proposition) -> String {
    grammar::render(&Proposition {
        text: p.text.clone(),
        entities: Vec::new(),
        relations: p.relations.clone(),
    })
}

// ============================================================================
// Verdict
// ============================================================================

/// A single implausible proposition reported by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Index of the offending proposition in the generalized rewrite.
    pub index: usize,
    /// The offending generalized proposition text.
    pub proposition: String,
    pub explanation: String,
}

/// A non-empty list of diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Diagnostic>", into = "Vec<Diagnostic>")]
pub struct Violations(Vec<Diagnostic>);

impl Violations {
    /// Returns `None` for an empty list.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Option<Self> {
        if diagnostics.is_empty() {
            None
        } else {
            Some(Self(diagnostics))
        }
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
}

impl TryFrom<Vec<Diagnostic>> for Violations {
    type Error = String;

    fn try_from(diagnostics: Vec<Diagnostic>) -> std::result::Result<Self, Self::Error> {
        Self::new(diagnostics).ok_or_else(|| "a failing verdict needs at least one diagnostic".to_string())
    }
}

impl From<Violations> for Vec<Diagnostic> {
    fn from(violations: Violations) -> Self {
        violations.0
    }
}

/// Outcome of plausibility judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "diagnostics", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail(Violations),
}

impl Verdict {
    /// A failing verdict, or `None` when there are no diagnostics.
    pub fn fail(diagnostics: Vec<Diagnostic>) -> Option<Self> {
        Violations::new(diagnostics).map(Verdict::Fail)
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Diagnostics of a failing verdict; empty for `Pass`.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Verdict::Pass => &[],
            Verdict::Fail(violations) => violations.as_slice(),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "{}", crate::verifier::PASS_TOKEN),
            Verdict::Fail(violations) => {
                for (i, d) in violations.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    writeln!(f, "{}", crate::verifier::ERROR_TOKEN)?;
                    writeln!(f, "{}", d.proposition)?;
                    write!(f, "{}", d.explanation)?;
                }
                Ok(())
            }
        }
    }
}
