//! nltype: a type checker for natural-language semantics
//!
//! Text is decomposed into minimal propositions, their entities and
//! relation-bearing prepositions are annotated against a closed taxonomy,
//! and the typed text is checked for plausibility through a generalized,
//! type-only rewrite. Every stage delegates language understanding to an
//! injected [`Oracle`] and validates what comes back.

pub mod annotator;
pub mod config;
pub mod decomposer;
pub mod error;
pub mod grammar;
pub mod oracle;
pub mod pipeline;
pub mod prompt;
pub mod taxonomy;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod verifier;

pub use annotator::{AnnotationMode, Annotator};
pub use config::{AnnotatorConfig, Config, OracleConfig, OracleProvider, PipelineConfig};
pub use decomposer::Decomposer;
pub use error::{
    ConfigError, ContractViolation, NlTypeError, OracleError, Result, Stage, ViolationKind,
};
pub use oracle::{CompletionRequest, Oracle, ResponsivenessLevel, StageSettings};
pub use pipeline::{CheckReport, Pipeline, RevisionReport, RunMetadata};
pub use taxonomy::{EntityType, Label, RelationType};
pub use types::{
    Diagnostic, EntityAnnotation, GeneralizedRewrite, LabelChange, Proposition,
    RelationAnnotation, TypedText, Verdict, Violations,
};
pub use verifier::Verifier;
