//! Error types for the nltype pipeline.
//!
//! Semantic type errors found by the verifier are *not* represented here:
//! they are ordinary results carried by [`crate::types::Verdict::Fail`].

use thiserror::Error;

/// Main error type for nltype operations.
#[derive(Error, Debug)]
pub enum NlTypeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("{0}")]
    Contract(#[from] ContractViolation),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NlTypeError {
    /// The contract violation behind this error, if any.
    pub fn as_contract(&self) -> Option<&ContractViolation> {
        match self {
            NlTypeError::Contract(violation) => Some(violation),
            _ => None,
        }
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Transport-level failures talking to the oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("API key not provided and {0} env var not set")]
    MissingApiKey(String),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Oracle returned an empty completion")]
    EmptyCompletion,
}

/// The pipeline stage whose output broke its contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decompose,
    Annotate,
    Generalize,
    Judge,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Decompose => write!(f, "decompose"),
            Stage::Annotate => write!(f, "annotate"),
            Stage::Generalize => write!(f, "generalize"),
            Stage::Judge => write!(f, "judge"),
        }
    }
}

/// Why an oracle completion was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The completion does not follow the stage's output grammar.
    Grammar(String),
    /// An annotation uses a label outside the closed taxonomy.
    Taxonomy { label: String },
}

/// An oracle completion that does not conform to its stage's contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} stage contract violation: {}", describe(.kind))]
pub struct ContractViolation {
    pub stage: Stage,
    pub kind: ViolationKind,
}

fn describe(kind: &ViolationKind) -> String {
    match kind {
        ViolationKind::Grammar(reason) => reason.clone(),
        ViolationKind::Taxonomy { label } => format!("label '{}' is not in the taxonomy", label),
    }
}

impl ContractViolation {
    pub fn grammar(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ViolationKind::Grammar(reason.into()),
        }
    }

    pub fn taxonomy(stage: Stage, label: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ViolationKind::Taxonomy {
                label: label.into(),
            },
        }
    }

    /// Whether this is a taxonomy violation rather than a grammar violation.
    pub fn is_taxonomy(&self) -> bool {
        matches!(self.kind, ViolationKind::Taxonomy { .. })
    }
}

/// Result type alias for nltype operations.
pub type Result<T> = std::result::Result<T, NlTypeError>;
