//! Oracle trait definitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How much effort the oracle should spend before answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsivenessLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ResponsivenessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsivenessLevel::Low => "low",
            ResponsivenessLevel::Medium => "medium",
            ResponsivenessLevel::High => "high",
        }
    }
}

impl std::fmt::Display for ResponsivenessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponsivenessLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ResponsivenessLevel::Low),
            "medium" => Ok(ResponsivenessLevel::Medium),
            "high" => Ok(ResponsivenessLevel::High),
            _ => Err(format!(
                "Invalid responsiveness level: '{}'. Valid options: low, medium, high",
                s
            )),
        }
    }
}

/// One stateless completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model/version selector passed through to the provider.
    pub model: String,
    /// Prompt segments, concatenated in order to form one instruction.
    pub segments: Vec<String>,
    pub level: ResponsivenessLevel,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, segments: Vec<String>, level: ResponsivenessLevel) -> Self {
        Self {
            model: model.into(),
            segments,
            level,
        }
    }

    /// The full instruction text.
    pub fn prompt(&self) -> String {
        self.segments.concat()
    }
}

/// Model selection a stage is constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSettings {
    pub model: String,
    pub level: ResponsivenessLevel,
}

impl StageSettings {
    pub fn new(model: impl Into<String>, level: ResponsivenessLevel) -> Self {
        Self {
            model: model.into(),
            level,
        }
    }

    /// A request for `segments` using this model selection.
    pub fn request(&self, segments: Vec<String>) -> CompletionRequest {
        CompletionRequest::new(self.model.clone(), segments, self.level)
    }
}

/// A black-box text completion service.
///
/// Implementations must not retry or post-process: the returned string is
/// exactly what the provider produced.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete the instruction formed by the request's segments.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Provider name, used in logs.
    fn name(&self) -> &str;
}
