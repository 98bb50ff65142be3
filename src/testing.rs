//! A scripted [`Oracle`] for exercising stages without a live model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{OracleError, Result};
use crate::oracle::{CompletionRequest, Oracle};

/// Replays canned completions in order and records every request it receives.
///
/// Once the script is exhausted, further calls fail with
/// [`OracleError::EmptyCompletion`].
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(completions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(completions.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append another completion to the script.
    pub fn push(&self, completion: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(completion.into());
        }
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Completions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.ok_or_else(|| OracleError::EmptyCompletion.into())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ResponsivenessLevel;

    #[tokio::test]
    async fn test_replays_in_order() {
        let oracle = ScriptedOracle::new(["first", "second"]);
        let request = CompletionRequest::new("model", vec!["prompt".to_string()], ResponsivenessLevel::Low);

        assert_eq!(oracle.complete(&request).await.unwrap(), "first");
        assert_eq!(oracle.complete(&request).await.unwrap(), "second");
        assert!(oracle.complete(&request).await.is_err());
        assert_eq!(oracle.call_count(), 3);
        assert_eq!(oracle.requests()[0].prompt(), "prompt");
    }
}
