use std::fmt;

use super::RunPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Read-only call, no gas
    Query,
    /// State-mutating call signed by the caller account
    Transaction,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Query => write!(f, "query"),
            CallKind::Transaction => write!(f, "transaction"),
        }
    }
}

/// One scripted call against a contract handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    pub method: String,
    /// Human readable name used in the console output
    pub label: String,
    pub args: Vec<String>,
    pub kind: CallKind,
}

impl CallDescriptor {
    pub fn query(method: &str, label: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            method: method.to_string(),
            label: label.into(),
            args,
            kind: CallKind::Query,
        }
    }

    pub fn transaction(method: &str, label: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            method: method.to_string(),
            label: label.into(),
            args,
            kind: CallKind::Transaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Rendered result of a query, or the hash of a mined transaction
    Ok(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub label: String,
    pub kind: CallKind,
    pub outcome: StepOutcome,
}

/// Everything that happened after the deployment barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub phase: RunPhase,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub(super) fn new() -> Self {
        Self {
            phase: RunPhase::Init,
            steps: Vec::new(),
        }
    }

    pub(super) fn record(&mut self, label: &str, kind: CallKind, outcome: StepOutcome) {
        self.steps.push(StepRecord {
            label: label.to_string(),
            kind,
            outcome,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn log_summary(&self) {
        let failed = self.failures().count();
        tracing::info!(
            "Run {}: {} step(s), {} failed",
            self.phase,
            self.steps.len(),
            failed
        );
        for step in self.failures() {
            if let StepOutcome::Failed(reason) = &step.outcome {
                tracing::warn!("  {} {} failed: {}", step.kind, step.label, reason);
            }
        }
    }
}
