//! Moderation types - gate input, rule verdicts and review outcomes

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// What the anti-spam rules evaluator is asked about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpamCheck {
    /// Digits-only
    pub phone: String,
    pub user_id: Snowflake,
    pub content: String,
}

/// Answer from the rules evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    Allow,
    Uncertain(String),
    Reject(String),
}

/// Gate-level moderation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationVerdict {
    Allow,
    FlagForReview,
    Block,
}

/// Outcome of the gate for one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationDecision {
    pub verdict: ModerationVerdict,
    pub reason: Option<String>,
}

impl ModerationDecision {
    pub fn allow() -> Self {
        Self {
            verdict: ModerationVerdict::Allow,
            reason: None,
        }
    }

    pub fn flag(reason: impl Into<String>) -> Self {
        Self {
            verdict: ModerationVerdict::FlagForReview,
            reason: Some(reason.into()),
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            verdict: ModerationVerdict::Block,
            reason: Some(reason.into()),
        }
    }

    #[inline]
    pub fn allowed(&self) -> bool {
        self.verdict != ModerationVerdict::Block
    }

    #[inline]
    pub fn requires_review(&self) -> bool {
        self.verdict == ModerationVerdict::FlagForReview
    }
}

impl From<RuleVerdict> for ModerationDecision {
    fn from(verdict: RuleVerdict) -> Self {
        match verdict {
            RuleVerdict::Allow => Self::allow(),
            RuleVerdict::Uncertain(reason) => Self::flag(reason),
            RuleVerdict::Reject(reason) => Self::block(reason),
        }
    }
}

/// Answer from the AI reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub approved: bool,
}
