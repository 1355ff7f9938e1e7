//! Anti-spam gate
//!
//! The only blocking step on request submission. The policy object is
//! consulted first, then the rules evaluator under a timeout. Any evaluator
//! failure rejects the submission.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use market_core::{ModerationDecision, ModerationVerdict, PhoneNumber, RequestStatus, SpamCheck, Snowflake};

use super::context::ServiceContext;

/// Result of one gate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub requires_review: bool,
    /// The evaluator could not answer in time; the rejection is not a
    /// judgement on the content.
    #[serde(skip)]
    pub unavailable: bool,
    #[serde(skip)]
    pub decision: ModerationDecision,
}

impl GateOutcome {
    fn from_decision(decision: ModerationDecision) -> Self {
        Self {
            allowed: decision.allowed(),
            message: decision.reason.clone(),
            requires_review: decision.requires_review(),
            unavailable: false,
            decision,
        }
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        let decision = ModerationDecision::block(reason);
        Self {
            allowed: false,
            message: decision.reason.clone(),
            requires_review: false,
            unavailable: true,
            decision,
        }
    }

    /// Status an admitted request starts in, `None` when not admitted
    pub fn initial_status(&self) -> Option<RequestStatus> {
        match self.decision.verdict {
            ModerationVerdict::Allow => Some(RequestStatus::Pending),
            ModerationVerdict::FlagForReview => Some(RequestStatus::PendingReview),
            ModerationVerdict::Block => None,
        }
    }
}

/// Anti-spam gate
pub struct AntiSpamGate<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AntiSpamGate<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, phone, content))]
    pub async fn check(&self, phone: &str, user_id: Snowflake, content: &str) -> GateOutcome {
        let phone = PhoneNumber::normalize(phone);
        let policy = self.ctx.policy();

        if policy.is_phone_blocked(&phone) {
            info!("Submission from blocklisted phone rejected");
            return GateOutcome::from_decision(ModerationDecision::block("phone number is blocked"));
        }
        if policy.is_trusted(user_id) {
            return GateOutcome::from_decision(ModerationDecision::allow());
        }

        let check = SpamCheck {
            phone,
            user_id,
            content: content.to_string(),
        };
        let timeout = Duration::from_millis(self.ctx.settings().moderation.gate_timeout_ms);

        match tokio::time::timeout(timeout, self.ctx.spam_rules().evaluate(&check)).await {
            Ok(Ok(verdict)) => {
                let outcome = GateOutcome::from_decision(ModerationDecision::from(verdict));
                info!(
                    allowed = outcome.allowed,
                    requires_review = outcome.requires_review,
                    "Gate decided"
                );
                outcome
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Spam rules evaluator failed, rejecting");
                GateOutcome::unavailable("moderation is temporarily unavailable")
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Spam rules evaluator timed out, rejecting");
                GateOutcome::unavailable("moderation is temporarily unavailable")
            }
        }
    }
}
