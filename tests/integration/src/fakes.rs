//! Scripted stand-ins for the external collaborators

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use market_core::{
    AiReviewer, DomainError, PartRequest, PaymentVerifier, ReviewVerdict, RuleVerdict, SpamCheck,
    SpamRulesEvaluator,
};
use parking_lot::Mutex;

/// Answers every check with the configured verdict; `None` means "down"
pub struct ScriptedSpamRules {
    verdict: Mutex<Option<RuleVerdict>>,
}

impl Default for ScriptedSpamRules {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Some(RuleVerdict::Allow)),
        }
    }
}

impl ScriptedSpamRules {
    pub fn answer(&self, verdict: RuleVerdict) {
        *self.verdict.lock() = Some(verdict);
    }

    pub fn go_down(&self) {
        *self.verdict.lock() = None;
    }
}

#[async_trait]
impl SpamRulesEvaluator for ScriptedSpamRules {
    async fn evaluate(&self, _check: &SpamCheck) -> Result<RuleVerdict, DomainError> {
        self.verdict
            .lock()
            .clone()
            .ok_or_else(|| DomainError::DependencyUnavailable("spam rules".into()))
    }
}

/// Plays back queued answers, then repeats the fallback; `None` means unreachable
pub struct ScriptedReviewer {
    queue: Mutex<VecDeque<Option<bool>>>,
    fallback: Mutex<Option<bool>>,
    calls: AtomicU32,
}

impl Default for ScriptedReviewer {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Some(true)),
            calls: AtomicU32::new(0),
        }
    }
}

impl ScriptedReviewer {
    pub fn push(&self, answer: Option<bool>) {
        self.queue.lock().push_back(answer);
    }

    pub fn always(&self, answer: Option<bool>) {
        *self.fallback.lock() = answer;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiReviewer for ScriptedReviewer {
    async fn evaluate(&self, _request: &PartRequest) -> Result<ReviewVerdict, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.queue.lock().pop_front().unwrap_or(*self.fallback.lock());
        answer
            .map(|approved| ReviewVerdict { approved })
            .ok_or_else(|| DomainError::DependencyUnavailable("ai reviewer".into()))
    }
}

/// Confirms or denies every reference
pub struct ScriptedVerifier {
    answer: Mutex<bool>,
}

impl Default for ScriptedVerifier {
    fn default() -> Self {
        Self {
            answer: Mutex::new(true),
        }
    }
}

impl ScriptedVerifier {
    pub fn answer(&self, verified: bool) {
        *self.answer.lock() = verified;
    }
}

#[async_trait]
impl PaymentVerifier for ScriptedVerifier {
    async fn verify(&self, _reference: &str, _expected_amount: i64) -> Result<bool, DomainError> {
        Ok(*self.answer.lock())
    }
}
