//! Fakes and a context factory for service unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use market_core::{
    AiReviewer, DomainError, PartRequest, PaymentVerifier, RequestDraft, ReviewVerdict, RuleVerdict,
    SpamCheck, SpamRulesEvaluator,
};
use market_db::MemoryStore;

use super::context::{ServiceContext, ServiceSettings};
use super::notification::RecordingSink;

pub(crate) struct FakeSpamRules {
    verdict: Mutex<Result<RuleVerdict, DomainError>>,
    delay: Mutex<Option<Duration>>,
}

impl Default for FakeSpamRules {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Ok(RuleVerdict::Allow)),
            delay: Mutex::new(None),
        }
    }
}

impl FakeSpamRules {
    pub fn set(&self, verdict: Result<RuleVerdict, DomainError>) {
        *self.verdict.lock() = verdict;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl SpamRulesEvaluator for FakeSpamRules {
    async fn evaluate(&self, _check: &SpamCheck) -> Result<RuleVerdict, DomainError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match &*self.verdict.lock() {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(DomainError::DependencyUnavailable(e.to_string())),
        }
    }
}

/// Plays back scripted answers, then repeats `fallback`
pub(crate) struct FakeReviewer {
    script: Mutex<VecDeque<Result<bool, DomainError>>>,
    fallback: Mutex<Result<bool, DomainError>>,
    pub calls: AtomicU32,
}

impl Default for FakeReviewer {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(true)),
            calls: AtomicU32::new(0),
        }
    }
}

impl FakeReviewer {
    pub fn push(&self, answer: Result<bool, DomainError>) {
        self.script.lock().push_back(answer);
    }

    pub fn always(&self, answer: Result<bool, DomainError>) {
        *self.fallback.lock() = answer;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn replay(answer: &Result<bool, DomainError>) -> Result<bool, DomainError> {
    match answer {
        Ok(v) => Ok(*v),
        Err(e) => Err(DomainError::DependencyUnavailable(e.to_string())),
    }
}

#[async_trait]
impl AiReviewer for FakeReviewer {
    async fn evaluate(&self, _request: &PartRequest) -> Result<ReviewVerdict, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        let answer = match scripted {
            Some(answer) => answer,
            None => replay(&self.fallback.lock()),
        };
        answer.map(|approved| ReviewVerdict { approved })
    }
}

pub(crate) struct FakeVerifier {
    answer: Mutex<Result<bool, DomainError>>,
    pub calls: AtomicU32,
}

impl Default for FakeVerifier {
    fn default() -> Self {
        Self {
            answer: Mutex::new(Ok(true)),
            calls: AtomicU32::new(0),
        }
    }
}

impl FakeVerifier {
    pub fn set(&self, answer: Result<bool, DomainError>) {
        *self.answer.lock() = answer;
    }
}

#[async_trait]
impl PaymentVerifier for FakeVerifier {
    async fn verify(&self, _reference: &str, _expected_amount: i64) -> Result<bool, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        replay(&self.answer.lock())
    }
}

#[derive(Clone, Default)]
pub(crate) struct Fakes {
    pub spam: Arc<FakeSpamRules>,
    pub reviewer: Arc<FakeReviewer>,
    pub verifier: Arc<FakeVerifier>,
}

pub(crate) struct Harness {
    pub ctx: ServiceContext,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub fakes: Fakes,
}

/// Settings with millisecond delays
pub(crate) fn fast_settings() -> ServiceSettings {
    let mut settings = ServiceSettings::default();
    settings.moderation.gate_timeout_ms = 50;
    settings.review.max_attempts = 3;
    settings.review.base_delay_ms = 1;
    settings.review.max_delay_ms = 4;
    settings.notifications.retry_delay_ms = 1;
    settings
}

pub(crate) fn harness() -> Harness {
    harness_with(Fakes::default(), fast_settings())
}

pub(crate) fn harness_with(fakes: Fakes, settings: ServiceSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let ctx = ServiceContext::builder()
        .store(store.clone())
        .spam_rules(fakes.spam.clone())
        .ai_reviewer(fakes.reviewer.clone())
        .payment_verifier(fakes.verifier.clone())
        .sink(sink.clone())
        .settings(settings)
        .build()
        .expect("test context");
    Harness {
        ctx,
        store,
        sink,
        fakes,
    }
}

pub(crate) fn draft() -> RequestDraft {
    RequestDraft {
        car_make: "Toyota".into(),
        car_model: "Camry".into(),
        car_year: 2018,
        part_needed: "Brake pads".into(),
        description: Some("Front set".into()),
        phone: "+234 803 000 0000".into(),
        location: "Lagos".into(),
    }
}
