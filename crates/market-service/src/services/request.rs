//! Request submission
//!
//! Validates the draft, runs the anti-spam gate, stores the admitted request
//! and hands flagged ones to the AI review queue without waiting on it.

use chrono::{Datelike, Utc};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use market_core::{DomainError, DomainEvent, ModerationDecision, PartRequest, PhoneNumber, RequestDraft, Snowflake};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::moderation::AntiSpamGate;
use super::review::{ReviewOutcome, ReviewQueue};

pub const MIN_CAR_YEAR: i32 = 1900;

/// Result of an admitted submission
#[derive(Debug)]
pub struct RequestSubmission {
    pub request: PartRequest,
    pub decision: ModerationDecision,
    /// Background AI review, present when the gate flagged the request
    pub review_task: Option<JoinHandle<ServiceResult<ReviewOutcome>>>,
}

/// Request service
pub struct RequestService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RequestService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, draft))]
    pub async fn submit_request(&self, buyer_id: Snowflake, mut draft: RequestDraft) -> ServiceResult<RequestSubmission> {
        validate_draft(&draft)?;
        let phone = PhoneNumber::parse(&draft.phone)?;

        let outcome = AntiSpamGate::new(self.ctx)
            .check(phone.as_str(), buyer_id, &draft.content())
            .await;

        let Some(status) = outcome.initial_status() else {
            let reason = outcome.message.unwrap_or_else(|| "rejected".to_string());
            return Err(if outcome.unavailable {
                DomainError::DependencyUnavailable(reason).into()
            } else {
                DomainError::ModerationBlocked(reason).into()
            });
        };

        draft.phone = phone.into_inner();
        let request = PartRequest::new(self.ctx.generate_id(), buyer_id, draft, status);
        self.ctx.request_repo().create(&request).await?;

        info!(request_id = %request.id, status = %status, "Request admitted");

        self.ctx.notify(DomainEvent::RequestAdmitted {
            request_id: request.id,
            buyer_id,
            status,
        });

        let review_task = outcome
            .requires_review
            .then(|| ReviewQueue::new(self.ctx).enqueue(request.id));

        Ok(RequestSubmission {
            request,
            decision: outcome.decision,
            review_task,
        })
    }
}

fn validate_draft(draft: &RequestDraft) -> ServiceResult<()> {
    for (field, value) in [
        ("car_make", &draft.car_make),
        ("car_model", &draft.car_model),
        ("part_needed", &draft.part_needed),
        ("location", &draft.location),
    ] {
        if value.trim().is_empty() {
            return Err(ServiceError::validation(format!("{field} is required")));
        }
    }

    let max_year = Utc::now().year() + 1;
    if !(MIN_CAR_YEAR..=max_year).contains(&draft.car_year) {
        return Err(ServiceError::validation(format!(
            "car_year must be between {MIN_CAR_YEAR} and {max_year}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::MatchingService;
    use crate::services::notification::RecordingSink;
    use crate::services::test_support::{draft, fast_settings, harness, Fakes};
    use market_core::{RequestStatus, RuleVerdict};
    use market_db::MemoryStore;
    use std::sync::Arc;

    const BUYER: Snowflake = Snowflake::new(10);

    #[tokio::test]
    async fn test_clean_request_is_pending() {
        let h = harness();
        let submission = RequestService::new(&h.ctx).submit_request(BUYER, draft()).await.unwrap();

        assert_eq!(submission.request.status, RequestStatus::Pending);
        assert_eq!(submission.request.phone, "2348030000000");
        assert!(submission.review_task.is_none());
        h.ctx.notifications_settled().await;
        assert_eq!(h.sink.count_of("request_admitted"), 1);
    }

    /// Refuses every notification after a pause
    struct DownGateway;

    #[async_trait::async_trait]
    impl market_core::NotificationSink for DownGateway {
        fn name(&self) -> &'static str {
            "push"
        }

        async fn deliver(&self, _n: &market_core::Notification) -> Result<(), DomainError> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Err(DomainError::DependencyUnavailable("push gateway".into()))
        }
    }

    #[tokio::test]
    async fn test_submission_does_not_wait_for_failing_sink() {
        let fakes = Fakes::default();
        let recording = Arc::new(RecordingSink::new());
        let mut settings = fast_settings();
        settings.notifications.max_attempts = 3;
        settings.notifications.retry_delay_ms = 200;
        let ctx = ServiceContext::builder()
            .store(Arc::new(MemoryStore::new()))
            .spam_rules(fakes.spam.clone())
            .ai_reviewer(fakes.reviewer.clone())
            .payment_verifier(fakes.verifier.clone())
            .sink(Arc::new(DownGateway))
            .sink(recording.clone())
            .settings(settings)
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let submission = RequestService::new(&ctx).submit_request(BUYER, draft()).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(100));
        assert_eq!(submission.request.status, RequestStatus::Pending);
        assert_eq!(ctx.notifier().in_flight(), 1);

        ctx.notifications_settled().await;
        assert_eq!(recording.count_of("request_admitted"), 1);
    }

    #[tokio::test]
    async fn test_flagged_request_is_reviewed_in_background() {
        let h = harness();
        h.fakes.spam.set(Ok(RuleVerdict::Uncertain("velocity".into())));

        let submission = RequestService::new(&h.ctx).submit_request(BUYER, draft()).await.unwrap();
        assert_eq!(submission.request.status, RequestStatus::PendingReview);

        let outcome = submission.review_task.unwrap().await.unwrap().unwrap();
        assert_eq!(outcome, ReviewOutcome::Approved);
        let stored = h.ctx.request_repo().find_by_id(submission.request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_flagged_then_rejected_refuses_offers() {
        let h = harness();
        h.fakes.spam.set(Ok(RuleVerdict::Uncertain("duplicate".into())));
        h.fakes.reviewer.always(Ok(false));

        let submission = RequestService::new(&h.ctx).submit_request(BUYER, draft()).await.unwrap();
        let outcome = submission.review_task.unwrap().await.unwrap().unwrap();
        assert_eq!(outcome, ReviewOutcome::Rejected);

        let err = MatchingService::new(&h.ctx)
            .submit_offer(submission.request.id, Snowflake::new(20), 100, String::new(), 0)
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[tokio::test]
    async fn test_blocked_request_is_not_stored() {
        let h = harness();
        h.fakes.spam.set(Ok(RuleVerdict::Reject("phone velocity".into())));

        let err = RequestService::new(&h.ctx).submit_request(BUYER, draft()).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::ModerationBlocked(_))));
        assert_eq!(err.status_code(), 422);
        assert!(h.ctx.request_repo().find_by_buyer(BUYER).await.unwrap().is_empty());
        h.ctx.notifications_settled().await;
        assert_eq!(h.sink.count_of("request_admitted"), 0);
    }

    #[tokio::test]
    async fn test_gate_outage_is_unavailable() {
        let h = harness();
        h.fakes.spam.set(Err(DomainError::DependencyUnavailable("redis".into())));

        let err = RequestService::new(&h.ctx).submit_request(BUYER, draft()).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.status_code(), 503);
        assert!(h.ctx.request_repo().find_by_buyer(BUYER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_validation() {
        let h = harness();
        let service = RequestService::new(&h.ctx);

        let mut bad_phone = draft();
        bad_phone.phone = "12".into();
        assert!(service.submit_request(BUYER, bad_phone).await.unwrap_err().is_validation());

        let mut bad_year = draft();
        bad_year.car_year = 1850;
        assert!(service.submit_request(BUYER, bad_year).await.unwrap_err().is_validation());

        let mut blank = draft();
        blank.part_needed = "  ".into();
        assert!(service.submit_request(BUYER, blank).await.unwrap_err().is_validation());
    }
}
