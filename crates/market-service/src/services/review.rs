//! AI review queue
//!
//! Resolves `pending_review` requests off the submission path. The status
//! change is a compare-and-set from `pending_review`, so a request can only
//! be resolved once no matter how many reviews race. An unreachable reviewer
//! never approves anything: the request stays flagged and admins are told.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use market_core::{DomainError, DomainEvent, PartRequest, RequestStatus, Snowflake};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

const MAX_QUEUE_PAGE: i64 = 100;

/// How a review ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    Rejected,
    /// Someone else resolved the request first
    AlreadyResolved { status: RequestStatus },
    /// Reviewer stayed unreachable; the request is still `pending_review`
    Stalled { attempts: u32 },
}

impl ReviewOutcome {
    pub fn approved(&self) -> Option<bool> {
        match self {
            Self::Approved => Some(true),
            Self::Rejected => Some(false),
            Self::AlreadyResolved { status } => match status {
                RequestStatus::PendingReview => None,
                RequestStatus::Rejected => Some(false),
                _ => Some(true),
            },
            Self::Stalled { .. } => None,
        }
    }
}

/// Review backoff: `base * 2^(attempt-1)`, capped, plus up to a quarter of
/// jitter (still capped).
pub(crate) fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
    let capped = exp.min(max_ms);
    let jitter = if capped >= 4 {
        rand::thread_rng().gen_range(0..=capped / 4)
    } else {
        0
    };
    Duration::from_millis((capped + jitter).min(max_ms))
}

/// AI review queue
pub struct ReviewQueue<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReviewQueue<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Review in the background
    pub fn enqueue(&self, request_id: Snowflake) -> JoinHandle<ServiceResult<ReviewOutcome>> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let result = ReviewQueue::new(&ctx).review(request_id).await;
            if let Err(e) = &result {
                error!(request_id = %request_id, error = %e, "Background review failed");
            }
            result
        })
    }

    /// Review one request and apply the verdict
    #[instrument(skip(self))]
    pub async fn review(&self, request_id: Snowflake) -> ServiceResult<ReviewOutcome> {
        let request = self.load(request_id).await?;
        if request.status != RequestStatus::PendingReview {
            return Ok(ReviewOutcome::AlreadyResolved {
                status: request.status,
            });
        }

        let settings = &self.ctx.settings().review;
        let max_attempts = settings.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_error: Option<DomainError> = None;

        // Only an unreachable reviewer is worth asking again
        while attempts < max_attempts {
            attempts += 1;
            match self.ctx.ai_reviewer().evaluate(&request).await {
                Ok(verdict) => return self.apply(&request, verdict.approved).await,
                Err(e) if e.is_unavailable() && attempts < max_attempts => {
                    warn!(attempt = attempts, max_attempts, error = %e, "AI reviewer unavailable, retrying");
                    last_error = Some(e);
                    tokio::time::sleep(backoff_delay(
                        attempts,
                        settings.base_delay_ms,
                        settings.max_delay_ms,
                    ))
                    .await;
                }
                Err(e) => {
                    warn!(attempt = attempts, max_attempts, error = %e, "AI reviewer call failed");
                    last_error = Some(e);
                    break;
                }
            }
        }

        warn!(
            request_id = %request_id,
            attempts,
            last_error = ?last_error.map(|e| e.to_string()),
            "AI review stalled, leaving request for manual review"
        );
        self.ctx.notify(DomainEvent::ReviewStalled {
            request_id,
            attempts,
            admins: self.ctx.policy().admins(),
        });

        Ok(ReviewOutcome::Stalled { attempts })
    }

    /// Admin override with the same transition as the automated review
    #[instrument(skip(self))]
    pub async fn resolve_manually(
        &self,
        admin_id: Snowflake,
        request_id: Snowflake,
        approve: bool,
    ) -> ServiceResult<ReviewOutcome> {
        self.require_admin(admin_id)?;

        let request = self.load(request_id).await?;
        if request.status != RequestStatus::PendingReview {
            return Err(DomainError::invalid_state(
                "request",
                request_id,
                request.status.as_str(),
                "review",
            )
            .into());
        }

        info!(admin_id = %admin_id, approve, "Manual review");
        self.apply(&request, approve).await
    }

    /// The latest `limit` flagged requests, oldest first
    #[instrument(skip(self))]
    pub async fn pending_review(&self, admin_id: Snowflake, limit: i64) -> ServiceResult<Vec<PartRequest>> {
        self.require_admin(admin_id)?;
        let mut requests = self
            .ctx
            .request_repo()
            .find_by_status(RequestStatus::PendingReview, limit.clamp(1, MAX_QUEUE_PAGE))
            .await?;
        requests.reverse();
        Ok(requests)
    }

    /// Admins see a request whatever its status
    #[instrument(skip(self))]
    pub async fn inspect(&self, admin_id: Snowflake, request_id: Snowflake) -> ServiceResult<PartRequest> {
        self.require_admin(admin_id)?;
        self.load(request_id).await
    }

    // === Internals ===

    async fn load(&self, request_id: Snowflake) -> ServiceResult<PartRequest> {
        self.ctx
            .request_repo()
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Request", request_id.to_string()))
    }

    fn require_admin(&self, user_id: Snowflake) -> ServiceResult<()> {
        if self.ctx.policy().is_admin(user_id) {
            Ok(())
        } else {
            Err(ServiceError::forbidden("admin access required"))
        }
    }

    async fn apply(&self, request: &PartRequest, approved: bool) -> ServiceResult<ReviewOutcome> {
        let target = if approved {
            RequestStatus::Pending
        } else {
            RequestStatus::Rejected
        };

        let changed = self
            .ctx
            .request_repo()
            .compare_and_set_status(request.id, RequestStatus::PendingReview, target)
            .await?;

        if !changed {
            let current = self.load(request.id).await?;
            info!(request_id = %request.id, status = %current.status, "Review lost to an earlier resolution");
            return Ok(ReviewOutcome::AlreadyResolved {
                status: current.status,
            });
        }

        info!(request_id = %request.id, approved, "Request reviewed");
        self.ctx.notify(DomainEvent::RequestReviewed {
            request_id: request.id,
            buyer_id: request.buyer_id,
            approved,
        });

        Ok(if approved {
            ReviewOutcome::Approved
        } else {
            ReviewOutcome::Rejected
        })
    }
}
