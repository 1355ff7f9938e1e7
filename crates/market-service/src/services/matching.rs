//! Matching engine
//!
//! Owns every request and offer transition after admission. Acceptance is
//! the one multi-row change and runs as a single repository transaction,
//! guarded by a compare-and-set on the request's `pending` status.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use market_core::{
    DomainError, DomainEvent, Offer, OfferAcceptance, PartRequest, RequestStatus, Snowflake,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

const MAX_OPEN_PAGE: i64 = 100;

/// Rows moved to `expired` by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    pub requests: u64,
    pub offers: u64,
}

/// Matching engine
pub struct MatchingService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MatchingService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    // === Offers ===

    /// Submit a priced offer against a `pending` request
    #[instrument(skip(self, message))]
    pub async fn submit_offer(
        &self,
        request_id: Snowflake,
        supplier_id: Snowflake,
        price: i64,
        message: String,
        contact_unlock_fee: i64,
    ) -> ServiceResult<Offer> {
        if price <= 0 {
            return Err(ServiceError::validation("price must be positive"));
        }
        if contact_unlock_fee < 0 {
            return Err(ServiceError::validation("contact_unlock_fee cannot be negative"));
        }

        let request = self.load_request(request_id).await?;
        if !request.accepts_offers() {
            return Err(DomainError::invalid_state(
                "request",
                request_id,
                request.status.as_str(),
                "submit offer on",
            )
            .into());
        }
        if request.is_owned_by(supplier_id) {
            return Err(ServiceError::validation("cannot offer on your own request"));
        }

        let offer = Offer::new(
            self.ctx.generate_id(),
            request_id,
            supplier_id,
            price,
            message,
            contact_unlock_fee,
        );
        self.ctx.offer_repo().create(&offer).await?;

        info!(offer_id = %offer.id, request_id = %request_id, price, "Offer submitted");

        self.ctx.notify(DomainEvent::OfferSubmitted {
            offer_id: offer.id,
            request_id,
            buyer_id: request.buyer_id,
            supplier_id,
            price,
        });

        Ok(offer)
    }

    /// Accept one offer; siblings are rejected and the request is matched
    #[instrument(skip(self))]
    pub async fn accept_offer(
        &self,
        offer_id: Snowflake,
        buyer_id: Snowflake,
    ) -> ServiceResult<OfferAcceptance> {
        let offer = self.load_offer(offer_id).await?;
        let request = self.load_request(offer.request_id).await?;

        if !request.is_owned_by(buyer_id) {
            return Err(DomainError::NotRequestOwner(request.id).into());
        }
        if request.status != RequestStatus::Pending {
            return Err(DomainError::invalid_state(
                "request",
                request.id,
                request.status.as_str(),
                "accept offer on",
            )
            .into());
        }
        if !offer.is_pending() {
            return Err(DomainError::invalid_state("offer", offer.id, offer.status.as_str(), "accept").into());
        }

        let acceptance = self
            .ctx
            .offer_repo()
            .accept(offer_id, request.id)
            .await?
            .ok_or_else(|| {
                ServiceError::conflict(format!("request {} was matched concurrently", request.id))
            })?;

        info!(
            offer_id = %offer_id,
            request_id = %request.id,
            rejected = acceptance.rejected.len(),
            "Offer accepted"
        );

        let mut rejected_suppliers: Vec<Snowflake> = acceptance
            .rejected
            .iter()
            .map(|o| o.supplier_id)
            .filter(|s| *s != acceptance.offer.supplier_id)
            .collect();
        rejected_suppliers.sort_unstable();
        rejected_suppliers.dedup();

        self.ctx.notify(DomainEvent::OfferAccepted {
            offer_id,
            request_id: request.id,
            buyer_id,
            supplier_id: acceptance.offer.supplier_id,
            rejected_suppliers,
        });

        Ok(acceptance)
    }

    // === Requests ===

    /// `matched -> completed`, stamping the accepted offer
    #[instrument(skip(self))]
    pub async fn complete_request(
        &self,
        request_id: Snowflake,
        buyer_id: Snowflake,
    ) -> ServiceResult<PartRequest> {
        let request = self.load_request(request_id).await?;
        if !request.is_owned_by(buyer_id) {
            return Err(DomainError::NotRequestOwner(request_id).into());
        }
        if request.status != RequestStatus::Matched {
            return Err(DomainError::invalid_state(
                "request",
                request_id,
                request.status.as_str(),
                "complete",
            )
            .into());
        }

        if !self.ctx.request_repo().complete(request_id, Utc::now()).await? {
            let current = self.load_request(request_id).await?;
            return Err(DomainError::invalid_state(
                "request",
                request_id,
                current.status.as_str(),
                "complete",
            )
            .into());
        }

        let accepted = self
            .ctx
            .offer_repo()
            .find_by_request(request_id)
            .await?
            .into_iter()
            .find(Offer::is_accepted)
            .ok_or_else(|| ServiceError::internal(format!("matched request {request_id} has no accepted offer")))?;

        info!(request_id = %request_id, offer_id = %accepted.id, "Request completed");

        self.ctx.notify(DomainEvent::RequestCompleted {
            request_id,
            buyer_id,
            supplier_id: accepted.supplier_id,
        });

        self.load_request(request_id).await
    }

    /// Expire stale `pending` requests and offers as of `now`
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> ServiceResult<ExpiryReport> {
        let matching = &self.ctx.settings().matching;
        let request_cutoff = now - Duration::hours(matching.request_ttl_hours);
        let offer_cutoff = now - Duration::hours(matching.offer_ttl_hours);

        let report = ExpiryReport {
            requests: self.ctx.request_repo().expire_pending(request_cutoff).await?,
            offers: self.ctx.offer_repo().expire_pending(offer_cutoff).await?,
        };

        if report.requests > 0 || report.offers > 0 {
            info!(requests = report.requests, offers = report.offers, "Expired stale rows");
        }
        Ok(report)
    }

    // === Reads ===

    /// Open requests are public; anything else only to its buyer and the
    /// suppliers who offered on it.
    #[instrument(skip(self))]
    pub async fn get_request(&self, request_id: Snowflake, viewer_id: Snowflake) -> ServiceResult<PartRequest> {
        let request = self.load_request(request_id).await?;
        if request.is_owned_by(viewer_id) || request.status == RequestStatus::Pending {
            return Ok(request);
        }

        let offered = self
            .ctx
            .offer_repo()
            .find_by_request(request_id)
            .await?
            .iter()
            .any(|o| o.supplier_id == viewer_id);
        if offered {
            Ok(request)
        } else {
            Err(ServiceError::not_found("Request", request_id.to_string()))
        }
    }

    #[instrument(skip(self))]
    pub async fn list_requests_for_buyer(&self, buyer_id: Snowflake) -> ServiceResult<Vec<PartRequest>> {
        Ok(self.ctx.request_repo().find_by_buyer(buyer_id).await?)
    }

    /// Requests sellers can currently offer on, newest first
    #[instrument(skip(self))]
    pub async fn list_open_requests(&self, limit: i64) -> ServiceResult<Vec<PartRequest>> {
        Ok(self
            .ctx
            .request_repo()
            .find_by_status(RequestStatus::Pending, limit.clamp(1, MAX_OPEN_PAGE))
            .await?)
    }

    /// The buyer sees every offer, a supplier only their own
    #[instrument(skip(self))]
    pub async fn list_offers_for_request(
        &self,
        request_id: Snowflake,
        viewer_id: Snowflake,
    ) -> ServiceResult<Vec<Offer>> {
        let request = self.load_request(request_id).await?;
        let offers = self.ctx.offer_repo().find_by_request(request_id).await?;
        if request.is_owned_by(viewer_id) {
            Ok(offers)
        } else {
            Ok(offers.into_iter().filter(|o| o.supplier_id == viewer_id).collect())
        }
    }

    #[instrument(skip(self))]
    pub async fn list_offers_for_supplier(&self, supplier_id: Snowflake) -> ServiceResult<Vec<Offer>> {
        Ok(self.ctx.offer_repo().find_by_supplier(supplier_id).await?)
    }

    // === Internals ===

    async fn load_request(&self, request_id: Snowflake) -> ServiceResult<PartRequest> {
        self.ctx
            .request_repo()
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| DomainError::RequestNotFound(request_id).into())
    }

    async fn load_offer(&self, offer_id: Snowflake) -> ServiceResult<Offer> {
        self.ctx
            .offer_repo()
            .find_by_id(offer_id)
            .await?
            .ok_or_else(|| DomainError::OfferNotFound(offer_id).into())
    }
}
