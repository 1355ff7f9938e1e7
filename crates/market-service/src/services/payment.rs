//! Contact-unlock payments
//!
//! A payment is recorded only after the verifier confirms it. A negative
//! answer and an unreachable verifier are different errors: the first is
//! final, the second can be retried.

use tracing::{info, instrument, warn};

use market_core::{DomainError, DomainEvent, Offer, PartRequest, Payment, Snowflake};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Payment service
pub struct PaymentService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PaymentService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, reference))]
    pub async fn confirm_payment(
        &self,
        offer_id: Snowflake,
        payer_id: Snowflake,
        reference: &str,
        amount: i64,
    ) -> ServiceResult<Payment> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ServiceError::validation("reference is required"));
        }

        let (offer, request) = self.load(offer_id).await?;
        if !request.is_owned_by(payer_id) {
            return Err(DomainError::NotRequestOwner(request.id).into());
        }
        if !offer.is_accepted() {
            return Err(DomainError::invalid_state("offer", offer_id, offer.status.as_str(), "pay for").into());
        }
        if amount != offer.contact_unlock_fee {
            return Err(ServiceError::validation(format!(
                "amount must equal the contact unlock fee ({})",
                offer.contact_unlock_fee
            )));
        }

        let already = self
            .ctx
            .payment_repo()
            .find_by_offer(offer_id)
            .await?
            .into_iter()
            .any(|p| p.reference == reference);
        if already {
            return Err(DomainError::PaymentAlreadyRecorded(reference.to_string()).into());
        }

        if !self.ctx.payment_verifier().verify(reference, amount).await? {
            warn!(offer_id = %offer_id, "Payment verifier declined reference");
            return Err(DomainError::PaymentRejected(format!("reference {reference} was not confirmed")).into());
        }

        let payment = Payment::confirmed(
            self.ctx.generate_id(),
            offer_id,
            payer_id,
            reference.to_string(),
            amount,
        );
        self.ctx.payment_repo().create(&payment).await?;

        info!(payment_id = %payment.id, offer_id = %offer_id, amount, "Payment confirmed");

        self.ctx.notify(DomainEvent::PaymentConfirmed {
            payment_id: payment.id,
            offer_id,
            payer_id,
            supplier_id: offer.supplier_id,
            amount,
        });

        Ok(payment)
    }

    /// Visible to the buyer and the supplier of the offer
    #[instrument(skip(self))]
    pub async fn list_for_offer(&self, offer_id: Snowflake, viewer_id: Snowflake) -> ServiceResult<Vec<Payment>> {
        let (offer, request) = self.load(offer_id).await?;
        if !request.is_owned_by(viewer_id) && offer.supplier_id != viewer_id {
            return Err(ServiceError::forbidden("not a party to this offer"));
        }
        Ok(self.ctx.payment_repo().find_by_offer(offer_id).await?)
    }

    async fn load(&self, offer_id: Snowflake) -> ServiceResult<(Offer, PartRequest)> {
        let offer = self
            .ctx
            .offer_repo()
            .find_by_id(offer_id)
            .await?
            .ok_or(DomainError::OfferNotFound(offer_id))?;
        let request = self
            .ctx
            .request_repo()
            .find_by_id(offer.request_id)
            .await?
            .ok_or(DomainError::RequestNotFound(offer.request_id))?;
        Ok((offer, request))
    }
}
