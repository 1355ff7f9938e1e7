//! Ratings on completed offers

use tracing::{info, instrument};

use market_core::{DomainError, Offer, PartRequest, Rating, Snowflake};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// Rating service
pub struct RatingService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RatingService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// The request's buyer rates the supplier once the deal is completed
    #[instrument(skip(self, comment))]
    pub async fn submit_rating(
        &self,
        offer_id: Snowflake,
        reviewer_id: Snowflake,
        rating: i16,
        comment: Option<String>,
    ) -> ServiceResult<Rating> {
        let (offer, request) = self.load(offer_id).await?;

        if !request.is_owned_by(reviewer_id) {
            return Err(DomainError::NotRequestOwner(request.id).into());
        }
        if !offer.is_completed() {
            let status = if offer.is_accepted() {
                "accepted (not completed)"
            } else {
                offer.status.as_str()
            };
            return Err(DomainError::invalid_state("offer", offer_id, status, "rate").into());
        }

        let rating = Rating::new(self.ctx.generate_id(), offer_id, reviewer_id, rating, comment)?;
        self.ctx.rating_repo().create(&rating).await?;

        info!(offer_id = %offer_id, rating = rating.rating, "Offer rated");
        Ok(rating)
    }

    #[instrument(skip(self))]
    pub async fn list_for_offer(&self, offer_id: Snowflake) -> ServiceResult<Vec<Rating>> {
        self.load(offer_id).await?;
        Ok(self.ctx.rating_repo().find_by_offer(offer_id).await?)
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
