//! Rating <-> model mapper

use market_core::{DomainError, Rating, Snowflake};

use crate::models::RatingModel;

impl TryFrom<RatingModel> for Rating {
    type Error = DomainError;

    fn try_from(model: RatingModel) -> Result<Self, Self::Error> {
        Ok(Rating {
            id: Snowflake::new(model.id),
            offer_id: Snowflake::new(model.offer_id),
            reviewer_id: Snowflake::new(model.reviewer_id),
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at,
        })
    }
}
