//! Offer <-> model mapper

use market_core::{DomainError, Offer, OfferStatus, RepoResult, Snowflake};

use crate::models::{OfferModel, StatusCountModel};

use super::corrupt;

impl TryFrom<OfferModel> for Offer {
    type Error = DomainError;

    fn try_from(model: OfferModel) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse::<OfferStatus>()
            .map_err(|_| corrupt("offers.status", &model.status))?;

        Ok(Offer {
            id: Snowflake::new(model.id),
            request_id: Snowflake::new(model.request_id),
            supplier_id: Snowflake::new(model.supplier_id),
            price: model.price,
            message: model.message,
            contact_unlock_fee: model.contact_unlock_fee,
            status,
            created_at: model.created_at,
            completed_at: model.completed_at,
        })
    }
}

pub fn offer_status_counts(rows: Vec<StatusCountModel>) -> RepoResult<Vec<(OfferStatus, i64)>> {
    rows.into_iter()
        .map(|row| {
            let status = row
                .status
                .parse::<OfferStatus>()
                .map_err(|_| corrupt("offers.status", &row.status))?;
            Ok((status, row.count))
        })
        .collect()
}
