//! PartRequest <-> model mapper

use market_core::{DomainError, PartRequest, RepoResult, RequestStatus, Snowflake};

use crate::models::{RequestModel, StatusCountModel};

use super::corrupt;

impl TryFrom<RequestModel> for PartRequest {
    type Error = DomainError;

    fn try_from(model: RequestModel) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse::<RequestStatus>()
            .map_err(|_| corrupt("requests.status", &model.status))?;

        Ok(PartRequest {
            id: Snowflake::new(model.id),
            buyer_id: Snowflake::new(model.buyer_id),
            car_make: model.car_make,
            car_model: model.car_model,
            car_year: model.car_year,
            part_needed: model.part_needed,
            description: model.description,
            phone: model.phone,
            location: model.location,
            status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

pub fn request_status_counts(rows: Vec<StatusCountModel>) -> RepoResult<Vec<(RequestStatus, i64)>> {
    rows.into_iter()
        .map(|row| {
            let status = row
                .status
                .parse::<RequestStatus>()
                .map_err(|_| corrupt("requests.status", &row.status))?;
            Ok((status, row.count))
        })
        .collect()
}
