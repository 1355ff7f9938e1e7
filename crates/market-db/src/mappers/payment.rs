//! Payment <-> model mapper

use market_core::{DomainError, Payment, PaymentStatus, Snowflake};

use crate::models::PaymentModel;

use super::corrupt;

impl TryFrom<PaymentModel> for Payment {
    type Error = DomainError;

    fn try_from(model: PaymentModel) -> Result<Self, Self::Error> {
        let status = match model.status.as_str() {
            "confirmed" => PaymentStatus::Confirmed,
            other => return Err(corrupt("payments.status", other)),
        };

        Ok(Payment {
            id: Snowflake::new(model.id),
            offer_id: Snowflake::new(model.offer_id),
            payer_id: Snowflake::new(model.payer_id),
            reference: model.reference,
            amount: model.amount,
            status,
            created_at: model.created_at,
        })
    }
}
