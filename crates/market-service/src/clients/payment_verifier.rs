use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use market_common::PaymentsConfig;
use market_core::{DomainError, PaymentVerifier};

use super::{build_client, status_error, transport_error};

const SERVICE: &str = "payment verifier";

#[derive(Debug, Serialize)]
struct VerifyPayload<'a> {
    reference: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct VerifyAnswer {
    verified: bool,
}

/// Asks the payment provider whether `reference` paid `amount`.
/// An unknown reference (404) is a plain "no".
pub struct HttpPaymentVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpPaymentVerifier {
    pub fn new(config: &PaymentsConfig) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client(config.request_timeout_ms)?,
            url: config.verifier_url.clone(),
        })
    }
}

#[async_trait]
impl PaymentVerifier for HttpPaymentVerifier {
    #[instrument(skip(self, reference))]
    async fn verify(&self, reference: &str, expected_amount: i64) -> Result<bool, DomainError> {
        let response = self
            .client
            .post(&self.url)
            .json(&VerifyPayload {
                reference,
                amount: expected_amount,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(false),
            status if !status.is_success() => return Err(status_error(SERVICE, status)),
            _ => {}
        }

        let answer: VerifyAnswer = response.json().await.map_err(|e| transport_error(SERVICE, &e))?;
        debug!(verified = answer.verified, "Payment verifier answered");
        Ok(answer.verified)
    }
}
