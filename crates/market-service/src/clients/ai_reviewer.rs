use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use market_common::ReviewConfig;
use market_core::{AiReviewer, DomainError, PartRequest, ReviewVerdict, Snowflake};

use super::{build_client, status_error, transport_error};

const SERVICE: &str = "ai reviewer";

#[derive(Debug, Serialize)]
struct ReviewPayload<'a> {
    request_id: Snowflake,
    buyer_id: Snowflake,
    content: String,
    location: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReviewAnswer {
    approved: bool,
}

/// Posts the request text to the review endpoint, expects `{"approved": bool}`
pub struct HttpAiReviewer {
    client: reqwest::Client,
    url: String,
}

impl HttpAiReviewer {
    pub fn new(config: &ReviewConfig) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client(config.request_timeout_ms)?,
            url: config.reviewer_url.clone(),
        })
    }
}

#[async_trait]
impl AiReviewer for HttpAiReviewer {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn evaluate(&self, request: &PartRequest) -> Result<ReviewVerdict, DomainError> {
        let payload = ReviewPayload {
            request_id: request.id,
            buyer_id: request.buyer_id,
            content: request.content(),
            location: &request.location,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(status_error(SERVICE, response.status()));
        }

        let answer: ReviewAnswer = response.json().await.map_err(|e| transport_error(SERVICE, &e))?;
        debug!(approved = answer.approved, "AI review answered");
        Ok(ReviewVerdict {
            approved: answer.approved,
        })
    }
}
