//! HTTP clients for the external collaborators

mod ai_reviewer;
mod payment_verifier;

pub use ai_reviewer::HttpAiReviewer;
pub use payment_verifier::HttpPaymentVerifier;

use std::time::Duration;

use market_core::DomainError;
use reqwest::StatusCode;

fn build_client(timeout_ms: u64) -> Result<reqwest::Client, DomainError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| DomainError::InternalError(format!("http client: {e}")))
}

/// Transport failures mean nobody answered
fn transport_error(service: &str, err: &reqwest::Error) -> DomainError {
    if err.is_decode() {
        DomainError::InternalError(format!("{service} returned an unreadable body: {err}"))
    } else {
        DomainError::DependencyUnavailable(format!("{service}: {err}"))
    }
}

fn status_error(service: &str, status: StatusCode) -> DomainError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        DomainError::DependencyUnavailable(format!("{service} answered {status}"))
    } else {
        DomainError::InternalError(format!("{service} refused the call: {status}"))
    }
}
