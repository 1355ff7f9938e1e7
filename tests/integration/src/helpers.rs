//! Test helpers and utilities

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use market_api::{create_app, AppState, Probes};
use market_common::{Claims, JwtConfig, JwtVerifier};
use market_db::MemoryStore;
use market_service::services::RecordingSink;
use market_service::{ServiceContext, ServiceSettings};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpListener;

use crate::fakes::{ScriptedReviewer, ScriptedSpamRules, ScriptedVerifier};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-which-is-long-enough";

/// Admin configured in every test server
pub const ADMIN_ID: i64 = 900_000_001;

/// Phone on the blocklist of every test server
pub const BLOCKED_PHONE: &str = "+1 555 000 0000";

/// Collaborators a test can re-script while the server runs
#[derive(Clone, Default)]
pub struct Collaborators {
    pub spam: Arc<ScriptedSpamRules>,
    pub reviewer: Arc<ScriptedReviewer>,
    pub verifier: Arc<ScriptedVerifier>,
}

/// Settings with millisecond delays
pub fn test_settings() -> ServiceSettings {
    let mut settings = ServiceSettings::default();
    settings.moderation.gate_timeout_ms = 200;
    settings.moderation.admins = vec![ADMIN_ID];
    settings.moderation.blocked_phones = vec![BLOCKED_PHONE.to_string()];
    settings.review.max_attempts = 3;
    settings.review.base_delay_ms = 1;
    settings.review.max_delay_ms = 4;
    settings.notifications.retry_delay_ms = 1;
    settings
}

/// Build a service context over a fresh in-process store
pub fn build_context(collaborators: &Collaborators, sink: Arc<RecordingSink>) -> Result<(ServiceContext, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let ctx = ServiceContext::builder()
        .store(store.clone())
        .spam_rules(collaborators.spam.clone())
        .ai_reviewer(collaborators.reviewer.clone())
        .payment_verifier(collaborators.verifier.clone())
        .sink(sink)
        .settings(test_settings())
        .build()
        .context("building service context")?;
    Ok((ctx, store))
}

/// Sign a token the test server accepts
pub fn token_for(user_id: i64) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap_or_default()
}

/// The API served on an ephemeral local port
pub struct TestServer {
    pub client: Client,
    pub base_url: String,
    pub collaborators: Collaborators,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryStore>,
    ctx: ServiceContext,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let collaborators = Collaborators::default();
        let sink = Arc::new(RecordingSink::new());
        let (ctx, store) = build_context(&collaborators, sink.clone())?;

        let verifier = JwtVerifier::new(&JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            issuer: None,
            leeway_secs: 0,
        });
        let app = create_app(AppState::new(ctx.clone(), verifier, Probes::default()));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            collaborators,
            sink,
            store,
            ctx,
        })
    }

    /// Wait until notifications from earlier calls have reached the sink
    pub async fn settle(&self) {
        self.ctx.notifications_settled().await;
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).send().await?)
    }

    /// Make an authenticated GET request
    pub async fn get_as(&self, user_id: i64, path: &str) -> Result<Response> {
        Ok(self
            .client
            .get(self.url(path))
            .bearer_auth(token_for(user_id))
            .send()
            .await?)
    }

    /// Make an authenticated POST request with a JSON body
    pub async fn post_as(&self, user_id: i64, path: &str, body: &Value) -> Result<Response> {
        Ok(self
            .client
            .post(self.url(path))
            .bearer_auth(token_for(user_id))
            .json(body)
            .send()
            .await?)
    }

    /// Make an authenticated POST request without a body
    pub async fn post_empty_as(&self, user_id: i64, path: &str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url(path))
            .bearer_auth(token_for(user_id))
            .send()
            .await?)
    }
}

/// Assert the status and decode the body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected: StatusCode) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    anyhow::ensure!(
        status == expected,
        "expected status {expected}, got {status}: {body}"
    );
    Ok(serde_json::from_str(&body).with_context(|| format!("decoding {body}"))?)
}

/// Assert an error response and return its code
pub async fn assert_error(response: Response, expected: StatusCode) -> Result<String> {
    let body: Value = assert_json(response, expected).await?;
    Ok(body["error"]["code"].as_str().unwrap_or_default().to_string())
}
