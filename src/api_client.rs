use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::credentials;
use crate::error::TransportFailure;
use crate::events::{ApiEvent, ApiEventBus};
use crate::models::{
    ChatResponse, ConversationResponse, ConversationSummary, FilterOptionsResponse,
    HealthResponse, SearchResponse, Trial,
};

/// Hard deadline for every outgoing request. A timeout is reported as
/// `TransportFailure::NoResponse`, same as a dropped connection.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a health result stays valid: successes are trusted longer than
/// failures so a flapping service gets re-probed sooner.
const HEALTH_OK_TTL: Duration = Duration::from_millis(30_000);
const HEALTH_ERROR_TTL: Duration = Duration::from_millis(15_000);

/// Parameters for one catalog search call. Empty filter strings mean
/// "unconstrained" and are omitted from the request entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub phase: String,
    pub gender: String,
    pub healthy_volunteers: String,
    pub status: String,
    pub page: u32,
    pub limit: u32,
}

impl SearchRequest {
    /// Query-string pairs for the search endpoint, skipping unset filters.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", self.query.clone())];
        for (name, value) in [
            ("phase", &self.phase),
            ("gender", &self.gender),
            ("healthy_volunteers", &self.healthy_volunteers),
            ("status", &self.status),
        ] {
            if !value.is_empty() {
                params.push((name, value.clone()));
            }
        }
        params.push(("page", self.page.to_string()));
        params.push(("limit", self.limit.to_string()));
        params
    }
}

/// The remote service operations the state managers consume.
///
/// `TrialsApiClient` is the production implementation; tests substitute an
/// in-process fake so manager behavior can be exercised without a server.
#[async_trait]
pub trait TrialService: Send + Sync {
    async fn health_check(&self) -> Result<HealthResponse, TransportFailure>;
    async fn send_chat(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatResponse, TransportFailure>;
    async fn get_conversation(&self, id: &str) -> Result<ConversationResponse, TransportFailure>;
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, TransportFailure>;
    async fn search_trials(&self, request: &SearchRequest)
        -> Result<SearchResponse, TransportFailure>;
    async fn get_filter_options(&self) -> Result<FilterOptionsResponse, TransportFailure>;
    async fn get_trial(&self, id: &str) -> Result<Trial, TransportFailure>;

    /// Notification channel for failures other components observe.
    fn events(&self) -> &ApiEventBus;
}

struct HealthCacheEntry {
    outcome: Result<HealthResponse, TransportFailure>,
    stored_at: Instant,
}

/// Cache for the health operation, scoped to one client instance so separate
/// clients (and tests) never share cached state.
pub struct HealthCache {
    ok_ttl: Duration,
    error_ttl: Duration,
    entry: Mutex<Option<HealthCacheEntry>>,
}

impl HealthCache {
    pub fn new() -> Self {
        Self::with_ttls(HEALTH_OK_TTL, HEALTH_ERROR_TTL)
    }

    /// Cache with non-default result lifetimes.
    pub fn with_ttls(ok_ttl: Duration, error_ttl: Duration) -> Self {
        Self {
            ok_ttl,
            error_ttl,
            entry: Mutex::new(None),
        }
    }

    fn ttl_for(&self, outcome: &Result<HealthResponse, TransportFailure>) -> Duration {
        if outcome.is_ok() {
            self.ok_ttl
        } else {
            self.error_ttl
        }
    }

    /// Returns the cached outcome if it is still within its TTL.
    pub fn lookup(&self) -> Option<Result<HealthResponse, TransportFailure>> {
        let entry = self.entry.lock().unwrap();
        entry
            .as_ref()
            .filter(|e| e.stored_at.elapsed() < self.ttl_for(&e.outcome))
            .map(|e| e.outcome.clone())
    }

    pub fn store(&self, outcome: Result<HealthResponse, TransportFailure>) {
        let mut entry = self.entry.lock().unwrap();
        *entry = Some(HealthCacheEntry {
            outcome,
            stored_at: Instant::now(),
        });
    }
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for the clinical trials service.
///
/// Normalizes all request failures into `TransportFailure` and broadcasts
/// unauthorized / network / server failures on its event bus.
pub struct TrialsApiClient {
    base_url: String,
    user_id: String,
    http: reqwest::Client,
    bearer_token: Option<String>,
    events: ApiEventBus,
    health_cache: HealthCache,
}

impl TrialsApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: "anonymous".to_string(),
            http,
            bearer_token: None,
            events: ApiEventBus::new(),
            health_cache: HealthCache::new(),
        })
    }

    /// Build a client from the app config, picking up the stored bearer
    /// token if one exists. A missing token is not an error; requests just
    /// go out unauthenticated.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.service.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.service.base_url.trim_end_matches('/').to_string(),
            user_id: config.service.user_id.clone(),
            http,
            bearer_token: credentials::load_token(),
            events: ApiEventBus::new(),
            health_cache: HealthCache::new(),
        })
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    /// Replace the default health-result lifetimes. Useful where waiting out
    /// the real TTLs is not an option.
    pub fn with_health_ttls(mut self, ok_ttl: Duration, error_ttl: Duration) -> Self {
        self.health_cache = HealthCache::with_ttls(ok_ttl, error_ttl);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Classify a failure on the notification channel. Only the classes
    /// other components react to are broadcast.
    fn broadcast_failure(&self, failure: &TransportFailure) {
        match failure {
            TransportFailure::Http { status: 401, .. } => {
                self.events.emit(ApiEvent::Unauthorized);
            }
            TransportFailure::Http { status, .. } if *status >= 500 => {
                self.events.emit(ApiEvent::ServerError(*status));
            }
            TransportFailure::NoResponse => {
                self.events.emit(ApiEvent::NetworkError);
            }
            _ => {}
        }
    }

    /// Send a request and normalize the outcome. Non-success statuses become
    /// `TransportFailure::Http` with the response body attached.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportFailure> {
        let response = match self.authorize(request).send().await {
            Ok(response) => response,
            Err(err) => {
                let failure = TransportFailure::from_reqwest(err);
                warn!(target: "api", "request failed: {}", failure);
                self.broadcast_failure(&failure);
                return Err(failure);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = TransportFailure::Http {
                status: status.as_u16(),
                body,
            };
            warn!(target: "api", "request rejected: {}", failure);
            self.broadcast_failure(&failure);
            return Err(failure);
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, TransportFailure> {
        response
            .json::<T>()
            .await
            .map_err(|err| TransportFailure::Setup(format!("invalid response body: {err}")))
    }
}

#[async_trait]
impl TrialService for TrialsApiClient {
    /// Health probe with result caching: a valid cached outcome is replayed
    /// without touching the network, including cached failures.
    async fn health_check(&self) -> Result<HealthResponse, TransportFailure> {
        if let Some(cached) = self.health_cache.lookup() {
            debug!(target: "api", "health check served from cache");
            return cached;
        }

        let outcome = match self.execute(self.http.get(self.url("/api/health"))).await {
            Ok(response) => self.decode::<HealthResponse>(response).await,
            Err(failure) => Err(failure),
        };
        self.health_cache.store(outcome.clone());
        outcome
    }

    async fn send_chat(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatResponse, TransportFailure> {
        let body = serde_json::json!({
            "message": message,
            "conversation_id": conversation_id,
            "user_id": self.user_id,
        });
        let response = self
            .execute(self.http.post(self.url("/api/chat")).json(&body))
            .await?;
        self.decode(response).await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationResponse, TransportFailure> {
        let response = self
            .execute(self.http.get(self.url(&format!("/api/conversations/{id}"))))
            .await?;
        self.decode(response).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, TransportFailure> {
        let response = self
            .execute(self.http.get(self.url("/api/conversations")))
            .await?;
        self.decode(response).await
    }

    async fn search_trials(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, TransportFailure> {
        let response = self
            .execute(
                self.http
                    .get(self.url("/api/trials/search"))
                    .query(&request.to_params()),
            )
            .await?;
        self.decode(response).await
    }

    async fn get_filter_options(&self) -> Result<FilterOptionsResponse, TransportFailure> {
        let response = self
            .execute(self.http.get(self.url("/api/trials/filters")))
            .await?;
        self.decode(response).await
    }

    async fn get_trial(&self, id: &str) -> Result<Trial, TransportFailure> {
        let response = self
            .execute(self.http.get(self.url(&format!("/api/trials/{id}"))))
            .await?;
        self.decode(response).await
    }

    fn events(&self) -> &ApiEventBus {
        &self.events
    }
}
