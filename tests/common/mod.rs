//! In-process stand-in for the remote service, scriptable per test.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trials_cli::api_client::{SearchRequest, TrialService};
use trials_cli::connection_monitor::ConnectionMonitor;
use trials_cli::error::TransportFailure;
use trials_cli::events::ApiEventBus;
use trials_cli::models::{
    ChatResponse, ConversationResponse, ConversationSummary, EvidenceItem, FilterOptionsResponse,
    HealthResponse, SearchResponse, Trial,
};

pub struct FakeTrialService {
    pub events: ApiEventBus,
    health_outcome: Mutex<Result<HealthResponse, TransportFailure>>,
    health_delay: Mutex<Option<Duration>>,
    health_calls: AtomicUsize,
    chat_script: Mutex<VecDeque<Result<ChatResponse, TransportFailure>>>,
    chat_delay: Mutex<Option<Duration>>,
    chat_calls: AtomicUsize,
    chat_requests: Mutex<Vec<(String, Option<String>)>>,
    conversation_outcome: Mutex<Option<Result<ConversationResponse, TransportFailure>>>,
    search_script: Mutex<VecDeque<Result<SearchResponse, TransportFailure>>>,
    search_delay: Mutex<Option<Duration>>,
    search_calls: AtomicUsize,
    search_requests: Mutex<Vec<SearchRequest>>,
    filter_outcome: Mutex<Option<Result<FilterOptionsResponse, TransportFailure>>>,
    filter_calls: AtomicUsize,
}

impl FakeTrialService {
    /// Healthy service with nothing else scripted.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: ApiEventBus::new(),
            health_outcome: Mutex::new(Ok(HealthResponse {
                status: "ok".to_string(),
                message: None,
            })),
            health_delay: Mutex::new(None),
            health_calls: AtomicUsize::new(0),
            chat_script: Mutex::new(VecDeque::new()),
            chat_delay: Mutex::new(None),
            chat_calls: AtomicUsize::new(0),
            chat_requests: Mutex::new(Vec::new()),
            conversation_outcome: Mutex::new(None),
            search_script: Mutex::new(VecDeque::new()),
            search_delay: Mutex::new(None),
            search_calls: AtomicUsize::new(0),
            search_requests: Mutex::new(Vec::new()),
            filter_outcome: Mutex::new(None),
            filter_calls: AtomicUsize::new(0),
        })
    }

    pub fn as_service(self: &Arc<Self>) -> Arc<dyn TrialService> {
        self.clone()
    }

    pub fn set_health_status(&self, status: &str) {
        *self.health_outcome.lock().unwrap() = Ok(HealthResponse {
            status: status.to_string(),
            message: None,
        });
    }

    pub fn set_health_failure(&self, failure: TransportFailure) {
        *self.health_outcome.lock().unwrap() = Err(failure);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        *self.health_delay.lock().unwrap() = Some(delay);
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn push_chat_ok(&self, conversation_id: &str, response: &str, evidence: Vec<EvidenceItem>) {
        self.chat_script.lock().unwrap().push_back(Ok(ChatResponse {
            conversation_id: Some(conversation_id.to_string()),
            response: response.to_string(),
            evidence,
        }));
    }

    pub fn push_chat_failure(&self, failure: TransportFailure) {
        self.chat_script.lock().unwrap().push_back(Err(failure));
    }

    pub fn set_chat_delay(&self, delay: Duration) {
        *self.chat_delay.lock().unwrap() = Some(delay);
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// `(message, conversation_id)` pairs in call order.
    pub fn chat_requests(&self) -> Vec<(String, Option<String>)> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn set_conversation(&self, outcome: Result<ConversationResponse, TransportFailure>) {
        *self.conversation_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn push_search_ok(&self, results: Vec<Trial>, total: u64) {
        self.search_script
            .lock()
            .unwrap()
            .push_back(Ok(SearchResponse {
                results: Some(results),
                total: Some(total),
            }));
    }

    pub fn push_search_response(&self, response: SearchResponse) {
        self.search_script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_search_failure(&self, failure: TransportFailure) {
        self.search_script.lock().unwrap().push_back(Err(failure));
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.lock().unwrap() = Some(delay);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn search_requests(&self) -> Vec<SearchRequest> {
        self.search_requests.lock().unwrap().clone()
    }

    pub fn set_filter_options(&self, outcome: Result<FilterOptionsResponse, TransportFailure>) {
        *self.filter_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrialService for FakeTrialService {
    async fn health_check(&self) -> Result<HealthResponse, TransportFailure> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.health_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.health_outcome.lock().unwrap().clone()
    }

    async fn send_chat(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatResponse, TransportFailure> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_requests
            .lock()
            .unwrap()
            .push((message.to_string(), conversation_id.map(str::to_string)));
        let scripted = self.chat_script.lock().unwrap().pop_front();
        let delay = *self.chat_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        scripted.unwrap_or_else(|| Err(TransportFailure::Setup("chat not scripted".to_string())))
    }

    async fn get_conversation(&self, _id: &str) -> Result<ConversationResponse, TransportFailure> {
        self.conversation_outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| {
                Err(TransportFailure::Setup(
                    "conversation not scripted".to_string(),
                ))
            })
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, TransportFailure> {
        Ok(Vec::new())
    }

    async fn search_trials(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, TransportFailure> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_requests.lock().unwrap().push(request.clone());
        let scripted = self.search_script.lock().unwrap().pop_front();
        let delay = *self.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        scripted.unwrap_or_else(|| Err(TransportFailure::Setup("search not scripted".to_string())))
    }

    async fn get_filter_options(&self) -> Result<FilterOptionsResponse, TransportFailure> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.filter_outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(FilterOptionsResponse::default()))
    }

    async fn get_trial(&self, _id: &str) -> Result<Trial, TransportFailure> {
        Err(TransportFailure::Setup("trial not scripted".to_string()))
    }

    fn events(&self) -> &ApiEventBus {
        &self.events
    }
}

/// Generate `count` placeholder trials.
pub fn trials(count: usize) -> Vec<Trial> {
    (0..count)
        .map(|i| Trial {
            nct_id: format!("NCT{i:07}"),
            title: format!("Trial {i}"),
            principal_investigator: None,
            phase: Some("Phase 2".to_string()),
            gender: Some("ALL".to_string()),
            age_range: None,
            healthy_volunteers: None,
            conditions: None,
            interventions: None,
            source_url: None,
            relevance_score: None,
        })
        .collect()
}

pub fn evidence_item(nct_id: &str) -> EvidenceItem {
    EvidenceItem {
        title: format!("Evidence for {nct_id}"),
        source_url: format!("https://clinicaltrials.gov/study/{nct_id}"),
        nct_id: Some(nct_id.to_string()),
    }
}

/// Poll a condition across cooperative yields, panicking if it never holds.
pub async fn settle<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never reached: {what}");
}

/// A monitor that has already completed one successful check.
pub async fn connected_monitor(fake: &Arc<FakeTrialService>) -> Arc<ConnectionMonitor> {
    let monitor = Arc::new(ConnectionMonitor::new(fake.as_service()));
    assert!(monitor.check_health().await);
    monitor
}
