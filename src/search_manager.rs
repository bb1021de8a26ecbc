use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::api_client::{SearchRequest, TrialService};
use crate::connection_monitor::ConnectionMonitor;
use crate::models::{FilterOptionsResponse, Trial};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// The four catalog filters. Empty string means unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub phase: String,
    pub gender: String,
    pub healthy_volunteers: String,
    pub status: String,
}

/// Names the filter being updated, so callers cannot misspell a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Phase,
    Gender,
    HealthyVolunteers,
    Status,
}

impl FilterField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "phase" => Some(FilterField::Phase),
            "gender" => Some(FilterField::Gender),
            "healthy_volunteers" => Some(FilterField::HealthyVolunteers),
            "status" => Some(FilterField::Status),
            _ => None,
        }
    }
}

/// Selectable values per filter. Genders and the healthy-volunteers flag are
/// fixed enumerations; phases and statuses come from the service.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub phases: Vec<String>,
    pub statuses: Vec<String>,
    pub genders: Vec<String>,
    pub healthy_volunteers: Vec<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            phases: Vec::new(),
            statuses: Vec::new(),
            genders: vec!["ALL".to_string(), "MALE".to_string(), "FEMALE".to_string()],
            healthy_volunteers: vec!["yes".to_string(), "no".to_string()],
            extra: HashMap::new(),
        }
    }
}

impl FilterOptions {
    /// Fetched phases/statuses override whatever was held before; unknown
    /// keys from the response are merged in verbatim.
    fn merge(&mut self, fetched: FilterOptionsResponse) {
        self.phases = fetched.phases;
        self.statuses = fetched.statuses;
        self.extra.extend(fetched.extra);
    }
}

#[derive(Debug)]
struct SearchState {
    query: String,
    filters: SearchFilters,
    available: FilterOptions,
    results: Vec<Trial>,
    total_results: u64,
    page: u32,
    page_size: u32,
    has_more: bool,
    is_loading: bool,
    options_loaded: bool,
    error: Option<String>,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: SearchFilters::default(),
            available: FilterOptions::default(),
            results: Vec::new(),
            total_results: 0,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            has_more: false,
            is_loading: false,
            options_loaded: false,
            error: None,
        }
    }
}

/// Catalog search with page accumulation.
///
/// Page 1 replaces the result list; later pages append to it. `has_more` is
/// inferred from "last page returned at least page_size items", which is an
/// approximation: a full final page looks the same as a partial run.
pub struct SearchManager {
    service: Arc<dyn TrialService>,
    monitor: Arc<ConnectionMonitor>,
    state: Mutex<SearchState>,
}

impl SearchManager {
    pub fn new(service: Arc<dyn TrialService>, monitor: Arc<ConnectionMonitor>) -> Self {
        Self {
            service,
            monitor,
            state: Mutex::new(SearchState::default()),
        }
    }

    pub fn query(&self) -> String {
        self.state.lock().unwrap().query.clone()
    }

    pub fn filters(&self) -> SearchFilters {
        self.state.lock().unwrap().filters.clone()
    }

    pub fn available_filters(&self) -> FilterOptions {
        self.state.lock().unwrap().available.clone()
    }

    pub fn results(&self) -> Vec<Trial> {
        self.state.lock().unwrap().results.clone()
    }

    pub fn total_results(&self) -> u64 {
        self.state.lock().unwrap().total_results
    }

    pub fn page(&self) -> u32 {
        self.state.lock().unwrap().page
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().unwrap().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().is_loading
    }

    /// True once filter options have been fetched successfully, so callers
    /// know whether a backfill is still pending.
    pub fn filter_options_loaded(&self) -> bool {
        self.state.lock().unwrap().options_loaded
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Set one filter field and reset pagination. Does not trigger a search;
    /// the next page-1 search picks the new constraint up.
    pub fn update_filter(&self, field: FilterField, value: &str) {
        let mut state = self.state.lock().unwrap();
        match field {
            FilterField::Phase => state.filters.phase = value.to_string(),
            FilterField::Gender => state.filters.gender = value.to_string(),
            FilterField::HealthyVolunteers => {
                state.filters.healthy_volunteers = value.to_string()
            }
            FilterField::Status => state.filters.status = value.to_string(),
        }
        state.page = 1;
    }

    /// Restore all filters to unconstrained and reset pagination.
    pub fn reset_filters(&self) {
        let mut state = self.state.lock().unwrap();
        state.filters = SearchFilters::default();
        state.page = 1;
    }

    /// Run a catalog search. A non-None `query` becomes the active query;
    /// otherwise the held one is reused. Page 1 replaces accumulated results,
    /// higher pages append. Failures clear the result set and set `error`.
    pub async fn search(&self, query: Option<&str>, page: u32, page_size: u32) {
        let request = {
            let mut state = self.state.lock().unwrap();
            if let Some(query) = query {
                state.query = query.to_string();
            }
            if state.query.trim().is_empty() {
                return;
            }
            if !self.monitor.is_connected() {
                debug!(target: "search", "not connected, refusing to search");
                return;
            }
            state.is_loading = true;
            state.error = None;
            SearchRequest {
                query: state.query.trim().to_string(),
                phase: state.filters.phase.clone(),
                gender: state.filters.gender.clone(),
                healthy_volunteers: state.filters.healthy_volunteers.clone(),
                status: state.filters.status.clone(),
                page,
                limit: page_size,
            }
        };

        let outcome = self.service.search_trials(&request).await;

        let mut state = self.state.lock().unwrap();
        state.is_loading = false;
        match outcome {
            Ok(payload) => {
                let fetched = payload.results.unwrap_or_default();
                let fetched_count = fetched.len() as u32;
                if page == 1 {
                    state.results = fetched;
                } else {
                    state.results.extend(fetched);
                }
                state.total_results = payload.total.unwrap_or(0);
                state.has_more = fetched_count >= page_size;
                state.page = page;
                state.page_size = page_size;
                debug!(
                    target: "search",
                    page,
                    fetched = fetched_count,
                    total = state.total_results,
                    "search page applied"
                );
            }
            Err(failure) => {
                warn!(target: "search", "search failed: {}", failure);
                state.error = Some(failure.to_string());
                state.results.clear();
                state.total_results = 0;
                state.has_more = false;
            }
        }
    }

    /// Fetch the next page for the active query and filters. No-op while a
    /// search is in flight or when the last page looked final.
    pub async fn load_more(&self) {
        let next_page = {
            let state = self.state.lock().unwrap();
            if state.is_loading || !state.has_more {
                return;
            }
            (state.page + 1, state.page_size)
        };
        self.search(None, next_page.0, next_page.1).await;
    }

    /// Fetch selectable filter values. A failure keeps whatever options were
    /// loaded before, so a transient outage never blanks the filter UI.
    pub async fn load_filter_options(&self) {
        if !self.monitor.is_connected() {
            debug!(target: "search", "not connected, skipping filter options");
            return;
        }

        match self.service.get_filter_options().await {
            Ok(fetched) => {
                let mut state = self.state.lock().unwrap();
                state.available.merge(fetched);
                state.options_loaded = true;
            }
            Err(failure) => {
                warn!(target: "search", "loading filter options failed: {}", failure);
                self.state.lock().unwrap().error = Some(failure.to_string());
            }
        }
    }
}
