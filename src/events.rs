use tokio::sync::broadcast;

/// Capacity of the notification channel. Subscribers that fall further behind
/// than this see a `Lagged` error and simply resume from the newest event.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Global notifications broadcast by the api client when a request fails in a
/// way other components care about. Observe-only: no payload beyond the
/// classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiEvent {
    /// Server rejected the bearer token (401).
    Unauthorized,
    /// Request got no response at all; the service is probably unreachable.
    NetworkError,
    /// Server answered with a 5xx status.
    ServerError(u16),
}

/// Typed observer channel owned by the api client.
///
/// Subscribers hold a `broadcast::Receiver` and unsubscribe by dropping it;
/// emitting with no live subscribers is fine and goes nowhere.
pub struct ApiEventBus {
    sender: broadcast::Sender<ApiEvent>,
}

impl ApiEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ApiEvent) {
        // send() errors only when there are no receivers; that is not a fault.
        let _ = self.sender.send(event);
    }
}

impl Default for ApiEventBus {
    fn default() -> Self {
        Self::new()
    }
}
