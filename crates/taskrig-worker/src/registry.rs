// Static topic -> handler mapping
//
// Built once before the loops start; lookups are exact-match. Registering a
// second handler for the same topic keeps the first and logs a warning, so
// a wiring mistake is visible without changing routing behavior.

use std::collections::HashMap;
use std::sync::Arc;

use taskrig_core::protocol::TopicRequest;
use taskrig_core::ExternalTaskHandler;
use tracing::warn;

/// Registry of all handlers this worker serves
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ExternalTaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its topic. First registration wins.
    pub fn register(mut self, handler: impl ExternalTaskHandler + 'static) -> Self {
        self.register_arc(Arc::new(handler));
        self
    }

    /// Register an already-shared handler under its topic. First registration wins.
    pub fn register_arc(&mut self, handler: Arc<dyn ExternalTaskHandler>) {
        let topic = handler.topic().to_owned();
        if self.handlers.contains_key(&topic) {
            warn!(topic, "a handler is already registered for this topic; keeping the first one");
            return;
        }
        self.handlers.insert(topic, handler);
    }

    /// Resolve a handler by exact topic match
    pub fn get(&self, topic: &str) -> Option<Arc<dyn ExternalTaskHandler>> {
        self.handlers.get(topic).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Registered topic names
    pub fn topics(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Topic subscriptions for a fetch-and-lock request, one per handler
    pub fn topic_requests(&self) -> Vec<TopicRequest> {
        self.handlers
            .values()
            .map(|handler| TopicRequest {
                topic_name: handler.topic().to_owned(),
                lock_duration: handler.lock_duration().as_millis() as u64,
                variables: handler.variables(),
            })
            .collect()
    }
}
