//! Event Dispatcher (C10): notifies registered handlers around an
//! analysis. Each handler call runs in its own task so a panicking
//! observer is logged and swallowed rather than failing the analysis.

use crate::model::AnalysisResult;
use async_trait::async_trait;
use std::sync::Arc;

/// An observer of the analysis lifecycle. All methods default to a no-op
/// so implementations only need to override the events they care about.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called once, before the pipeline runs.
    async fn on_started(&self, analysis_id: uuid::Uuid, prompt_len: usize) {
        let _ = (analysis_id, prompt_len);
    }

    /// Called once, only when the final verdict is a threat, before
    /// `on_completed`.
    async fn on_threat(&self, result: &AnalysisResult) {
        let _ = result;
    }

    /// Called once per analysis, regardless of outcome.
    async fn on_completed(&self, result: &AnalysisResult) {
        let _ = result;
    }
}

/// Holds the ordered set of registered handlers and dispatches lifecycle
/// events to all of them.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self { handlers }
    }

    pub async fn dispatch_started(&self, analysis_id: uuid::Uuid, prompt_len: usize) {
        for handler in &self.handlers {
            let handler = handler.clone();
            let outcome = tokio::spawn(async move { handler.on_started(analysis_id, prompt_len).await }).await;
            Self::log_handler_panic("on_started", outcome);
        }
    }

    pub async fn dispatch_threat(&self, result: &AnalysisResult) {
        for handler in &self.handlers {
            let handler = handler.clone();
            let result = result.clone();
            let outcome = tokio::spawn(async move { handler.on_threat(&result).await }).await;
            Self::log_handler_panic("on_threat", outcome);
        }
    }

    pub async fn dispatch_completed(&self, result: &AnalysisResult) {
        for handler in &self.handlers {
            let handler = handler.clone();
            let result = result.clone();
            let outcome = tokio::spawn(async move { handler.on_completed(&result).await }).await;
            Self::log_handler_panic("on_completed", outcome);
        }
    }

    /// A handler that panics must never take the analysis down with it;
    /// log and move on to the next handler.
    fn log_handler_panic(event_name: &str, outcome: Result<(), tokio::task::JoinError>) {
        if let Err(join_err) = outcome {
            tracing::warn!(event = event_name, error = %join_err, "event handler panicked; ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionLayer, LayerName};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHandler {
        started: AtomicUsize,
        threats: AtomicUsize,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn on_started(&self, _analysis_id: uuid::Uuid, _prompt_len: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_threat(&self, _result: &AnalysisResult) {
            self.threats.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_completed(&self, _result: &AnalysisResult) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_result(is_threat: bool) -> AnalysisResult {
        AnalysisResult {
            analysis_id: uuid::Uuid::nil(),
            is_threat,
            confidence: if is_threat { 0.9 } else { 0.1 },
            threat_info: None,
            breakdown: None,
            decision_layer: DecisionLayer::Layer(LayerName::PatternMatching),
            duration: Duration::from_millis(1),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatches_to_every_registered_handler() {
        let handler = Arc::new(CountingHandler::default());
        let dispatcher = EventDispatcher::new(vec![handler.clone()]);

        dispatcher.dispatch_started(uuid::Uuid::nil(), 10).await;
        let result = sample_result(true);
        dispatcher.dispatch_threat(&result).await;
        dispatcher.dispatch_completed(&result).await;

        assert_eq!(handler.started.load(Ordering::SeqCst), 1);
        assert_eq!(handler.threats.load(Ordering::SeqCst), 1);
        assert_eq!(handler.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn default_handler_methods_are_harmless_no_ops() {
        struct Silent;
        #[async_trait]
        impl EventHandler for Silent {}

        let dispatcher = EventDispatcher::new(vec![Arc::new(Silent)]);
        let result = sample_result(false);
        dispatcher.dispatch_started(uuid::Uuid::nil(), 0).await;
        dispatcher.dispatch_completed(&result).await;
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn on_started(&self, _analysis_id: uuid::Uuid, _prompt_len: usize) {
            panic!("boom");
        }

        async fn on_completed(&self, _result: &AnalysisResult) {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn a_panicking_handler_does_not_stop_its_peers_or_the_caller() {
        let counting = Arc::new(CountingHandler::default());
        let dispatcher = EventDispatcher::new(vec![Arc::new(PanickingHandler), counting.clone()]);

        dispatcher.dispatch_started(uuid::Uuid::nil(), 0).await;
        dispatcher.dispatch_completed(&sample_result(false)).await;

        assert_eq!(counting.started.load(Ordering::SeqCst), 1);
        assert_eq!(counting.completed.load(Ordering::SeqCst), 1);
    }
}
