//! Cross-cutting wrappers composed around dispatch and sessions

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::actions::{ActionDispatcher, DispatchResult};
use crate::intent::Intent;

/// Anything that turns an intent into a terminal result
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, intent: &Intent) -> DispatchResult;
}

#[async_trait]
impl Dispatch for ActionDispatcher {
    async fn dispatch(&self, intent: &Intent) -> DispatchResult {
        Self::dispatch(self, intent).await
    }
}

#[async_trait]
impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    async fn dispatch(&self, intent: &Intent) -> DispatchResult {
        (**self).dispatch(intent).await
    }
}

/// Logs how long each dispatch took
pub struct TimedDispatch<D> {
    inner: D,
}

impl<D: Dispatch> TimedDispatch<D> {
    pub const fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: Dispatch> Dispatch for TimedDispatch<D> {
    async fn dispatch(&self, intent: &Intent) -> DispatchResult {
        let started = Instant::now();
        let result = self.inner.dispatch(intent).await;
        tracing::debug!(
            intent = %intent.kind,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis(),
            "dispatch finished"
        );
        result
    }
}

/// Await `fut`, logging its elapsed time under `label`
pub async fn timed<F: Future>(label: &'static str, fut: F) -> F::Output {
    let started = Instant::now();
    let output = fut.await;
    tracing::debug!(label, elapsed_ms = started.elapsed().as_millis(), "finished");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentKind;

    struct Echo;

    #[async_trait]
    impl Dispatch for Echo {
        async fn dispatch(&self, intent: &Intent) -> DispatchResult {
            DispatchResult::success(intent.kind, intent.raw_text.clone())
        }
    }

    #[tokio::test]
    async fn test_timed_dispatch_passes_result_through() {
        let timed = TimedDispatch::new(Echo);
        let intent = Intent {
            kind: IntentKind::GetTime,
            confidence: 0.9,
            raw_text: "what is the time".to_string(),
            entities: Vec::new(),
        };

        let result = timed.dispatch(&intent).await;
        assert!(result.success);
        assert_eq!(result.message, "what is the time");
        assert_eq!(result.intent_kind, IntentKind::GetTime);
    }

    #[tokio::test]
    async fn test_timed_returns_output() {
        assert_eq!(timed("answer", async { 42 }).await, 42);
    }
}
