// Notifier port - Delivery of operator notifications
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a plain-text message. Only the success flag matters to callers.
    async fn deliver(&self, subject: &str, body: &str, recipients: &[String]) -> bool;

    /// Short description of the transport, e.g. `smtp://relay:25`.
    fn describe(&self) -> String;
}

/// Tries each notifier in order and stops at the first successful delivery.
pub struct FallbackNotifier {
    chain: Vec<Arc<dyn Notifier>>,
}

impl FallbackNotifier {
    pub fn new(chain: Vec<Arc<dyn Notifier>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl Notifier for FallbackNotifier {
    async fn deliver(&self, subject: &str, body: &str, recipients: &[String]) -> bool {
        for (attempt, notifier) in self.chain.iter().enumerate() {
            if notifier.deliver(subject, body, recipients).await {
                if attempt > 0 {
                    tracing::info!(transport = %notifier.describe(), "Delivered via fallback transport");
                }
                return true;
            }
            tracing::warn!(transport = %notifier.describe(), "Delivery failed, trying next transport");
        }
        false
    }

    fn describe(&self) -> String {
        self.chain
            .iter()
            .map(|n| n.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
