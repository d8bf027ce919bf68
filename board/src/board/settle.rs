use std::future::Future;
use std::time::Duration;

use super::types::BoardEvent;

/// Hook the cascade awaits after each removal pass and each refill pass,
/// before the next stage reads or writes the grid. A presentation layer
/// implements it to let its animations finish.
pub trait Settle: Send + Sync + Clone + 'static {
    fn settle(&self, event: &BoardEvent) -> impl Future<Output = ()> + Send;
}

/// No delay between stages.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl Settle for Immediate {
    async fn settle(&self, _event: &BoardEvent) {}
}

#[derive(Clone, Copy, Debug)]
pub struct FixedDelay {
    pub removal: Duration,
    pub refill: Duration,
}

impl FixedDelay {
    pub fn new(removal: Duration, refill: Duration) -> Self {
        Self { removal, refill }
    }
}

impl Settle for FixedDelay {
    async fn settle(&self, event: &BoardEvent) {
        let delay = match event {
            BoardEvent::Removed { .. } | BoardEvent::Cleared { .. } => self.removal,
            BoardEvent::Refilled { .. } => self.refill,
            BoardEvent::Moved { .. } | BoardEvent::Swapped { .. } => Duration::ZERO,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
