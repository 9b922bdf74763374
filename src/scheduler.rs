//! Periodic triggers with a single owned handle per role.
//!
//! A [`TriggerSlot`] holds at most one running trigger. Installing a new one
//! cancels the old one first, and dropping the slot cancels whatever is
//! installed, so a role can never fire from two sources at once.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct Trigger {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Option-slot owning the current trigger of one role.
pub struct TriggerSlot {
    role: &'static str,
    current: Option<Trigger>,
    next_generation: u64,
}

impl TriggerSlot {
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            current: None,
            next_generation: 1,
        }
    }

    /// Cancel any installed trigger, then spawn a new one.
    ///
    /// `make` receives the new generation number and a cancellation token and
    /// returns the trigger's body. Returns the generation.
    pub fn install<F, Fut>(&mut self, make: F) -> u64
    where
        F: FnOnce(u64, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let generation = self.next_generation;
        self.next_generation += 1;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(make(generation, cancel.clone()));
        tracing::debug!("Installed {} trigger #{}", self.role, generation);

        self.current = Some(Trigger {
            generation,
            cancel,
            handle,
        });
        generation
    }

    /// Cancel the installed trigger, if any. Returns false if the slot was empty.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(trigger) => {
                trigger.cancel.cancel();
                trigger.handle.abort();
                tracing::debug!("Cancelled {} trigger #{}", self.role, trigger.generation);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Generation of the installed trigger.
    pub fn generation(&self) -> Option<u64> {
        self.current.as_ref().map(|t| t.generation)
    }
}

impl Drop for TriggerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Interval firing every `period`, first right away when `immediate`,
/// otherwise after one period. A slow tick body delays later ticks instead
/// of bunching them.
pub fn ticker(period: Duration, immediate: bool) -> Interval {
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Run `on_tick` on a [`ticker`] until `cancel` fires or `on_tick`
/// returns false.
pub async fn run_periodic<F, Fut>(
    period: Duration,
    immediate: bool,
    cancel: CancellationToken,
    mut on_tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut interval = ticker(period, immediate);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !on_tick().await {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_trigger(
        counter: Arc<AtomicU32>,
    ) -> impl FnOnce(u64, CancellationToken) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
    {
        move |_generation, cancel| {
            Box::pin(run_periodic(Duration::from_secs(1), false, cancel, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { true }
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinstall_leaves_single_source() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let mut slot = TriggerSlot::new("test");

        assert_eq!(slot.install(counting_trigger(first.clone())), 1);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(first.load(Ordering::SeqCst), 2);

        assert_eq!(slot.install(counting_trigger(second.clone())), 2);
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 3);
        assert_eq!(slot.generation(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_stop_trigger() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut slot = TriggerSlot::new("test");

        slot.install(counting_trigger(counter.clone()));
        assert!(slot.is_active());
        assert!(slot.cancel());
        assert!(!slot.cancel());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        slot.install(counting_trigger(counter.clone()));
        drop(slot);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
