// src/services/throttle.rs
use log::debug;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Many symbols or funds pulled in sequence.
    Batch,
    /// Interactive single-fund lookup.
    Single,
}

/// Elapsed-time gate between upstream requests.
///
/// One last-request timestamp is shared by both classes; only the minimum
/// delay differs. Two callers waiting on the same deficit may both proceed,
/// so this reduces the request rate rather than enforcing a hard limit.
#[derive(Debug)]
pub struct FetchThrottle {
    batch_delay: Duration,
    single_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl FetchThrottle {
    pub fn new(batch_delay: Duration, single_delay: Duration) -> Self {
        FetchThrottle {
            batch_delay,
            single_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Throttle for fund page requests.
    pub fn for_funds(settings: &Settings) -> Self {
        Self::new(settings.batch_request_delay, settings.single_request_delay)
    }

    /// Throttle for macro quote requests; both classes share one delay.
    pub fn for_macro(settings: &Settings) -> Self {
        Self::new(settings.macro_request_delay, settings.macro_request_delay)
    }

    pub fn min_delay(&self, class: RequestClass) -> Duration {
        match class {
            RequestClass::Batch => self.batch_delay,
            RequestClass::Single => self.single_delay,
        }
    }

    pub async fn await_turn(&self, class: RequestClass) {
        self.await_delay(self.min_delay(class)).await
    }

    /// Sleep until `min_delay` has passed since the previous turn, then
    /// record this turn.
    pub async fn await_delay(&self, min_delay: Duration) {
        let wait = self
            .last_turn()
            .map(|last| min_delay.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO);

        if !wait.is_zero() {
            debug!("Throttle: waiting {:.2}s before next request", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }

        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    fn last_turn(&self) -> Option<Instant> {
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_turn_does_not_wait() {
        let throttle = FetchThrottle::new(Duration::from_millis(200), Duration::from_millis(400));
        let start = Instant::now();
        throttle.await_turn(RequestClass::Single).await;
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_second_turn_waits_for_class_delay() {
        let throttle = FetchThrottle::new(Duration::from_millis(60), Duration::from_millis(120));

        throttle.await_turn(RequestClass::Batch).await;
        let start = Instant::now();
        throttle.await_turn(RequestClass::Batch).await;
        assert!(start.elapsed() >= Duration::from_millis(55));

        let start = Instant::now();
        throttle.await_turn(RequestClass::Single).await;
        assert!(start.elapsed() >= Duration::from_millis(115));
    }

    #[tokio::test]
    async fn test_no_wait_after_delay_elapsed() {
        let throttle = FetchThrottle::new(Duration::from_millis(30), Duration::from_millis(30));
        throttle.await_turn(RequestClass::Batch).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = Instant::now();
        throttle.await_turn(RequestClass::Batch).await;
        assert!(start.elapsed() < Duration::from_millis(25));
    }

    #[test]
    fn test_min_delay_per_class() {
        let settings = Settings::default();
        let throttle = FetchThrottle::for_funds(&settings);
        assert_eq!(throttle.min_delay(RequestClass::Batch), Duration::from_millis(1500));
        assert_eq!(throttle.min_delay(RequestClass::Single), Duration::from_millis(3000));
    }
}
