use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};
use std::time::Duration;

use tracing::trace;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct DebounceToken(u64);

/// Latest-trigger-wins debouncing.
/// Clones share one generation counter.
#[derive(Debug, Clone)]
pub struct Debounce {
  window:     Duration,
  generation: Arc<AtomicU64>
}

impl Debounce {
  pub fn new(window: Duration) -> Self {
    Self {
      window,
      generation: Arc::new(AtomicU64::new(
        0
      ))
    }
  }

  pub fn window(&self) -> Duration {
    self.window
  }

  pub fn trigger(&self) -> DebounceToken {
    let next = self
      .generation
      .fetch_add(1, Ordering::SeqCst)
      + 1;
    trace!(generation = next, "debounce triggered");
    DebounceToken(next)
  }

  pub fn is_latest(
    &self,
    token: DebounceToken
  ) -> bool {
    self.generation.load(Ordering::SeqCst)
      == token.0
  }

  /// Waits out the window. `true` only if
  /// nothing triggered in the meantime.
  pub async fn settled(
    &self,
    token: DebounceToken
  ) -> bool {
    if !self.window.is_zero() {
      tokio::time::sleep(self.window).await;
    }
    let latest = self.is_latest(token);
    trace!(generation = token.0, latest, "debounce window elapsed");
    latest
  }
}
