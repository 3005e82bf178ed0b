//! Usage feedback sink
//!
//! The launch layer reports outcomes here. Events travel over the indexer's
//! command channel and are applied by the indexer worker, so callers never
//! touch the store.

use crate::worker::{flush_via, Command};
use crossbeam_channel::{Sender, TrySendError};
use launchdex_core::{Clock, Error, FailureCode, ItemId, Result, Timestamp};
use std::sync::Arc;

/// One launch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// The item launched successfully at `at`
    Launch {
        /// Launched item
        id: ItemId,
        /// When the launch happened
        at: Timestamp,
    },
    /// The launch failed with `code`
    Failure {
        /// Item that failed to launch
        id: ItemId,
        /// Launcher failure code
        code: FailureCode,
    },
}

impl FeedbackEvent {
    /// The item this event is about
    pub fn id(&self) -> &ItemId {
        match self {
            FeedbackEvent::Launch { id, .. } | FeedbackEvent::Failure { id, .. } => id,
        }
    }
}

/// Cloneable sender of launch feedback.
#[derive(Clone)]
pub struct UsageFeedbackSink {
    tx: Sender<Command>,
    clock: Arc<dyn Clock>,
}

impl UsageFeedbackSink {
    pub(crate) fn new(tx: Sender<Command>, clock: Arc<dyn Clock>) -> Self {
        UsageFeedbackSink { tx, clock }
    }

    /// Record a successful launch, stamped with the current time.
    ///
    /// Visible to queries after the next publish.
    pub fn record_launch(&self, id: impl Into<ItemId>) -> Result<()> {
        let at = self.clock.now();
        self.send(FeedbackEvent::Launch { id: id.into(), at })
    }

    /// Record a failed launch. Missing-target and access-denied codes prune
    /// the item right away.
    pub fn record_failure(&self, id: impl Into<ItemId>, code: FailureCode) -> Result<()> {
        self.send(FeedbackEvent::Failure {
            id: id.into(),
            code,
        })
    }

    /// Wait until every event sent so far has been applied and published.
    pub fn flush(&self) -> Result<()> {
        flush_via(&self.tx)
    }

    fn send(&self, event: FeedbackEvent) -> Result<()> {
        match self.tx.try_send(Command::Feedback(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Backpressure),
            Err(TrySendError::Disconnected(_)) => Err(Error::Shutdown),
        }
    }
}

impl std::fmt::Debug for UsageFeedbackSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageFeedbackSink")
            .field("queued", &self.tx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchdex_core::ManualClock;

    #[test]
    fn test_launch_is_stamped_by_clock() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(42)));
        let sink = UsageFeedbackSink::new(tx, clock);
        sink.record_launch("app:notes").unwrap();
        match rx.try_recv().unwrap() {
            Command::Feedback(FeedbackEvent::Launch { id, at }) => {
                assert_eq!(id.as_str(), "app:notes");
                assert_eq!(at, Timestamp::from_secs(42));
            }
            _ => panic!("expected a launch event"),
        }
    }

    #[test]
    fn test_full_queue_is_backpressure() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sink = UsageFeedbackSink::new(tx, Arc::new(ManualClock::default()));
        sink.record_failure("a", FailureCode::Other(1)).unwrap();
        assert!(matches!(
            sink.record_failure("a", FailureCode::Other(1)),
            Err(Error::Backpressure)
        ));
        drop(rx);
        assert!(matches!(sink.record_launch("a"), Err(Error::Shutdown)));
    }

    #[test]
    fn test_event_id() {
        let event = FeedbackEvent::Failure {
            id: ItemId::from("x"),
            code: FailureCode::MissingTarget,
        };
        assert_eq!(event.id().as_str(), "x");
    }
}
