//! Live reading snapshots

use std::sync::Arc;

use tokio::sync::watch;

use super::{RepoError, RepoResult, Session};
use crate::models::Reading;

/// Produces the current snapshot for a feed's user
pub type SnapshotFn = Arc<dyn Fn() -> RepoResult<Vec<Reading>> + Send + Sync>;

/// Bumps a revision counter whenever a repository's contents change
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            revision: Arc::new(tx),
        }
    }
}

impl ChangeNotifier {
    pub fn notify(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedState {
    Pending,
    Live,
    Closed,
}

/// Push-based sequence of reading snapshots.
///
/// The first call to [`ReadingFeed::next`] yields the current snapshot; each
/// later call waits for the next change and yields a fresh one. A failed
/// snapshot is yielded once and ends the feed, and so does a change of the
/// session's user. Subscribing again via `list_live` starts a new feed.
///
/// Snapshots run on the blocking thread pool.
pub struct ReadingFeed {
    changes: Option<watch::Receiver<u64>>,
    snapshot: Option<SnapshotFn>,
    owner: Option<(Session, String)>,
    state: FeedState,
}

impl ReadingFeed {
    pub fn new(changes: watch::Receiver<u64>, snapshot: SnapshotFn) -> Self {
        Self {
            changes: Some(changes),
            snapshot: Some(snapshot),
            owner: None,
            state: FeedState::Pending,
        }
    }

    /// End the feed once `session` no longer belongs to `user_id`
    pub fn for_user(mut self, session: Session, user_id: impl Into<String>) -> Self {
        self.owner = Some((session, user_id.into()));
        self
    }

    /// Feed for a signed-out session: one empty snapshot, then done
    pub fn signed_out() -> Self {
        Self {
            changes: None,
            snapshot: None,
            owner: None,
            state: FeedState::Pending,
        }
    }

    pub async fn next(&mut self) -> Option<RepoResult<Vec<Reading>>> {
        match self.state {
            FeedState::Closed => return None,
            FeedState::Pending => {
                self.state = FeedState::Live;
                if let Some(changes) = self.changes.as_mut() {
                    changes.borrow_and_update();
                }
            }
            FeedState::Live => {
                let changed = match self.changes.as_mut() {
                    Some(changes) => changes.changed().await.is_ok(),
                    None => false,
                };
                if !changed {
                    self.state = FeedState::Closed;
                    return None;
                }
            }
        }

        if !self.owner_is_current() {
            tracing::debug!("Session user changed; closing reading feed");
            self.state = FeedState::Closed;
            return None;
        }

        let Some(snapshot) = self.snapshot.clone() else {
            self.state = FeedState::Closed;
            return Some(Ok(Vec::new()));
        };

        let result = tokio::task::spawn_blocking(move || snapshot())
            .await
            .unwrap_or_else(|e| Err(RepoError::Backend(format!("Snapshot task failed: {}", e))));
        if result.is_err() {
            self.state = FeedState::Closed;
        }
        Some(result)
    }

    fn owner_is_current(&self) -> bool {
        match &self.owner {
            Some((session, user_id)) => {
                session.current_user_id().as_deref() == Some(user_id.as_str())
            }
            None => true,
        }
    }
}
