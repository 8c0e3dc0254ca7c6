//! Buffered feed writes awaiting connectivity.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use campusnet_shared::{NewComment, NewPost, NewVote};

use crate::stores::feed::FeedBackend;

/// A write captured while the backend was unreachable, keyed to the local
/// record standing in for it.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboxEntry {
    Post { local_id: String, post: NewPost },
    Comment { local_id: String, comment: NewComment },
    Vote { vote: NewVote },
}

/// FIFO write-ahead queue replayed once the backend answers again.
#[derive(Clone, Default)]
pub struct Outbox {
    entries: Arc<Mutex<VecDeque<OutboxEntry>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, entry: OutboxEntry) {
        self.entries.lock().unwrap().push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Replay queued writes in order. Stops at the first entry the backend
    /// still refuses, leaving it (and everything behind it) queued; returns
    /// the entries that made it through.
    pub async fn replay(&self, backend: &dyn FeedBackend) -> Vec<OutboxEntry> {
        let mut replayed = Vec::new();
        loop {
            let Some(entry) = self.entries.lock().unwrap().pop_front() else {
                break;
            };
            let result = match &entry {
                OutboxEntry::Post { post, .. } => backend.insert_post(post).await.map(|_| ()),
                OutboxEntry::Comment { comment, .. } => {
                    backend.insert_comment(comment).await.map(|_| ())
                }
                OutboxEntry::Vote { vote } => backend.upsert_vote(vote).await,
            };
            match result {
                Ok(()) => replayed.push(entry),
                Err(e) => {
                    tracing::warn!("outbox replay stalled: {e}");
                    self.entries.lock().unwrap().push_front(entry);
                    break;
                }
            }
        }
        if !replayed.is_empty() {
            tracing::info!("outbox replayed {} buffered write(s)", replayed.len());
        }
        replayed
    }
}
