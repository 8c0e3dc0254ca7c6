//! Locally cached view of the social feed with optimistic mutations.
//!
//! Posts and comments come from the relational backend; votes and new
//! records apply optimistically before the network round-trip. Each
//! optimistic vote carries a local sequence number until the backend
//! confirms it, so a concurrent refetch re-applies unconfirmed votes
//! instead of clobbering them, and a hard failure rolls back exactly the
//! mutation that failed. When the backend is unreachable the store serves a
//! session-scoped fallback memory and parks writes on the outbox for replay.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use campusnet_shared::{
    ApiError, CommentRecord, NewComment, NewPost, NewVote, PostRecord, RealtimeEvent, VoteKind,
    VoteRecord,
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::notifications::{NotificationQueue, Severity};
use crate::outbox::{Outbox, OutboxEntry};

/// Relational backend for posts, comments, and votes.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    async fn fetch_posts(&self) -> Result<Vec<PostRecord>, ApiError>;
    async fn insert_post(&self, post: &NewPost) -> Result<PostRecord, ApiError>;
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>, ApiError>;
    async fn insert_comment(&self, comment: &NewComment) -> Result<CommentRecord, ApiError>;
    async fn upsert_vote(&self, vote: &NewVote) -> Result<(), ApiError>;
}

/// A post as displayed in the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub author_id: Option<String>,
    pub author_role: String,
    pub avatar: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Derived tally: UP votes minus DOWN votes.
    pub votes: i64,
    pub comments_count: usize,
    pub liked_by: Vec<String>,
    pub downvoted_by: Vec<String>,
    pub flair: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub author_id: Option<String>,
    pub avatar: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    PostsChanged,
    CommentsChanged(String),
}

#[derive(Debug, Clone)]
struct PendingVote {
    seq: u64,
    post_id: String,
    user_id: String,
    kind: VoteKind,
}

struct FeedState {
    posts: Vec<Post>,
    comments: HashMap<String, Vec<Comment>>,
    open_panels: HashSet<String>,
    pending_votes: Vec<PendingVote>,
    next_seq: u64,
}

/// In-process substitute data used while the backend is unreachable. Never
/// persisted; it lives until the outbox replays or the session ends.
#[derive(Default)]
struct FallbackMemory {
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct FeedStore {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    state: Mutex<FeedState>,
    fallback: Mutex<FallbackMemory>,
    backend: Arc<dyn FeedBackend>,
    outbox: Outbox,
    notifications: NotificationQueue,
    events: broadcast::Sender<FeedEvent>,
}

fn welcome_post() -> PostRecord {
    PostRecord {
        id: "mock-1".to_string(),
        user_id: None,
        author_name: Some("CampusNet Team".to_string()),
        avatar_url: Some("https://api.dicebear.com/7.x/bottts/svg?seed=admin".to_string()),
        content: "Welcome to CampusNet. Set up your profile to start connecting.".to_string(),
        flair: Some("Official".to_string()),
        created_at: Utc::now(),
        votes: Vec::new(),
    }
}

fn map_post(record: &PostRecord) -> Post {
    let mut tally = 0i64;
    let mut liked_by = Vec::new();
    let mut downvoted_by = Vec::new();
    for vote in &record.votes {
        match vote.kind {
            VoteKind::Up => {
                tally += 1;
                liked_by.push(vote.user_id.clone());
            }
            VoteKind::Down => {
                tally -= 1;
                downvoted_by.push(vote.user_id.clone());
            }
        }
    }
    Post {
        id: record.id.clone(),
        author: record
            .author_name
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string()),
        author_id: record.user_id.clone(),
        author_role: record.flair.clone().unwrap_or_else(|| "Member".to_string()),
        avatar: record.avatar_url.clone().unwrap_or_default(),
        content: record.content.clone(),
        created_at: record.created_at,
        votes: tally,
        comments_count: 0,
        liked_by,
        downvoted_by,
        flair: record.flair.clone(),
    }
}

fn map_comment(record: &CommentRecord) -> Comment {
    Comment {
        id: record.id.clone(),
        author: record
            .author_name
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string()),
        author_id: record.user_id.clone(),
        avatar: record.avatar_url.clone().unwrap_or_default(),
        content: record.content.clone(),
        created_at: record.created_at,
    }
}

fn apply_vote(post: &mut Post, user_id: &str, kind: VoteKind) {
    match kind {
        VoteKind::Up => {
            post.votes += 1;
            post.liked_by.push(user_id.to_string());
        }
        VoteKind::Down => {
            post.votes -= 1;
            post.downvoted_by.push(user_id.to_string());
        }
    }
}

fn revert_vote(post: &mut Post, user_id: &str, kind: VoteKind) {
    match kind {
        VoteKind::Up => {
            post.votes -= 1;
            post.liked_by.retain(|id| id != user_id);
        }
        VoteKind::Down => {
            post.votes += 1;
            post.downvoted_by.retain(|id| id != user_id);
        }
    }
}

impl FeedStore {
    pub fn new(backend: Arc<dyn FeedBackend>, notifications: NotificationQueue) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(FeedInner {
                state: Mutex::new(FeedState {
                    posts: Vec::new(),
                    comments: HashMap::new(),
                    open_panels: HashSet::new(),
                    pending_votes: Vec::new(),
                    next_seq: 0,
                }),
                fallback: Mutex::new(FallbackMemory::default()),
                backend,
                outbox: Outbox::new(),
                notifications,
                events,
            }),
        }
    }

    // --- Reads ---

    pub fn posts(&self) -> Vec<Post> {
        self.inner.state.lock().unwrap().posts.clone()
    }

    pub fn comments(&self, post_id: &str) -> Vec<Comment> {
        self.inner
            .state
            .lock()
            .unwrap()
            .comments
            .get(post_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_open(&self, post_id: &str) -> bool {
        self.inner.state.lock().unwrap().open_panels.contains(post_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.events.subscribe()
    }

    pub fn outbox_len(&self) -> usize {
        self.inner.outbox.len()
    }

    // --- Synchronization ---

    /// Pull all posts, newest first. Falls back to the session memory when
    /// the backend is unreachable, and re-applies unconfirmed optimistic
    /// votes on top of whatever was fetched.
    pub async fn refresh(&self) -> Vec<Post> {
        let records = match self.inner.backend.fetch_posts().await {
            Ok(records) => {
                if self.replay_outbox().await > 0 {
                    // replayed writes changed the remote set; pull once more
                    self.inner.backend.fetch_posts().await.unwrap_or(records)
                } else {
                    records
                }
            }
            Err(e) if e.is_unavailable() => {
                tracing::warn!("posts backend unavailable, serving session fallback: {e}");
                let mut fallback = self.inner.fallback.lock().unwrap();
                if fallback.posts.is_empty() {
                    fallback.posts.push(welcome_post());
                }
                fallback.posts.clone()
            }
            Err(e) => {
                tracing::error!("feed refresh failed: {e}");
                return self.posts();
            }
        };

        let snapshot = {
            let mut state = self.inner.state.lock().unwrap();
            let mut posts: Vec<Post> = records.iter().map(map_post).collect();
            for post in &mut posts {
                if let Some(comments) = state.comments.get(&post.id) {
                    post.comments_count = comments.len();
                }
            }
            for pending in &state.pending_votes {
                if let Some(post) = posts.iter_mut().find(|p| p.id == pending.post_id) {
                    let already_counted = post.liked_by.contains(&pending.user_id)
                        || post.downvoted_by.contains(&pending.user_id);
                    if !already_counted {
                        apply_vote(post, &pending.user_id, pending.kind);
                    }
                }
            }
            state.posts = posts;
            state.posts.clone()
        };

        let _ = self.inner.events.send(FeedEvent::PostsChanged);
        snapshot
    }

    /// Open or close a post's comment panel; opening always refetches.
    /// Returns whether the panel is now open.
    pub async fn toggle_comments(&self, post_id: &str) -> bool {
        let opened = {
            let mut state = self.inner.state.lock().unwrap();
            if state.open_panels.remove(post_id) {
                false
            } else {
                state.open_panels.insert(post_id.to_string());
                true
            }
        };
        if opened {
            self.load_comments(post_id).await;
        }
        opened
    }

    /// Fetch one post's comments and refresh its comment count.
    pub async fn load_comments(&self, post_id: &str) -> Vec<Comment> {
        let records = match self.inner.backend.fetch_comments(post_id).await {
            Ok(records) => records,
            Err(e) if e.is_unavailable() => {
                tracing::warn!("comments backend unavailable, serving session fallback: {e}");
                self.inner
                    .fallback
                    .lock()
                    .unwrap()
                    .comments
                    .iter()
                    .filter(|c| c.post_id == post_id)
                    .cloned()
                    .collect()
            }
            Err(e) => {
                tracing::error!("comment load failed: {e}");
                return self.comments(post_id);
            }
        };

        let comments: Vec<Comment> = records.iter().map(map_comment).collect();
        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                post.comments_count = comments.len();
            }
            state.comments.insert(post_id.to_string(), comments.clone());
        }
        let _ = self
            .inner
            .events
            .send(FeedEvent::CommentsChanged(post_id.to_string()));
        comments
    }

    // --- Writes ---

    /// Publish a post. Unreachable backend: the post appears locally with a
    /// `local-` id and is parked on the outbox; any other failure surfaces a
    /// toast and returns the error.
    pub async fn create_post(&self, post: NewPost) -> Result<Post, ApiError> {
        let record = match self.inner.backend.insert_post(&post).await {
            Ok(record) => record,
            Err(e) if e.is_unavailable() => {
                let record = PostRecord {
                    id: format!("local-{}", Uuid::new_v4()),
                    user_id: Some(post.user_id.clone()),
                    author_name: Some(post.author_name.clone()),
                    avatar_url: Some(post.avatar_url.clone()),
                    content: post.content.clone(),
                    flair: post.flair.clone(),
                    created_at: Utc::now(),
                    votes: Vec::new(),
                };
                self.inner
                    .fallback
                    .lock()
                    .unwrap()
                    .posts
                    .insert(0, record.clone());
                self.inner.outbox.enqueue(OutboxEntry::Post {
                    local_id: record.id.clone(),
                    post,
                });
                self.inner.notifications.push(
                    "Network unreachable. Post kept locally for this session.",
                    Severity::Warning,
                );
                record
            }
            Err(e) => {
                self.inner
                    .notifications
                    .push("Post could not be shared.", Severity::Error);
                return Err(e);
            }
        };

        let view = map_post(&record);
        self.inner
            .state
            .lock()
            .unwrap()
            .posts
            .insert(0, view.clone());
        let _ = self.inner.events.send(FeedEvent::PostsChanged);
        Ok(view)
    }

    /// Add a comment to a post, with the same degraded path as posts.
    pub async fn create_comment(&self, comment: NewComment) -> Result<Comment, ApiError> {
        let record = match self.inner.backend.insert_comment(&comment).await {
            Ok(record) => record,
            Err(e) if e.is_unavailable() => {
                let record = CommentRecord {
                    id: format!("c-local-{}", Uuid::new_v4()),
                    post_id: comment.post_id.clone(),
                    user_id: Some(comment.user_id.clone()),
                    author_name: Some(comment.author_name.clone()),
                    avatar_url: Some(comment.avatar_url.clone()),
                    content: comment.content.clone(),
                    created_at: Utc::now(),
                };
                self.inner
                    .fallback
                    .lock()
                    .unwrap()
                    .comments
                    .push(record.clone());
                self.inner.outbox.enqueue(OutboxEntry::Comment {
                    local_id: record.id.clone(),
                    comment,
                });
                self.inner.notifications.push(
                    "Network unreachable. Reply kept locally for this session.",
                    Severity::Warning,
                );
                record
            }
            Err(e) => {
                self.inner
                    .notifications
                    .push("Reply could not be delivered.", Severity::Error);
                return Err(e);
            }
        };

        let view = map_comment(&record);
        {
            let mut state = self.inner.state.lock().unwrap();
            state
                .comments
                .entry(record.post_id.clone())
                .or_default()
                .push(view.clone());
            if let Some(post) = state.posts.iter_mut().find(|p| p.id == record.post_id) {
                post.comments_count += 1;
            }
        }
        let _ = self
            .inner
            .events
            .send(FeedEvent::CommentsChanged(record.post_id.clone()));
        Ok(view)
    }

    /// Cast a vote. A user already counted on the post cannot vote again:
    /// the tally stays put and no request is issued. Otherwise the tally
    /// updates optimistically before the upsert; a hard failure rolls back
    /// exactly this vote, an unreachable backend parks it on the outbox.
    ///
    /// Returns whether a vote was actually cast.
    pub async fn cast_vote(
        &self,
        post_id: &str,
        user_id: &str,
        kind: VoteKind,
    ) -> Result<bool, ApiError> {
        let seq = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
                return Ok(false);
            };
            if post.liked_by.iter().any(|id| id == user_id)
                || post.downvoted_by.iter().any(|id| id == user_id)
            {
                return Ok(false);
            }
            apply_vote(post, user_id, kind);
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending_votes.push(PendingVote {
                seq,
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
                kind,
            });
            seq
        };
        let _ = self.inner.events.send(FeedEvent::PostsChanged);

        let vote = NewVote {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            kind,
        };
        match self.inner.backend.upsert_vote(&vote).await {
            Ok(()) => {
                let mut state = self.inner.state.lock().unwrap();
                state.pending_votes.retain(|p| p.seq != seq);
                Ok(true)
            }
            Err(e) if e.is_unavailable() => {
                // still pending, but durable: the outbox replays it later
                {
                    let mut fallback = self.inner.fallback.lock().unwrap();
                    if let Some(record) = fallback.posts.iter_mut().find(|p| p.id == post_id) {
                        record.votes.retain(|v| v.user_id != user_id);
                        record.votes.push(VoteRecord {
                            user_id: user_id.to_string(),
                            kind,
                        });
                    }
                }
                self.inner.outbox.enqueue(OutboxEntry::Vote { vote });
                self.inner.notifications.push(
                    "Network unreachable. Vote kept locally until it returns.",
                    Severity::Warning,
                );
                Ok(true)
            }
            Err(e) => {
                {
                    let mut state = self.inner.state.lock().unwrap();
                    state.pending_votes.retain(|p| p.seq != seq);
                    if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                        revert_vote(post, user_id, kind);
                    }
                }
                let _ = self.inner.events.send(FeedEvent::PostsChanged);
                self.inner
                    .notifications
                    .push("Vote not recorded.", Severity::Warning);
                Err(e)
            }
        }
    }

    // --- Reconciliation ---

    /// Drive coarse reconciliation from the realtime change feed: any change
    /// on the posts set re-pulls the feed and every open comment panel.
    pub async fn run_realtime(&self, mut rx: mpsc::Receiver<RealtimeEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                RealtimeEvent::Change { table, .. } if table == "posts" => {
                    self.refresh().await;
                    let open: Vec<String> = {
                        let state = self.inner.state.lock().unwrap();
                        state.open_panels.iter().cloned().collect()
                    };
                    for post_id in open {
                        self.load_comments(&post_id).await;
                    }
                }
                RealtimeEvent::Change { .. } => {}
                RealtimeEvent::Error { code, message } => {
                    tracing::warn!("realtime channel error {code}: {message}");
                }
            }
        }
    }

    /// Drain the outbox against the backend; replayed local records leave
    /// the fallback memory, and replayed votes stop being pending.
    async fn replay_outbox(&self) -> usize {
        if self.inner.outbox.is_empty() {
            return 0;
        }
        let replayed = self.inner.outbox.replay(self.inner.backend.as_ref()).await;
        if replayed.is_empty() {
            return 0;
        }
        {
            let mut fallback = self.inner.fallback.lock().unwrap();
            let mut state = self.inner.state.lock().unwrap();
            for entry in &replayed {
                match entry {
                    OutboxEntry::Post { local_id, .. } => {
                        fallback.posts.retain(|p| p.id != *local_id);
                    }
                    OutboxEntry::Comment { local_id, .. } => {
                        fallback.comments.retain(|c| c.id != *local_id);
                    }
                    OutboxEntry::Vote { vote } => {
                        state
                            .pending_votes
                            .retain(|p| !(p.post_id == vote.post_id && p.user_id == vote.user_id));
                    }
                }
            }
        }
        replayed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// In-memory relational backend with switchable failure modes.
    #[derive(Default)]
    struct MockBackend {
        posts: Mutex<Vec<PostRecord>>,
        comments: Mutex<Vec<CommentRecord>>,
        unavailable: AtomicBool,
        reject_votes: AtomicBool,
        vote_gate: Option<Arc<Notify>>,
    }

    impl MockBackend {
        fn seed_post(&self, id: &str, votes: Vec<VoteRecord>) {
            self.posts.lock().unwrap().push(PostRecord {
                id: id.to_string(),
                user_id: Some("author-1".to_string()),
                author_name: Some("Jordan".to_string()),
                avatar_url: None,
                content: "hello campus".to_string(),
                flair: None,
                created_at: Utc::now(),
                votes,
            });
        }

        fn up_votes(n: usize) -> Vec<VoteRecord> {
            (0..n)
                .map(|i| VoteRecord {
                    user_id: format!("fan-{i}"),
                    kind: VoteKind::Up,
                })
                .collect()
        }
    }

    #[async_trait]
    impl FeedBackend for MockBackend {
        async fn fetch_posts(&self) -> Result<Vec<PostRecord>, ApiError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".to_string()));
            }
            Ok(self.posts.lock().unwrap().clone())
        }

        async fn insert_post(&self, post: &NewPost) -> Result<PostRecord, ApiError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".to_string()));
            }
            let record = PostRecord {
                id: format!("p-{}", Uuid::new_v4()),
                user_id: Some(post.user_id.clone()),
                author_name: Some(post.author_name.clone()),
                avatar_url: Some(post.avatar_url.clone()),
                content: post.content.clone(),
                flair: post.flair.clone(),
                created_at: Utc::now(),
                votes: Vec::new(),
            };
            self.posts.lock().unwrap().insert(0, record.clone());
            Ok(record)
        }

        async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>, ApiError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".to_string()));
            }
            Ok(self
                .comments
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.post_id == post_id)
                .cloned()
                .collect())
        }

        async fn insert_comment(&self, comment: &NewComment) -> Result<CommentRecord, ApiError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".to_string()));
            }
            let record = CommentRecord {
                id: format!("c-{}", Uuid::new_v4()),
                post_id: comment.post_id.clone(),
                user_id: Some(comment.user_id.clone()),
                author_name: Some(comment.author_name.clone()),
                avatar_url: Some(comment.avatar_url.clone()),
                content: comment.content.clone(),
                created_at: Utc::now(),
            };
            self.comments.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn upsert_vote(&self, vote: &NewVote) -> Result<(), ApiError> {
            if let Some(gate) = &self.vote_gate {
                gate.notified().await;
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".to_string()));
            }
            if self.reject_votes.load(Ordering::SeqCst) {
                return Err(ApiError::Http {
                    status: 401,
                    body: "not allowed".to_string(),
                });
            }
            let mut posts = self.posts.lock().unwrap();
            if let Some(record) = posts.iter_mut().find(|p| p.id == vote.post_id) {
                record.votes.retain(|v| v.user_id != vote.user_id);
                record.votes.push(VoteRecord {
                    user_id: vote.user_id.clone(),
                    kind: vote.kind,
                });
            }
            Ok(())
        }
    }

    fn store_with(backend: Arc<MockBackend>) -> FeedStore {
        FeedStore::new(backend, NotificationQueue::new())
    }

    fn new_post(content: &str) -> NewPost {
        NewPost {
            content: content.to_string(),
            user_id: "u-1".to_string(),
            author_name: "Avery".to_string(),
            avatar_url: "https://example.test/a.png".to_string(),
            flair: Some("Founder".to_string()),
        }
    }

    #[tokio::test]
    async fn refresh_maps_tallies_and_membership() {
        let backend = Arc::new(MockBackend::default());
        backend.seed_post(
            "p-1",
            vec![
                VoteRecord {
                    user_id: "fan-1".to_string(),
                    kind: VoteKind::Up,
                },
                VoteRecord {
                    user_id: "critic-1".to_string(),
                    kind: VoteKind::Down,
                },
                VoteRecord {
                    user_id: "fan-2".to_string(),
                    kind: VoteKind::Up,
                },
            ],
        );
        let store = store_with(backend);

        let posts = store.refresh().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].votes, 1);
        assert_eq!(posts[0].liked_by.len(), 2);
        assert_eq!(posts[0].downvoted_by, vec!["critic-1".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_backend_serves_the_welcome_post() {
        let backend = Arc::new(MockBackend::default());
        backend.unavailable.store(true, Ordering::SeqCst);
        let store = store_with(backend);

        let posts = store.refresh().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "mock-1");
    }

    #[tokio::test]
    async fn optimistic_vote_lands_before_confirmation_and_guards_repeats() {
        let backend = Arc::new(MockBackend::default());
        backend.seed_post("p-1", MockBackend::up_votes(5));
        let store = store_with(backend.clone());
        store.refresh().await;

        assert!(store.cast_vote("p-1", "u-1", VoteKind::Up).await.unwrap());
        assert_eq!(store.posts()[0].votes, 6);

        // a second vote from the same user is blocked with no remote call
        let before = backend.posts.lock().unwrap()[0].votes.len();
        assert!(!store.cast_vote("p-1", "u-1", VoteKind::Down).await.unwrap());
        assert_eq!(store.posts()[0].votes, 6);
        assert_eq!(backend.posts.lock().unwrap()[0].votes.len(), before);
    }

    #[tokio::test]
    async fn rejected_vote_rolls_back_exactly_that_mutation() {
        let backend = Arc::new(MockBackend::default());
        backend.seed_post("p-1", MockBackend::up_votes(5));
        backend.reject_votes.store(true, Ordering::SeqCst);
        let store = store_with(backend);
        store.refresh().await;

        let result = store.cast_vote("p-1", "u-1", VoteKind::Up).await;
        assert!(result.is_err());
        let post = &store.posts()[0];
        assert_eq!(post.votes, 5);
        assert!(!post.liked_by.contains(&"u-1".to_string()));
    }

    #[tokio::test]
    async fn refresh_reapplies_a_vote_the_backend_has_not_confirmed() {
        let backend = Arc::new(MockBackend {
            vote_gate: Some(Arc::new(Notify::new())),
            ..Default::default()
        });
        backend.seed_post("p-1", MockBackend::up_votes(5));
        let store = store_with(backend.clone());
        store.refresh().await;

        let gate = backend.vote_gate.clone().unwrap();
        let vote_task = {
            let store = store.clone();
            tokio::spawn(async move { store.cast_vote("p-1", "u-1", VoteKind::Up).await })
        };
        // wait until the optimistic update is visible
        while store.posts()[0].votes != 6 {
            tokio::task::yield_now().await;
        }

        // a realtime-triggered refetch returns stale server state (5 votes),
        // but the pending optimistic vote survives it
        let posts = store.refresh().await;
        assert_eq!(posts[0].votes, 6);

        gate.notify_one();
        vote_task.await.unwrap().unwrap();

        // confirmed now; the server state includes the vote
        let posts = store.refresh().await;
        assert_eq!(posts[0].votes, 6);
    }

    #[tokio::test]
    async fn offline_post_gets_a_local_id_and_replays_later() {
        let backend = Arc::new(MockBackend::default());
        backend.unavailable.store(true, Ordering::SeqCst);
        let store = store_with(backend.clone());

        let post = store.create_post(new_post("written offline")).await.unwrap();
        assert!(post.id.starts_with("local-"));
        assert_eq!(store.outbox_len(), 1);

        // connectivity returns; the next refresh replays the outbox
        backend.unavailable.store(false, Ordering::SeqCst);
        let posts = store.refresh().await;
        assert_eq!(store.outbox_len(), 0);
        assert!(posts.iter().any(|p| p.content == "written offline"));
        assert!(posts.iter().all(|p| !p.id.starts_with("local-")));
    }

    #[tokio::test]
    async fn opening_comments_fetches_and_counts() {
        let backend = Arc::new(MockBackend::default());
        backend.seed_post("p-1", Vec::new());
        let store = store_with(backend.clone());
        store.refresh().await;

        store
            .create_comment(NewComment {
                post_id: "p-1".to_string(),
                user_id: "u-2".to_string(),
                author_name: "Sam".to_string(),
                avatar_url: String::new(),
                content: "congrats!".to_string(),
            })
            .await
            .unwrap();

        assert!(store.toggle_comments("p-1").await);
        assert_eq!(store.comments("p-1").len(), 1);
        assert_eq!(store.posts()[0].comments_count, 1);

        // closing keeps the cache but the next open refetches
        assert!(!store.toggle_comments("p-1").await);
        assert!(!store.is_open("p-1"));
    }
}
