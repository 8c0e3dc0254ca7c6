//! Application controller wiring the engine together.
//!
//! Owns the session manager, the user and feed stores, and the notification
//! queue, and exposes the composite flows the UI layer calls: posting,
//! replying, voting, venture analysis, sign-in/out. XP awards and
//! login-required guards live here so the stores stay single-purpose.

use std::sync::Arc;

use async_trait::async_trait;
use campusnet_shared::{
    ApiError, NewComment, NewPost, ProfileMetadata, VentureAnalysis, VoteKind,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ai::AiClient;
use crate::api_client::PlatformClient;
use crate::config::Config;
use crate::realtime::ChangeFeed;
use crate::session::SessionManager;
use crate::storage::Storage;
use crate::stores::feed::{Comment, FeedBackend, FeedStore, Post};
use crate::stores::notifications::{NotificationQueue, Severity};
use crate::stores::profile::UserStore;
use crate::stores::random_token;
use crate::sync::{CloudSync, ProfileRemote};

/// XP awarded for sharing a post.
pub const POST_XP: u32 = 100;
/// XP awarded for replying to a post.
pub const COMMENT_XP: u32 = 50;
/// XP awarded for an upvote.
pub const UPVOTE_XP: u32 = 5;

/// Routes platform calls through the freshest access token and skips the
/// profile mirror entirely while signed out.
#[derive(Clone)]
struct SessionedPlatform {
    sessions: SessionManager,
}

impl SessionedPlatform {
    fn client(&self) -> PlatformClient {
        self.sessions.authed()
    }
}

#[async_trait]
impl ProfileRemote for SessionedPlatform {
    async fn update_user_metadata(&self, data: &ProfileMetadata) -> Result<(), ApiError> {
        if self.sessions.current().is_none() {
            tracing::debug!("no session, skipping profile mirror write");
            return Ok(());
        }
        self.client().update_user_metadata(data).await.map(|_| ())
    }
}

#[async_trait]
impl FeedBackend for SessionedPlatform {
    async fn fetch_posts(&self) -> Result<Vec<campusnet_shared::PostRecord>, ApiError> {
        self.client().fetch_posts().await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<campusnet_shared::PostRecord, ApiError> {
        self.client().insert_post(post).await
    }

    async fn fetch_comments(
        &self,
        post_id: &str,
    ) -> Result<Vec<campusnet_shared::CommentRecord>, ApiError> {
        self.client().fetch_comments(post_id).await
    }

    async fn insert_comment(
        &self,
        comment: &NewComment,
    ) -> Result<campusnet_shared::CommentRecord, ApiError> {
        self.client().insert_comment(comment).await
    }

    async fn upsert_vote(&self, vote: &campusnet_shared::NewVote) -> Result<(), ApiError> {
        self.client().upsert_vote(vote).await
    }
}

pub struct App {
    pub config: Config,
    pub sessions: SessionManager,
    pub user: UserStore,
    pub feed: FeedStore,
    pub notifications: NotificationQueue,
    pub ai: Arc<AiClient>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let storage = match &config.data_dir {
            Some(dir) => Storage::open(dir.clone()),
            None => Storage::open_default(),
        };
        let platform = PlatformClient::new()
            .with_base_url(&config.platform_url)
            .with_api_key(&config.platform_key);
        let sessions = SessionManager::new(platform, storage.clone());
        let remote = Arc::new(SessionedPlatform {
            sessions: sessions.clone(),
        });
        let notifications = NotificationQueue::new();
        let ai = Arc::new(AiClient::new(&config.ai_url, &config.ai_key));
        let user = UserStore::new(
            storage,
            CloudSync::new(remote.clone()),
            notifications.clone(),
            ai.clone(),
        );
        let feed = FeedStore::new(remote, notifications.clone());

        Self {
            config,
            sessions,
            user,
            feed,
            notifications,
            ai,
        }
    }

    /// Establish the session at startup and hydrate the profile from it.
    pub async fn bootstrap(&self) {
        match self.sessions.bootstrap().await {
            Ok(Some(session)) => self.user.hydrate(&session.user),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("session check failed: {e}");
                self.notifications
                    .push("Session check failed.", Severity::Error);
            }
        }
    }

    /// React to later session changes: hydrate on establish, reset to the
    /// guest profile on sign-out.
    pub fn spawn_session_watcher(&self) -> JoinHandle<()> {
        let mut rx = self.sessions.subscribe();
        let user = self.user.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                match session {
                    Some(session) => user.hydrate(&session.user),
                    None => user.reset(),
                }
            }
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), ApiError> {
        self.sessions.sign_in(email, password).await?;
        Ok(())
    }

    /// Flush any pending profile patch, then drop the session.
    pub async fn sign_out(&self) {
        self.user.flush_sync().await;
        self.sessions.sign_out().await;
    }

    /// Start the realtime reconciliation loop and return the live feed.
    pub fn start_realtime(&self) -> ChangeFeed {
        let (tx, rx) = mpsc::channel(16);
        let feed = self.feed.clone();
        tokio::spawn(async move { feed.run_realtime(rx).await });
        ChangeFeed::spawn(self.config.realtime_url.clone(), "posts".to_string(), tx)
    }

    /// Share a post as the signed-in user. Empty input and signed-out
    /// callers are rejected before any network call.
    pub async fn create_post(&self, content: &str) -> Option<Post> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let profile = self.user.profile();
        let Some(user_id) = profile.id else {
            self.notifications
                .push("Please sign in to post.", Severity::Warning);
            return None;
        };

        let post = NewPost {
            content: content.to_string(),
            user_id,
            author_name: profile.name,
            avatar_url: profile.avatar,
            flair: profile.tagline,
        };
        match self.feed.create_post(post).await {
            Ok(view) => {
                self.user.add_xp(POST_XP);
                self.notifications.push("Post shared!", Severity::Success);
                Some(view)
            }
            // the feed store already surfaced the failure toast
            Err(_) => None,
        }
    }

    /// Reply to a post as the signed-in user.
    pub async fn create_comment(&self, post_id: &str, content: &str) -> Option<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let profile = self.user.profile();
        let Some(user_id) = profile.id else {
            self.notifications
                .push("Please sign in to reply.", Severity::Warning);
            return None;
        };

        let comment = NewComment {
            post_id: post_id.to_string(),
            user_id,
            author_name: profile.name,
            avatar_url: profile.avatar,
            content: content.to_string(),
        };
        match self.feed.create_comment(comment).await {
            Ok(view) => {
                self.user.add_xp(COMMENT_XP);
                self.notifications.push("Reply posted.", Severity::Success);
                Some(view)
            }
            Err(_) => None,
        }
    }

    /// Vote on a post; upvotes that actually land grant XP.
    pub async fn cast_vote(&self, post_id: &str, kind: VoteKind) {
        let Some(user_id) = self.user.profile().id else {
            self.notifications
                .push("Sign in to vote.", Severity::Info);
            return;
        };
        match self.feed.cast_vote(post_id, &user_id, kind).await {
            Ok(true) if kind == VoteKind::Up => {
                self.user.add_xp(UPVOTE_XP);
            }
            // blocked repeat votes and failed votes grant nothing
            _ => {}
        }
    }

    /// Run the AI venture analysis, attach a generated visual when one comes
    /// back, and file the result in the pitch history (newest first).
    pub async fn analyze_venture(&self, concept: &str) -> Option<VentureAnalysis> {
        let concept = concept.trim();
        if concept.is_empty() {
            self.notifications
                .push("Describe your concept first.", Severity::Warning);
            return None;
        }

        let analysis = match self.ai.venture_analysis(concept).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("venture analysis failed: {e}");
                self.notifications
                    .push("Analysis unavailable right now.", Severity::Error);
                return None;
            }
        };
        let visual_url = match self.ai.venture_visual(concept).await {
            Ok(visual) => visual,
            Err(e) => {
                tracing::warn!("venture visual generation failed: {e}");
                None
            }
        };

        let pitch = VentureAnalysis {
            id: random_token(),
            concept: concept.to_string(),
            analysis,
            visual_url,
            date: Utc::now(),
        };
        self.user.save_pitch(pitch.clone());
        self.notifications
            .push("Venture analysis saved.", Severity::Success);
        Some(pitch)
    }
}
