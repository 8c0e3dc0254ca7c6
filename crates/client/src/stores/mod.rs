//! Stores for application state.

pub mod feed;
pub mod notifications;
pub mod profile;

pub use feed::{Comment, FeedEvent, FeedStore, Post};
pub use notifications::{Notification, NotificationQueue, Severity};
pub use profile::{UserEvent, UserStore};

/// Short random alphanumeric token, the shape used for client-side ids
/// (notifications, mentorship requests, pitches).
pub fn random_token() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}
