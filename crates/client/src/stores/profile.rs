//! Authoritative local view of the signed-in user.
//!
//! A single controller object owns the profile state. Mutations apply
//! synchronously, return the updated profile, persist to local storage, and
//! queue a field patch on the debounced cloud sync; observers are notified
//! through a broadcast channel. Remote failures never roll back or block a
//! local mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use campusnet_shared::{
    ApiError, AuthUser, Badge, CourseStatus, EnrolledCourse, Experience, MentorshipRequest,
    MentorshipStatus, NewCourse, PreferencesPatch, ProfileMetadata, ProfilePatch, SocialProfile,
    Theme, UserProfile, VentureAnalysis,
};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::notifications::{NotificationQueue, Severity};
use super::random_token;
use crate::storage::{Storage, PROFILE_KEY, REGISTERED_EVENTS_KEY, SAVED_EVENTS_KEY};
use crate::sync::CloudSync;

/// XP granted when a mentor accepts a request.
pub const MENTOR_ACCEPT_XP: u32 = 200;
/// XP granted for registering to an event.
pub const EVENT_REGISTER_XP: u32 = 150;
/// Simulated delay before a mentor responds.
pub const MENTOR_RESPONSE_DELAY: Duration = Duration::from_millis(5000);
/// How long the last-XP-gain marker stays set.
const XP_FLASH_TTL: Duration = Duration::from_millis(2000);

/// Generates the acceptance text for a mentorship request.
#[async_trait]
pub trait MentorResponder: Send + Sync {
    async fn mentor_response(
        &self,
        mentor_name: &str,
        mentor_role: &str,
        interests: &[String],
    ) -> Result<String, ApiError>;
}

/// Change events published to store observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    ProfileChanged,
    ThemeChanged(Theme),
    EventsChanged,
    SignedOut,
}

struct UserState {
    profile: UserProfile,
    saved_event_ids: Vec<String>,
    registered_event_ids: Vec<String>,
    last_xp_gain: Option<u32>,
    theme: Theme,
}

/// Single-controller store for the current user.
#[derive(Clone)]
pub struct UserStore {
    inner: Arc<UserStoreInner>,
}

struct UserStoreInner {
    state: Mutex<UserState>,
    storage: Storage,
    sync: CloudSync,
    notifications: NotificationQueue,
    responder: Arc<dyn MentorResponder>,
    events: broadcast::Sender<UserEvent>,
    /// Pending acceptance timers, keyed by mentor id so a withdrawal can
    /// cancel the matching simulation.
    mentor_timers: Mutex<HashMap<String, JoinHandle<()>>>,
    xp_flash_timer: Mutex<Option<JoinHandle<()>>>,
}

impl UserStore {
    pub fn new(
        storage: Storage,
        sync: CloudSync,
        notifications: NotificationQueue,
        responder: Arc<dyn MentorResponder>,
    ) -> Self {
        let profile: UserProfile = storage.load(PROFILE_KEY).unwrap_or_default();
        let saved_event_ids = storage.load(SAVED_EVENTS_KEY).unwrap_or_default();
        let registered_event_ids = storage.load(REGISTERED_EVENTS_KEY).unwrap_or_default();
        let theme = profile.preferences.theme;
        let (events, _) = broadcast::channel(32);

        Self {
            inner: Arc::new(UserStoreInner {
                state: Mutex::new(UserState {
                    profile,
                    saved_event_ids,
                    registered_event_ids,
                    last_xp_gain: None,
                    theme,
                }),
                storage,
                sync,
                notifications,
                responder,
                events,
                mentor_timers: Mutex::new(HashMap::new()),
                xp_flash_timer: Mutex::new(None),
            }),
        }
    }

    // --- Reads ---

    pub fn profile(&self) -> UserProfile {
        self.inner.state.lock().unwrap().profile.clone()
    }

    pub fn theme(&self) -> Theme {
        self.inner.state.lock().unwrap().theme
    }

    /// Transient marker for the UI's XP animation; clears itself after 2 s.
    pub fn last_xp_gain(&self) -> Option<u32> {
        self.inner.state.lock().unwrap().last_xp_gain
    }

    pub fn saved_event_ids(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().saved_event_ids.clone()
    }

    pub fn registered_event_ids(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().registered_event_ids.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserEvent> {
        self.inner.events.subscribe()
    }

    // --- Mutations ---

    /// Add XP, rolling over levels per the x1.2 threshold ladder.
    pub fn add_xp(&self, amount: u32) -> UserProfile {
        let (profile, levels_reached) = {
            let mut state = self.inner.state.lock().unwrap();
            let before = state.profile.level;
            state.profile.grant_xp(amount);
            let reached: Vec<u32> = (before + 1..=state.profile.level).collect();
            state.last_xp_gain = Some(amount);
            self.persist_profile(&state.profile);
            (state.profile.clone(), reached)
        };

        for level in levels_reached {
            self.inner
                .notifications
                .push(format!("Level {level} reached!"), Severity::Success);
        }
        self.queue_sync(ProfileMetadata {
            xp: Some(profile.xp),
            level: Some(profile.level),
            xp_to_next_level: Some(profile.xp_to_next_level),
            ..Default::default()
        });
        self.flash_xp();
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// Enroll in a course; enrolling twice with the same id is a no-op.
    pub fn enroll_course(&self, course: NewCourse) -> UserProfile {
        let (profile, enrolled) = {
            let mut state = self.inner.state.lock().unwrap();
            if state
                .profile
                .enrolled_courses
                .iter()
                .any(|c| c.id == course.id)
            {
                (state.profile.clone(), None)
            } else {
                let title = course.title.clone();
                state.profile.enrolled_courses.push(EnrolledCourse {
                    id: course.id,
                    title: course.title,
                    provider: course.provider,
                    link: course.link,
                    domain: course.domain,
                    status: CourseStatus::Enrolled,
                    enrolled_at: Utc::now(),
                });
                self.persist_profile(&state.profile);
                (state.profile.clone(), Some(title))
            }
        };

        if let Some(title) = enrolled {
            self.inner
                .notifications
                .push(format!("Enrolled: {title}."), Severity::Success);
            self.queue_sync(ProfileMetadata {
                enrolled_courses: Some(profile.enrolled_courses.clone()),
                ..Default::default()
            });
            self.emit(UserEvent::ProfileChanged);
        }
        profile
    }

    /// Mark a course completed; unknown ids are a no-op.
    pub fn complete_course(&self, course_id: &str) -> UserProfile {
        let (profile, completed) = {
            let mut state = self.inner.state.lock().unwrap();
            let found = match state
                .profile
                .enrolled_courses
                .iter_mut()
                .find(|c| c.id == course_id)
            {
                Some(course) => {
                    course.status = CourseStatus::Completed;
                    true
                }
                None => false,
            };
            if found {
                self.persist_profile(&state.profile);
            }
            (state.profile.clone(), found)
        };

        if completed {
            self.inner
                .notifications
                .push("Certification achieved!", Severity::Success);
            self.queue_sync(ProfileMetadata {
                enrolled_courses: Some(profile.enrolled_courses.clone()),
                ..Default::default()
            });
            self.emit(UserEvent::ProfileChanged);
        }
        profile
    }

    /// Wholesale-replace the social profile links.
    pub fn update_social_profiles(&self, profiles: Vec<SocialProfile>) -> UserProfile {
        let profile = {
            let mut state = self.inner.state.lock().unwrap();
            state.profile.social_profiles = profiles;
            self.persist_profile(&state.profile);
            state.profile.clone()
        };
        self.queue_sync(ProfileMetadata {
            social_profiles: Some(profile.social_profiles.clone()),
            ..Default::default()
        });
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// Wholesale-replace the experience entries.
    pub fn update_experience(&self, experience: Vec<Experience>) -> UserProfile {
        let profile = {
            let mut state = self.inner.state.lock().unwrap();
            state.profile.experience = experience;
            self.persist_profile(&state.profile);
            state.profile.clone()
        };
        self.queue_sync(ProfileMetadata {
            experience: Some(profile.experience.clone()),
            ..Default::default()
        });
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// Wholesale-replace the interest list.
    pub fn update_interests(&self, interests: Vec<String>) -> UserProfile {
        let profile = {
            let mut state = self.inner.state.lock().unwrap();
            state.profile.interests = interests;
            self.persist_profile(&state.profile);
            state.profile.clone()
        };
        self.queue_sync(ProfileMetadata {
            interests: Some(profile.interests.clone()),
            ..Default::default()
        });
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// Prepend a venture analysis to the pitch history (newest first).
    pub fn save_pitch(&self, pitch: VentureAnalysis) -> UserProfile {
        let profile = {
            let mut state = self.inner.state.lock().unwrap();
            state.profile.pitches.insert(0, pitch);
            self.persist_profile(&state.profile);
            state.profile.clone()
        };
        self.queue_sync(ProfileMetadata {
            pitches: Some(profile.pitches.clone()),
            ..Default::default()
        });
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// File a mentorship request and schedule the simulated acceptance.
    ///
    /// A second request to the same mentor warns and changes nothing. The
    /// acceptance runs 5 s later on its own task and is cancelled by
    /// [`UserStore::withdraw_mentorship_request`].
    pub fn send_mentorship_request(
        &self,
        mentor_id: &str,
        mentor_name: &str,
        mentor_role: &str,
    ) -> UserProfile {
        let (profile, created) = {
            let mut state = self.inner.state.lock().unwrap();
            if state
                .profile
                .mentorship_requests
                .iter()
                .any(|r| r.mentor_id == mentor_id)
            {
                (state.profile.clone(), false)
            } else {
                state.profile.mentorship_requests.push(MentorshipRequest {
                    id: random_token(),
                    mentor_id: mentor_id.to_string(),
                    mentor_name: mentor_name.to_string(),
                    status: MentorshipStatus::Pending,
                    request_date: Utc::now(),
                    initial_message: None,
                    mentor_response: None,
                });
                self.persist_profile(&state.profile);
                (state.profile.clone(), true)
            }
        };

        if !created {
            self.inner.notifications.push(
                "A request to this mentor is already pending.",
                Severity::Warning,
            );
            return profile;
        }

        self.queue_sync(ProfileMetadata {
            mentorship_requests: Some(profile.mentorship_requests.clone()),
            ..Default::default()
        });
        self.inner
            .notifications
            .push(format!("Request sent to {mentor_name}."), Severity::Success);
        self.emit(UserEvent::ProfileChanged);

        let store = self.clone();
        let mentor_id_owned = mentor_id.to_string();
        let mentor_name_owned = mentor_name.to_string();
        let mentor_role_owned = mentor_role.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(MENTOR_RESPONSE_DELAY).await;
            store
                .accept_mentorship(&mentor_id_owned, &mentor_name_owned, &mentor_role_owned)
                .await;
        });
        self.inner
            .mentor_timers
            .lock()
            .unwrap()
            .insert(mentor_id.to_string(), handle);

        profile
    }

    /// Withdraw a request before (or after) the mentor answers, cancelling
    /// the pending acceptance timer. Unknown mentors are a no-op.
    pub fn withdraw_mentorship_request(&self, mentor_id: &str) -> UserProfile {
        if let Some(handle) = self.inner.mentor_timers.lock().unwrap().remove(mentor_id) {
            handle.abort();
        }

        let (profile, removed) = {
            let mut state = self.inner.state.lock().unwrap();
            let before = state.profile.mentorship_requests.len();
            state
                .profile
                .mentorship_requests
                .retain(|r| r.mentor_id != mentor_id);
            let removed = state.profile.mentorship_requests.len() != before;
            if removed {
                self.persist_profile(&state.profile);
            }
            (state.profile.clone(), removed)
        };

        if removed {
            self.queue_sync(ProfileMetadata {
                mentorship_requests: Some(profile.mentorship_requests.clone()),
                ..Default::default()
            });
            self.inner
                .notifications
                .push("Request withdrawn.", Severity::Info);
            self.emit(UserEvent::ProfileChanged);
        }
        profile
    }

    async fn accept_mentorship(&self, mentor_id: &str, mentor_name: &str, mentor_role: &str) {
        let interests = self.profile().interests;
        let response = match self
            .inner
            .responder
            .mentor_response(mentor_name, mentor_role, &interests)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("mentor response generation failed: {e}");
                self.inner.mentor_timers.lock().unwrap().remove(mentor_id);
                return;
            }
        };

        let (profile, accepted) = {
            let mut state = self.inner.state.lock().unwrap();
            let accepted = match state
                .profile
                .mentorship_requests
                .iter_mut()
                .find(|r| r.mentor_id == mentor_id && r.status == MentorshipStatus::Pending)
            {
                Some(request) => {
                    request.status = MentorshipStatus::Accepted;
                    request.mentor_response = Some(response);
                    true
                }
                None => false,
            };
            if accepted {
                self.persist_profile(&state.profile);
            }
            (state.profile.clone(), accepted)
        };

        self.inner.mentor_timers.lock().unwrap().remove(mentor_id);
        if !accepted {
            return;
        }

        self.queue_sync(ProfileMetadata {
            mentorship_requests: Some(profile.mentorship_requests.clone()),
            ..Default::default()
        });
        self.inner.notifications.push(
            format!("{mentor_name} accepted your request!"),
            Severity::Success,
        );
        self.add_xp(MENTOR_ACCEPT_XP);
    }

    /// Grant a badge; duplicates by id neither add nor notify.
    pub fn award_badge(&self, badge: Badge) -> UserProfile {
        let (profile, granted) = {
            let mut state = self.inner.state.lock().unwrap();
            if state.profile.badges.iter().any(|b| b.id == badge.id) {
                (state.profile.clone(), None)
            } else {
                let name = badge.name.clone();
                state.profile.badges.push(badge);
                self.persist_profile(&state.profile);
                (state.profile.clone(), Some(name))
            }
        };

        if let Some(name) = granted {
            self.inner
                .notifications
                .push(format!("Credential gained: {name}"), Severity::Success);
            self.queue_sync(ProfileMetadata {
                badges: Some(profile.badges.clone()),
                ..Default::default()
            });
            self.emit(UserEvent::ProfileChanged);
        }
        profile
    }

    /// Shallow-merge preferences; a theme change takes effect immediately.
    pub fn update_preferences(&self, patch: PreferencesPatch) -> UserProfile {
        let (profile, theme_changed) = {
            let mut state = self.inner.state.lock().unwrap();
            state.profile.preferences.apply(&patch);
            let theme_changed = match patch.theme {
                Some(theme) if theme != state.theme => {
                    state.theme = theme;
                    Some(theme)
                }
                _ => None,
            };
            self.persist_profile(&state.profile);
            (state.profile.clone(), theme_changed)
        };

        self.queue_sync(ProfileMetadata {
            preferences: Some(profile.preferences.clone()),
            ..Default::default()
        });
        if let Some(theme) = theme_changed {
            self.emit(UserEvent::ThemeChanged(theme));
        }
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// Flip the active theme.
    pub fn toggle_theme(&self) -> UserProfile {
        let next = self.theme().flipped();
        self.update_preferences(PreferencesPatch {
            theme: Some(next),
            ..Default::default()
        })
    }

    /// Shallow-merge top-level profile fields; only the identity subset
    /// (name, bio, avatar, tagline, role) is mirrored remotely.
    pub fn update_profile(&self, patch: ProfilePatch) -> UserProfile {
        let profile = {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(name) = patch.name {
                state.profile.name = name;
            }
            if let Some(role) = patch.role {
                state.profile.role = role;
            }
            if let Some(avatar) = patch.avatar {
                state.profile.avatar = avatar;
            }
            if let Some(bio) = patch.bio {
                state.profile.bio = Some(bio);
            }
            if let Some(tagline) = patch.tagline {
                state.profile.tagline = Some(tagline);
            }
            if let Some(interests) = patch.interests {
                state.profile.interests = interests;
            }
            self.persist_profile(&state.profile);
            state.profile.clone()
        };

        self.queue_sync(ProfileMetadata {
            full_name: Some(profile.name.clone()),
            bio: profile.bio.clone(),
            avatar: Some(profile.avatar.clone()),
            tagline: profile.tagline.clone(),
            role: Some(profile.role),
            ..Default::default()
        });
        self.emit(UserEvent::ProfileChanged);
        profile
    }

    /// Toggle an event in the saved list; returns whether it is now saved.
    pub fn toggle_save_event(&self, event_id: &str) -> bool {
        let (ids, saved) = {
            let mut state = self.inner.state.lock().unwrap();
            let saved = if state.saved_event_ids.iter().any(|id| id == event_id) {
                state.saved_event_ids.retain(|id| id != event_id);
                false
            } else {
                state.saved_event_ids.push(event_id.to_string());
                true
            };
            self.inner
                .storage
                .save(SAVED_EVENTS_KEY, &state.saved_event_ids);
            (state.saved_event_ids.clone(), saved)
        };

        self.queue_sync(ProfileMetadata {
            saved_event_ids: Some(ids),
            ..Default::default()
        });
        self.emit(UserEvent::EventsChanged);
        saved
    }

    /// Toggle event registration; registering grants XP, releasing a seat
    /// only notifies. Returns whether the user is now registered.
    pub fn toggle_register_event(&self, event_id: &str, event_title: &str) -> bool {
        let (ids, registered) = {
            let mut state = self.inner.state.lock().unwrap();
            let registered = if state.registered_event_ids.iter().any(|id| id == event_id) {
                state.registered_event_ids.retain(|id| id != event_id);
                false
            } else {
                state.registered_event_ids.push(event_id.to_string());
                true
            };
            self.inner
                .storage
                .save(REGISTERED_EVENTS_KEY, &state.registered_event_ids);
            (state.registered_event_ids.clone(), registered)
        };

        self.queue_sync(ProfileMetadata {
            registered_event_ids: Some(ids),
            ..Default::default()
        });
        self.emit(UserEvent::EventsChanged);

        if registered {
            self.inner.notifications.push(
                format!("Registered for {event_title}! +{EVENT_REGISTER_XP} XP"),
                Severity::Success,
            );
            self.add_xp(EVENT_REGISTER_XP);
        } else {
            self.inner.notifications.push(
                format!("Seat released for {event_title}."),
                Severity::Info,
            );
        }
        registered
    }

    // --- Lifecycle ---

    /// Merge the remote metadata bag over the local profile (remote wins
    /// where present) and persist everything.
    pub fn hydrate(&self, user: &AuthUser) {
        let meta = &user.user_metadata;
        let theme_changed = {
            let mut guard = self.inner.state.lock().unwrap();
            let state = &mut *guard;
            let profile = &mut state.profile;
            profile.id = Some(user.id.clone());
            if let Some(name) = &meta.full_name {
                profile.name = name.clone();
            }
            if let Some(role) = meta.role {
                profile.role = role;
            }
            if let Some(interests) = &meta.interests {
                profile.interests = interests.clone();
            }
            if let Some(xp) = meta.xp {
                profile.xp = xp;
            }
            if let Some(level) = meta.level {
                profile.level = level;
            }
            if let Some(threshold) = meta.xp_to_next_level {
                profile.xp_to_next_level = threshold;
            }
            if let Some(badges) = &meta.badges {
                profile.badges = badges.clone();
            }
            if let Some(avatar) = &meta.avatar {
                profile.avatar = avatar.clone();
            }
            if let Some(tagline) = &meta.tagline {
                profile.tagline = Some(tagline.clone());
            }
            if let Some(courses) = &meta.enrolled_courses {
                profile.enrolled_courses = courses.clone();
            }
            if let Some(socials) = &meta.social_profiles {
                profile.social_profiles = socials.clone();
            }
            if let Some(experience) = &meta.experience {
                profile.experience = experience.clone();
            }
            if let Some(requests) = &meta.mentorship_requests {
                profile.mentorship_requests = requests.clone();
            }
            if let Some(pitches) = &meta.pitches {
                profile.pitches = pitches.clone();
            }
            if let Some(bio) = &meta.bio {
                profile.bio = Some(bio.clone());
            }
            if let Some(preferences) = &meta.preferences {
                profile.preferences = preferences.clone();
            }
            let hydrated_theme = profile.preferences.theme;

            let theme_changed = if hydrated_theme != state.theme {
                state.theme = hydrated_theme;
                Some(hydrated_theme)
            } else {
                None
            };

            if let Some(saved) = &meta.saved_event_ids {
                state.saved_event_ids = saved.clone();
                self.inner
                    .storage
                    .save(SAVED_EVENTS_KEY, &state.saved_event_ids);
            }
            if let Some(registered) = &meta.registered_event_ids {
                state.registered_event_ids = registered.clone();
                self.inner
                    .storage
                    .save(REGISTERED_EVENTS_KEY, &state.registered_event_ids);
            }
            self.persist_profile(&state.profile);
            theme_changed
        };

        if let Some(theme) = theme_changed {
            self.emit(UserEvent::ThemeChanged(theme));
        }
        self.emit(UserEvent::ProfileChanged);
    }

    /// Replace everything with the guest defaults and clear the storage keys
    /// (sign-out path). Pending mentor timers are cancelled.
    pub fn reset(&self) {
        for (_, handle) in self.inner.mentor_timers.lock().unwrap().drain() {
            handle.abort();
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            state.profile = UserProfile::guest();
            state.saved_event_ids.clear();
            state.registered_event_ids.clear();
            state.last_xp_gain = None;
            state.theme = state.profile.preferences.theme;
        }
        self.inner.storage.remove(PROFILE_KEY);
        self.inner.storage.remove(SAVED_EVENTS_KEY);
        self.inner.storage.remove(REGISTERED_EVENTS_KEY);
        self.emit(UserEvent::SignedOut);
    }

    /// Flush any pending cloud patch immediately.
    pub async fn flush_sync(&self) {
        self.inner.sync.flush_now().await;
    }

    // --- Internals ---

    fn persist_profile(&self, profile: &UserProfile) {
        self.inner.storage.save(PROFILE_KEY, profile);
    }

    fn queue_sync(&self, patch: ProfileMetadata) {
        self.inner.sync.queue(patch);
    }

    fn emit(&self, event: UserEvent) {
        let _ = self.inner.events.send(event);
    }

    fn flash_xp(&self) {
        let mut timer = self.inner.xp_flash_timer.lock().unwrap();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        let store = self.clone();
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(XP_FLASH_TTL).await;
            store.inner.state.lock().unwrap().last_xp_gain = None;
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ProfileRemote;

    #[derive(Default)]
    struct RecordingRemote {
        writes: Mutex<Vec<ProfileMetadata>>,
    }

    #[async_trait]
    impl ProfileRemote for RecordingRemote {
        async fn update_user_metadata(&self, data: &ProfileMetadata) -> Result<(), ApiError> {
            self.writes.lock().unwrap().push(data.clone());
            Ok(())
        }
    }

    struct StubResponder;

    #[async_trait]
    impl MentorResponder for StubResponder {
        async fn mentor_response(
            &self,
            mentor_name: &str,
            _mentor_role: &str,
            _interests: &[String],
        ) -> Result<String, ApiError> {
            Ok(format!("Happy to help! -{mentor_name}"))
        }
    }

    fn scratch_storage() -> Storage {
        Storage::open(
            std::env::temp_dir()
                .join("campusnet-tests")
                .join(uuid::Uuid::new_v4().to_string()),
        )
    }

    fn test_store() -> (UserStore, Arc<RecordingRemote>, NotificationQueue) {
        let remote = Arc::new(RecordingRemote::default());
        let sync = CloudSync::new(remote.clone());
        let notifications = NotificationQueue::new();
        let store = UserStore::new(
            scratch_storage(),
            sync,
            notifications.clone(),
            Arc::new(StubResponder),
        );
        (store, remote, notifications)
    }

    #[tokio::test(start_paused = true)]
    async fn xp_ladder_matches_the_expected_progression() {
        let (store, _, _) = test_store();

        let profile = store.add_xp(1000);
        assert_eq!((profile.level, profile.xp, profile.xp_to_next_level), (2, 0, 1200));

        store.add_xp(150);
        let profile = store.add_xp(150);
        assert_eq!((profile.level, profile.xp, profile.xp_to_next_level), (2, 300, 1200));
    }

    #[tokio::test(start_paused = true)]
    async fn level_up_emits_a_success_toast() {
        let (store, _, notifications) = test_store();
        store.add_xp(999);
        assert!(notifications.snapshot().is_empty());

        store.add_xp(1);
        let toasts = notifications.snapshot();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].severity, Severity::Success);
        assert!(toasts[0].message.contains("Level 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn last_xp_gain_clears_after_two_seconds() {
        let (store, _, _) = test_store();
        store.add_xp(50);
        assert_eq!(store.last_xp_gain(), Some(50));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(store.last_xp_gain(), None);
    }

    fn sample_course(id: &str) -> NewCourse {
        NewCourse {
            id: id.to_string(),
            title: "Intro to Systems".to_string(),
            provider: "Example U".to_string(),
            link: "https://example.edu/systems".to_string(),
            domain: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn enrolling_twice_keeps_one_entry() {
        let (store, _, _) = test_store();
        store.enroll_course(sample_course("c-1"));
        let profile = store.enroll_course(sample_course("c-1"));

        assert_eq!(profile.enrolled_courses.len(), 1);
        assert_eq!(profile.enrolled_courses[0].status, CourseStatus::Enrolled);
    }

    #[tokio::test(start_paused = true)]
    async fn completing_a_course_is_terminal_and_unknown_ids_are_noops() {
        let (store, _, _) = test_store();
        store.enroll_course(sample_course("c-1"));

        let profile = store.complete_course("c-1");
        assert_eq!(profile.enrolled_courses[0].status, CourseStatus::Completed);

        let profile = store.complete_course("missing");
        assert_eq!(profile.enrolled_courses.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_mentor_request_warns_and_keeps_one() {
        let (store, _, notifications) = test_store();
        store.send_mentorship_request("m-1", "Dana Mentor", "CTO");
        let profile = store.send_mentorship_request("m-1", "Dana Mentor", "CTO");

        assert_eq!(profile.mentorship_requests.len(), 1);
        let toasts = notifications.snapshot();
        assert_eq!(toasts[0].severity, Severity::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn mentor_accepts_after_the_delay_and_grants_xp() {
        let (store, _, _) = test_store();
        store.send_mentorship_request("m-1", "Dana Mentor", "CTO");
        assert_eq!(
            store.profile().mentorship_requests[0].status,
            MentorshipStatus::Pending
        );

        tokio::time::sleep(Duration::from_millis(5200)).await;

        let profile = store.profile();
        let request = &profile.mentorship_requests[0];
        assert_eq!(request.status, MentorshipStatus::Accepted);
        assert!(request.mentor_response.as_deref().unwrap().contains("Dana"));
        assert_eq!(profile.xp, MENTOR_ACCEPT_XP);
    }

    #[tokio::test(start_paused = true)]
    async fn withdrawing_cancels_the_acceptance_timer() {
        let (store, _, _) = test_store();
        store.send_mentorship_request("m-1", "Dana Mentor", "CTO");
        let profile = store.withdraw_mentorship_request("m-1");
        assert!(profile.mentorship_requests.is_empty());

        tokio::time::sleep(Duration::from_millis(6000)).await;
        let profile = store.profile();
        assert!(profile.mentorship_requests.is_empty());
        assert_eq!(profile.xp, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn badge_award_is_idempotent_with_a_single_toast() {
        let (store, _, notifications) = test_store();
        let badge = Badge {
            id: "b-1".to_string(),
            name: "First Post".to_string(),
            icon: "star".to_string(),
            color: "gold".to_string(),
            description: "Shared a first post".to_string(),
            issuer: None,
            image_url: None,
            url: None,
        };

        store.award_badge(badge.clone());
        let profile = store.award_badge(badge);

        assert_eq!(profile.badges.len(), 1);
        assert_eq!(notifications.snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn theme_in_a_preferences_patch_applies_immediately() {
        let (store, _, _) = test_store();
        assert_eq!(store.theme(), Theme::Dark);

        let mut events = store.subscribe();
        store.update_preferences(PreferencesPatch {
            theme: Some(Theme::Light),
            ..Default::default()
        });

        assert_eq!(store.theme(), Theme::Light);
        assert_eq!(events.recv().await.unwrap(), UserEvent::ThemeChanged(Theme::Light));
    }

    #[tokio::test(start_paused = true)]
    async fn registering_for_an_event_grants_xp_once() {
        let (store, _, _) = test_store();
        assert!(store.toggle_register_event("evt-1", "Hack Night"));
        assert_eq!(store.profile().xp, EVENT_REGISTER_XP);

        // releasing the seat grants nothing back
        assert!(!store.toggle_register_event("evt-1", "Hack Night"));
        assert_eq!(store.profile().xp, EVENT_REGISTER_XP);
        assert!(store.registered_event_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_mutations_syncs_as_one_union_write() {
        let (store, remote, _) = test_store();
        store.add_xp(100);
        store.update_interests(vec!["ai".to_string()]);
        store.update_profile(ProfilePatch {
            tagline: Some("Builder".to_string()),
            ..Default::default()
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let writes = remote.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        let write = &writes[0];
        assert_eq!(write.xp, Some(100));
        assert_eq!(write.interests.as_deref(), Some(&["ai".to_string()][..]));
        assert_eq!(write.tagline.as_deref(), Some("Builder"));
    }

    #[tokio::test(start_paused = true)]
    async fn hydrate_prefers_remote_fields_and_reset_restores_the_guest() {
        let (store, _, _) = test_store();
        let user = AuthUser {
            id: "u-1".to_string(),
            email: Some("avery@example.edu".to_string()),
            user_metadata: ProfileMetadata {
                full_name: Some("Avery Lee".to_string()),
                xp: Some(450),
                level: Some(3),
                saved_event_ids: Some(vec!["evt-9".to_string()]),
                ..Default::default()
            },
        };

        store.hydrate(&user);
        let profile = store.profile();
        assert_eq!(profile.id.as_deref(), Some("u-1"));
        assert_eq!(profile.name, "Avery Lee");
        assert_eq!((profile.level, profile.xp), (3, 450));
        assert_eq!(store.saved_event_ids(), vec!["evt-9".to_string()]);
        // fields absent from the metadata keep their local values
        assert_eq!(profile.tagline.as_deref(), Some("Future Founder"));

        store.reset();
        let profile = store.profile();
        assert_eq!(profile.name, "Guest Innovator");
        assert_eq!(profile.id, None);
        assert!(store.saved_event_ids().is_empty());
    }
}
