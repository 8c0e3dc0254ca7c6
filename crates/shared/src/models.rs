//! Shared data models for the campusnet platform boundary and client state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    Student,
    School,
    Mentor,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn flipped(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub theme: Theme,
    pub notifications_enabled: bool,
    pub public_profile: bool,
    pub marketing_emails: bool,
    pub compact_mode: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            notifications_enabled: true,
            public_profile: true,
            marketing_emails: false,
            compact_mode: false,
        }
    }
}

/// Partial preferences update, merged shallowly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_profile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing_emails: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact_mode: Option<bool>,
}

impl UserPreferences {
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(v) = patch.notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = patch.public_profile {
            self.public_profile = v;
        }
        if let Some(v) = patch.marketing_emails {
            self.marketing_emails = v;
        }
        if let Some(v) = patch.compact_mode {
            self.compact_mode = v;
        }
    }
}

// --- Profile collections ---

/// A credential badge; badge sets are unique by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfile {
    pub platform: String,
    pub url: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Enrolled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub id: String,
    pub title: String,
    pub provider: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub status: CourseStatus,
    pub enrolled_at: DateTime<Utc>,
}

/// Enrollment input; status and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub id: String,
    pub title: String,
    pub provider: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub company: String,
    pub role: String,
    pub duration: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentorshipStatus {
    Pending,
    Accepted,
    Declined,
}

/// At most one request exists per (user, mentor) pair. Pending transitions
/// to Accepted via the simulated mentor response; Accepted and Declined are
/// terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipRequest {
    pub id: String,
    pub mentor_id: String,
    pub mentor_name: String,
    pub status: MentorshipStatus,
    pub request_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentor_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VentureAnalysis {
    pub id: String,
    pub concept: String,
    pub analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_url: Option<String>,
    pub date: DateTime<Utc>,
}

// --- User profile ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub role: UserRole,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
    #[serde(default)]
    pub interests: Vec<String>,
    pub avatar: String,
    #[serde(default)]
    pub badges: Vec<Badge>,
    #[serde(default)]
    pub enrolled_courses: Vec<EnrolledCourse>,
    #[serde(default)]
    pub social_profiles: Vec<SocialProfile>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub mentorship_requests: Vec<MentorshipRequest>,
    #[serde(default)]
    pub pitches: Vec<VentureAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

/// XP needed to leave level 1.
pub const BASE_XP_THRESHOLD: u32 = 1000;

impl UserProfile {
    /// The signed-out default profile.
    pub fn guest() -> Self {
        Self {
            id: None,
            name: "Guest Innovator".to_string(),
            role: UserRole::Student,
            level: 1,
            xp: 0,
            xp_to_next_level: BASE_XP_THRESHOLD,
            interests: Vec::new(),
            avatar: "https://api.dicebear.com/7.x/avataaars/svg?seed=guest".to_string(),
            badges: Vec::new(),
            enrolled_courses: Vec::new(),
            social_profiles: vec![
                SocialProfile {
                    platform: "GitHub".to_string(),
                    url: String::new(),
                    icon: "code".to_string(),
                },
                SocialProfile {
                    platform: "LinkedIn".to_string(),
                    url: String::new(),
                    icon: "work".to_string(),
                },
                SocialProfile {
                    platform: "Portfolio".to_string(),
                    url: String::new(),
                    icon: "language".to_string(),
                },
            ],
            experience: Vec::new(),
            mentorship_requests: Vec::new(),
            pitches: Vec::new(),
            bio: None,
            tagline: Some("Future Founder".to_string()),
            preferences: UserPreferences::default(),
        }
    }

    /// Add XP, rolling over level boundaries until `xp < xp_to_next_level`
    /// holds again. The threshold grows by x1.2 (floored) per level.
    /// Returns the number of levels gained.
    pub fn grant_xp(&mut self, amount: u32) -> u32 {
        let before = self.level;
        self.xp = self.xp.saturating_add(amount);
        while self.xp >= self.xp_to_next_level {
            self.xp -= self.xp_to_next_level;
            self.level += 1;
            self.xp_to_next_level = (u64::from(self.xp_to_next_level) * 6 / 5) as u32;
        }
        self.level - before
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::guest()
    }
}

/// Partial top-level profile update, merged shallowly. Only the identity
/// subset (name, bio, avatar, tagline, role) is mirrored remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
}

// --- Remote metadata mirror ---

/// The user-metadata bag mirrored to the auth platform. Every field is
/// optional so the same type serves as the accumulating patch buffer for the
/// debounced cloud sync: absent fields are untouched, present fields win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(
        default,
        rename = "xpToNextLevel",
        skip_serializing_if = "Option::is_none"
    )]
    pub xp_to_next_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<Vec<Badge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrolled_courses: Option<Vec<EnrolledCourse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_profiles: Option<Vec<SocialProfile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<Vec<Experience>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentorship_requests: Option<Vec<MentorshipRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitches: Option<Vec<VentureAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<UserPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_event_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_event_ids: Option<Vec<String>>,
}

impl ProfileMetadata {
    /// Field-wise merge; fields present in `newer` replace ours.
    pub fn merge(&mut self, newer: ProfileMetadata) {
        macro_rules! take {
            ($field:ident) => {
                if newer.$field.is_some() {
                    self.$field = newer.$field;
                }
            };
        }
        take!(full_name);
        take!(role);
        take!(interests);
        take!(xp);
        take!(level);
        take!(xp_to_next_level);
        take!(badges);
        take!(avatar);
        take!(tagline);
        take!(enrolled_courses);
        take!(social_profiles);
        take!(experience);
        take!(mentorship_requests);
        take!(pitches);
        take!(bio);
        take!(preferences);
        take!(saved_event_ids);
        take!(registered_event_ids);
    }

    pub fn is_empty(&self) -> bool {
        *self == ProfileMetadata::default()
    }
}

// --- Auth/session boundary ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: ProfileMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

// --- Relational boundary ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteKind {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: VoteKind,
}

/// A row of the posts set, with votes embedded by the select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flair: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    pub user_id: String,
    pub author_name: String,
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flair: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: String,
    pub user_id: String,
    pub author_name: String,
    pub avatar_url: String,
    pub content: String,
}

/// Unique per (post, user); the backend upserts on that conflict key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVote {
    pub post_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: VoteKind,
}

// --- Realtime ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RealtimeCommand {
    Subscribe { table: String },
    Unsubscribe { table: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RealtimeEvent {
    /// Something in `table` changed; clients refetch what they watch.
    Change {
        table: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xp_rolls_over_and_threshold_grows() {
        let mut profile = UserProfile::guest();
        assert_eq!((profile.level, profile.xp, profile.xp_to_next_level), (1, 0, 1000));

        let gained = profile.grant_xp(1000);
        assert_eq!(gained, 1);
        assert_eq!((profile.level, profile.xp, profile.xp_to_next_level), (2, 0, 1200));

        profile.grant_xp(150);
        profile.grant_xp(150);
        assert_eq!((profile.level, profile.xp, profile.xp_to_next_level), (2, 300, 1200));
    }

    #[test]
    fn oversized_grant_levels_repeatedly() {
        let mut profile = UserProfile::guest();
        let gained = profile.grant_xp(2500);
        // 2500 -> level 2 (rem 1500, threshold 1200) -> level 3 (rem 300)
        assert_eq!(gained, 2);
        assert_eq!((profile.level, profile.xp, profile.xp_to_next_level), (3, 300, 1440));
    }

    #[test]
    fn metadata_merge_keeps_untouched_fields() {
        let mut buffer = ProfileMetadata {
            xp: Some(10),
            bio: Some("early".to_string()),
            ..Default::default()
        };
        buffer.merge(ProfileMetadata {
            xp: Some(25),
            tagline: Some("Builder".to_string()),
            ..Default::default()
        });

        assert_eq!(buffer.xp, Some(25));
        assert_eq!(buffer.bio.as_deref(), Some("early"));
        assert_eq!(buffer.tagline.as_deref(), Some("Builder"));
        assert!(!buffer.is_empty());
    }

    #[test]
    fn metadata_wire_names_match_the_platform() {
        let patch = ProfileMetadata {
            full_name: Some("Avery".to_string()),
            xp_to_next_level: Some(1200),
            enrolled_courses: Some(Vec::new()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["full_name"], "Avery");
        assert_eq!(json["xpToNextLevel"], 1200);
        assert!(json["enrolled_courses"].is_array());
        assert!(json.get("badges").is_none());
    }

    #[test]
    fn vote_kind_uses_upper_case_wire_values() {
        let vote = NewVote {
            post_id: "p-1".to_string(),
            user_id: "u-1".to_string(),
            kind: VoteKind::Up,
        };
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["type"], "UP");
    }
}
