use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);
    };
}

id_newtype!(ChatId);
id_newtype!(MessageId);

pub const MAX_PROFILE_PHOTOS: usize = 6;
pub const DEFAULT_AGE: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPreference {
    #[default]
    Anyone,
    Men,
    Women,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Me,
    Them,
}

/// Bottom-navigation surface selected while the home screen is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeTab {
    Home,
    Match,
    Coins,
    Chat,
    Profile,
}

/// The signed-in user's profile as accepted by onboarding.
///
/// Construction goes through [`ProfileDraft::validate`]; a `Profile` value
/// always satisfies the username/photo-count constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub photos: Vec<String>,
    pub bio: String,
    pub interests: Vec<String>,
    pub match_preference: MatchPreference,
    pub age: u8,
}

/// Unvalidated onboarding input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub username: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub match_preference: MatchPreference,
    #[serde(default)]
    pub age: Option<u8>,
}

impl ProfileDraft {
    pub fn validate(self) -> Result<Profile, SessionError> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(SessionError::Validation(
                "username must not be empty".into(),
            ));
        }
        if self.photos.len() > MAX_PROFILE_PHOTOS {
            return Err(SessionError::Validation(format!(
                "at most {MAX_PROFILE_PHOTOS} photos allowed, got {}",
                self.photos.len()
            )));
        }

        // Interests behave as a set but keep the order the user entered them in.
        let mut interests: Vec<String> = Vec::with_capacity(self.interests.len());
        for interest in self.interests {
            let interest = interest.trim().to_string();
            if !interest.is_empty() && !interests.contains(&interest) {
                interests.push(interest);
            }
        }

        Ok(Profile {
            username,
            photos: self.photos,
            bio: self.bio,
            interests,
            match_preference: self.match_preference,
            age: self.age.unwrap_or(DEFAULT_AGE),
        })
    }
}

impl From<Profile> for ProfileDraft {
    fn from(profile: Profile) -> Self {
        Self {
            username: profile.username,
            photos: profile.photos,
            bio: profile.bio,
            interests: profile.interests,
            match_preference: profile.match_preference,
            age: Some(profile.age),
        }
    }
}

/// The matched user's profile as delivered by the matchmaking service and
/// shown during/after a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub username: String,
    pub age: u8,
    pub photos: Vec<String>,
    pub bio: String,
    pub interests: Vec<String>,
    pub distance_km: u32,
    pub shared_interest_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// A chat thread with one partner. Append-only; messages are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatThread {
    pub partner_name: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub unread: u32,
}

impl ChatThread {
    pub fn new(partner_name: impl Into<String>) -> Self {
        Self {
            partner_name: partner_name.into(),
            messages: Vec::new(),
            unread: 0,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Message ids are sequential within a thread.
    pub fn next_message_id(&self) -> MessageId {
        MessageId(self.messages.len() as i64 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinPack {
    Starter,
    Plus,
    Mega,
}

impl CoinPack {
    pub fn coins(self) -> u32 {
        match self {
            CoinPack::Starter => 50,
            CoinPack::Plus => 150,
            CoinPack::Mega => 400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumPlan {
    Weekly,
    Monthly,
    Yearly,
}
