//! crates/study_aid_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

/// Who a request is acting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(Uuid),
}

impl Viewer {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

//=========================================================================================
// Explanations
//=========================================================================================

/// One of the three presentation tiers generated for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExplanationLevel {
    Simplest,
    Standard,
    DeepDive,
}

impl ExplanationLevel {
    pub const ALL: [ExplanationLevel; 3] = [
        ExplanationLevel::Simplest,
        ExplanationLevel::Standard,
        ExplanationLevel::DeepDive,
    ];
}

/// The three raw explanation texts produced for one topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanations {
    pub simplest: String,
    pub standard: String,
    pub deep_dive: String,
}

impl Explanations {
    pub fn get(&self, level: ExplanationLevel) -> &str {
        match level {
            ExplanationLevel::Simplest => &self.simplest,
            ExplanationLevel::Standard => &self.standard,
            ExplanationLevel::DeepDive => &self.deep_dive,
        }
    }
}

//=========================================================================================
// Concepts & Flashcards
//=========================================================================================

/// Review progress of a single flashcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::New => "new",
            ReviewStatus::Learning => "learning",
            ReviewStatus::Mastered => "mastered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(ReviewStatus::New),
            "learning" => Some(ReviewStatus::Learning),
            "mastered" => Some(ReviewStatus::Mastered),
            _ => None,
        }
    }

    /// When a card reviewed at `now` with this status should come up again.
    ///
    /// Stored alongside the card; nothing schedules on it yet.
    pub fn next_review_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ReviewStatus::New => None,
            ReviewStatus::Learning => Some(now + Duration::days(1)),
            ReviewStatus::Mastered => Some(now + Duration::days(7)),
        }
    }
}

/// A front/back pair before it is attached to a saved concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

impl FlashcardDraft {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}

/// A flashcard saved in a user's library.
#[derive(Debug, Clone)]
pub struct Flashcard {
    pub id: Uuid,
    pub concept_id: Uuid,
    pub user_id: Uuid,
    pub front: String,
    pub back: String,
    pub review_status: ReviewStatus,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The payload needed to save a concept, with its deck, into a user's library.
#[derive(Debug, Clone)]
pub struct NewConcept {
    pub topic: String,
    pub input_text: Option<String>,
    pub explanations: Explanations,
    /// Saved in this order, all or nothing with the concept.
    pub flashcards: Vec<FlashcardDraft>,
}

/// A topic plus its explanations and flashcards, owned by a user once saved.
#[derive(Debug, Clone)]
pub struct Concept {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub input_text: Option<String>,
    pub explanations: Explanations,
    pub flashcards: Vec<Flashcard>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Profiles, Usage & Streaks
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanType {
    #[default]
    Free,
    Premium,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Premium => "premium",
        }
    }

    /// Anything other than `premium` is treated as the free tier.
    pub fn parse(value: &str) -> Self {
        if value == "premium" {
            PlanType::Premium
        } else {
            PlanType::Free
        }
    }
}

/// The server-held per-user record for usage counters and streaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    pub daily_usage_count: u32,
    pub last_usage_date: Option<NaiveDate>,
    pub plan_type: PlanType,
    pub streak: StreakRecord,
}

impl Profile {
    /// A fresh free-tier profile with no usage and no streak.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            daily_usage_count: 0,
            last_usage_date: None,
            plan_type: PlanType::Free,
            streak: StreakRecord::default(),
        }
    }

    pub fn is_premium(&self) -> bool {
        self.plan_type == PlanType::Premium
    }
}

/// A per-day generation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub count: u32,
    pub date: NaiveDate,
}

impl UsageRecord {
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            count: 0,
            date: today,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
}

/// The result of recording a day's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub streak: u32,
    pub longest: u32,
    pub increased: bool,
    pub is_new_streak: bool,
}
