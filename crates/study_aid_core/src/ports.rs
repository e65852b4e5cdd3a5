//! crates/study_aid_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Concept, Explanations, Flashcard, FlashcardDraft, NewConcept, Profile, ReviewStatus,
    StreakUpdate, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The free daily quota is used up. Expected, routes to an upgrade prompt.
    #[error("Daily limit reached")]
    LimitExceeded,
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Payment required: {0}")]
    PaymentRequired(String),
    #[error("Service temporarily unavailable: {0}")]
    Transient(String),
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Concept Library ---
    /// Newest first.
    async fn list_concepts(&self, user_id: Uuid) -> PortResult<Vec<Concept>>;

    async fn get_concept(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<Concept>;

    /// Saves the concept and its flashcards atomically.
    async fn save_concept(&self, user_id: Uuid, concept: NewConcept) -> PortResult<Concept>;

    /// Removes the concept and, by cascade, its flashcards.
    async fn delete_concept(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<()>;

    // --- Flashcards ---
    /// Oldest first.
    async fn list_flashcards(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<Vec<Flashcard>>;

    async fn update_flashcard_status(
        &self,
        user_id: Uuid,
        flashcard_id: Uuid,
        status: ReviewStatus,
        reviewed_at: DateTime<Utc>,
    ) -> PortResult<Flashcard>;
}

/// The server-held usage and streak record, one per user.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Creates the profile if it does not exist yet and returns it.
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn set_daily_usage(&self, user_id: Uuid, count: u32, date: NaiveDate)
        -> PortResult<()>;

    /// Atomically records activity for `today`. Idempotent per calendar day.
    async fn record_activity(&self, user_id: Uuid, today: NaiveDate) -> PortResult<StreakUpdate>;
}

#[async_trait]
pub trait ExplanationGenerationService: Send + Sync {
    /// Produces the three explanation depths for a topic.
    async fn generate_explanations(&self, topic: &str) -> PortResult<Explanations>;
}

#[async_trait]
pub trait FlashcardGenerationService: Send + Sync {
    /// Generates a small deck of flashcards from an explanation of a topic.
    async fn generate_flashcards(
        &self,
        topic: &str,
        explanation: &str,
    ) -> PortResult<Vec<FlashcardDraft>>;
}

/// Supplies the current calendar day. All usage and streak comparisons are
/// made at day granularity.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
