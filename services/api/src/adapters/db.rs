//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `ProfileStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use study_aid_core::domain::{
    Concept, Explanations, Flashcard, NewConcept, PlanType, Profile, ReviewStatus, StreakRecord,
    StreakUpdate, User, UserCredentials,
};
use study_aid_core::ports::{DatabaseService, PortError, PortResult, ProfileStore};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` and `ProfileStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn flashcards_for(&self, concept_ids: &[Uuid]) -> PortResult<Vec<Flashcard>> {
        let records = sqlx::query_as::<_, FlashcardRecord>(&format!(
            "SELECT {FLASHCARD_COLUMNS} FROM flashcards WHERE concept_id = ANY($1) \
             ORDER BY created_at ASC, position ASC"
        ))
        .bind(concept_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => unexpected(e),
    }
}

fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    daily_usage_count: i32,
    last_usage_date: Option<NaiveDate>,
    plan_type: String,
    current_streak: i32,
    longest_streak: i32,
    last_activity_date: Option<NaiveDate>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.id,
            daily_usage_count: to_count(self.daily_usage_count),
            last_usage_date: self.last_usage_date,
            plan_type: PlanType::parse(&self.plan_type),
            streak: StreakRecord {
                current_streak: to_count(self.current_streak),
                longest_streak: to_count(self.longest_streak),
                last_activity_date: self.last_activity_date,
            },
        }
    }
}

const PROFILE_COLUMNS: &str = "id, daily_usage_count, last_usage_date, plan_type, \
     current_streak, longest_streak, last_activity_date";

#[derive(FromRow)]
struct ConceptRecord {
    id: Uuid,
    user_id: Uuid,
    topic: String,
    input_text: Option<String>,
    explanation_simplest: String,
    explanation_standard: String,
    explanation_deep: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConceptRecord {
    fn to_domain(self, flashcards: Vec<Flashcard>) -> Concept {
        Concept {
            id: self.id,
            user_id: self.user_id,
            topic: self.topic,
            input_text: self.input_text,
            explanations: Explanations {
                simplest: self.explanation_simplest,
                standard: self.explanation_standard,
                deep_dive: self.explanation_deep,
            },
            flashcards,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const CONCEPT_COLUMNS: &str = "id, user_id, topic, input_text, explanation_simplest, \
     explanation_standard, explanation_deep, created_at, updated_at";

#[derive(FromRow)]
struct FlashcardRecord {
    id: Uuid,
    concept_id: Uuid,
    user_id: Uuid,
    front_text: String,
    back_text: String,
    review_status: String,
    last_reviewed_at: Option<DateTime<Utc>>,
    next_review_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl FlashcardRecord {
    fn to_domain(self) -> Flashcard {
        let review_status = ReviewStatus::parse(&self.review_status).unwrap_or_else(|| {
            warn!(
                "Flashcard {} has unknown review status '{}'",
                self.id, self.review_status
            );
            ReviewStatus::New
        });
        Flashcard {
            id: self.id,
            concept_id: self.concept_id,
            user_id: self.user_id,
            front: self.front_text,
            back: self.back_text,
            review_status,
            last_reviewed_at: self.last_reviewed_at,
            next_review_at: self.next_review_at,
            created_at: self.created_at,
        }
    }
}

const FLASHCARD_COLUMNS: &str = "id, concept_id, user_id, front_text, back_text, review_status, \
     last_reviewed_at, next_review_at, created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::InvalidInput("An account with this email already exists".to_string())
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_concepts(&self, user_id: Uuid) -> PortResult<Vec<Concept>> {
        let records = sqlx::query_as::<_, ConceptRecord>(&format!(
            "SELECT {CONCEPT_COLUMNS} FROM saved_concepts WHERE user_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut by_concept: HashMap<Uuid, Vec<Flashcard>> = HashMap::new();
        for card in self.flashcards_for(&ids).await? {
            by_concept.entry(card.concept_id).or_default().push(card);
        }

        Ok(records
            .into_iter()
            .map(|r| {
                let cards = by_concept.remove(&r.id).unwrap_or_default();
                r.to_domain(cards)
            })
            .collect())
    }

    async fn get_concept(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<Concept> {
        let record = sqlx::query_as::<_, ConceptRecord>(&format!(
            "SELECT {CONCEPT_COLUMNS} FROM saved_concepts WHERE id = $1 AND user_id = $2"
        ))
        .bind(concept_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Concept {} not found", concept_id)))?;

        let cards = self.flashcards_for(&[concept_id]).await?;
        Ok(record.to_domain(cards))
    }

    async fn save_concept(&self, user_id: Uuid, concept: NewConcept) -> PortResult<Concept> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, ConceptRecord>(&format!(
            "INSERT INTO saved_concepts \
             (id, user_id, topic, input_text, explanation_simplest, explanation_standard, explanation_deep) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CONCEPT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&concept.topic)
        .bind(&concept.input_text)
        .bind(&concept.explanations.simplest)
        .bind(&concept.explanations.standard)
        .bind(&concept.explanations.deep_dive)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let mut flashcards = Vec::with_capacity(concept.flashcards.len());
        for (position, draft) in concept.flashcards.iter().enumerate() {
            let card = sqlx::query_as::<_, FlashcardRecord>(&format!(
                "INSERT INTO flashcards (id, concept_id, user_id, front_text, back_text, position) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {FLASHCARD_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(record.id)
            .bind(user_id)
            .bind(&draft.front)
            .bind(&draft.back)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
            flashcards.push(card.to_domain());
        }

        // Dropping the transaction on an early return rolls back the concept.
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain(flashcards))
    }

    async fn delete_concept(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM saved_concepts WHERE id = $1 AND user_id = $2")
            .bind(concept_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Concept {} not found", concept_id)));
        }
        Ok(())
    }

    async fn list_flashcards(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<Vec<Flashcard>> {
        let records = sqlx::query_as::<_, FlashcardRecord>(&format!(
            "SELECT {FLASHCARD_COLUMNS} FROM flashcards WHERE concept_id = $1 AND user_id = $2 \
             ORDER BY created_at ASC, position ASC"
        ))
        .bind(concept_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_flashcard_status(
        &self,
        user_id: Uuid,
        flashcard_id: Uuid,
        status: ReviewStatus,
        reviewed_at: DateTime<Utc>,
    ) -> PortResult<Flashcard> {
        let record = sqlx::query_as::<_, FlashcardRecord>(&format!(
            "UPDATE flashcards SET review_status = $1, last_reviewed_at = $2, next_review_at = $3 \
             WHERE id = $4 AND user_id = $5 RETURNING {FLASHCARD_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(reviewed_at)
        .bind(status.next_review_at(reviewed_at))
        .bind(flashcard_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Flashcard {} not found", flashcard_id)))?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        sqlx::query("INSERT INTO profiles (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Profile {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn set_daily_usage(&self, user_id: Uuid, count: u32, date: NaiveDate) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, daily_usage_count, last_usage_date) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE \
             SET daily_usage_count = EXCLUDED.daily_usage_count, \
                 last_usage_date = EXCLUDED.last_usage_date",
        )
        .bind(user_id)
        .bind(to_column(count))
        .bind(date)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn record_activity(&self, user_id: Uuid, today: NaiveDate) -> PortResult<StreakUpdate> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("INSERT INTO profiles (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        // Row lock serialises concurrent activity for the same user.
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let (next, update) = record.to_domain().streak.advance(today);

        sqlx::query(
            "UPDATE profiles SET current_streak = $1, longest_streak = $2, last_activity_date = $3 \
             WHERE id = $4",
        )
        .bind(to_column(next.current_streak))
        .bind(to_column(next.longest_streak))
        .bind(next.last_activity_date)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(update)
    }
}
