//! crates/study_aid_core/src/service.rs
//!
//! The study workflow: quota reconciliation, explanation generation, streak
//! bookkeeping and flashcard generation, sequenced over the ports.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Explanations, ExplanationLevel, FlashcardDraft, StreakUpdate, UsageRecord, Viewer,
};
use crate::parser::{parse_explanation, ParsedExplanation};
use crate::ports::{
    Clock, ExplanationGenerationService, FlashcardGenerationService, PortError, PortResult,
    ProfileStore,
};
use crate::streak::{is_active_today, milestone_for};
use crate::usage::{self, UsageStatus, UsageWrite};

/// Longest accepted topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 2000;

/// Parsed outlines of the three explanation levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLevels {
    pub simplest: ParsedExplanation,
    pub standard: ParsedExplanation,
    pub deep_dive: ParsedExplanation,
}

impl ParsedLevels {
    pub fn from_explanations(explanations: &Explanations) -> Self {
        let [simplest, standard, deep_dive] =
            ExplanationLevel::ALL.map(|level| parse_explanation(explanations.get(level)));
        Self {
            simplest,
            standard,
            deep_dive,
        }
    }
}

/// A freshly generated concept, not yet saved to any library.
#[derive(Debug, Clone)]
pub struct DraftConcept {
    pub id: Uuid,
    pub topic: String,
    pub explanations: Explanations,
    pub parsed: ParsedLevels,
}

#[derive(Debug, Clone)]
pub struct GeneratedExplanation {
    pub concept: DraftConcept,
    /// Quota after this generation was counted.
    pub usage: UsageStatus,
    /// The anonymous usage record the caller must persist.
    pub local: UsageRecord,
    pub streak: Option<StreakUpdate>,
    /// Set when this generation pushed the streak onto a milestone.
    pub milestone: Option<u32>,
}

#[derive(Debug)]
pub enum GenerationOutcome {
    Completed(Box<GeneratedExplanation>),
    /// The requester went away before the response arrived. Usage was still
    /// counted; nothing else changed.
    Discarded { local: UsageRecord },
    /// The model call failed after usage was counted. `local` must still be
    /// persisted before `error` is reported.
    Failed { local: UsageRecord, error: PortError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub active_today: bool,
}

pub struct StudyService {
    profiles: Arc<dyn ProfileStore>,
    explainer: Arc<dyn ExplanationGenerationService>,
    flashcards: Arc<dyn FlashcardGenerationService>,
    clock: Arc<dyn Clock>,
}

impl StudyService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        explainer: Arc<dyn ExplanationGenerationService>,
        flashcards: Arc<dyn FlashcardGenerationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            explainer,
            flashcards,
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reads the viewer's quota. Also returns the local record as it should
    /// now be stored, reset if it was from another day.
    pub async fn usage_status(
        &self,
        viewer: Viewer,
        local: UsageRecord,
    ) -> PortResult<(UsageStatus, UsageRecord)> {
        let today = self.clock.today();
        let local = usage::current_local(local, today);
        let profile = match viewer {
            Viewer::User(user_id) => Some(self.profiles.get_or_create_profile(user_id).await?),
            Viewer::Anonymous => None,
        };
        Ok((usage::evaluate(viewer, profile.as_ref(), local, today), local))
    }

    /// Generates the three explanations for a topic.
    ///
    /// The usage write is issued and awaited before the model is called, so a
    /// model failure comes back as `Failed` carrying the consumed local record.
    /// A failed streak update is logged and does not fail the generation.
    pub async fn generate(
        &self,
        viewer: Viewer,
        topic: &str,
        local: UsageRecord,
        cancel: &CancellationToken,
    ) -> PortResult<GenerationOutcome> {
        let topic = validate_topic(topic)?;
        let today = self.clock.today();
        let local = usage::current_local(local, today);

        let profile = match viewer {
            Viewer::User(user_id) => Some(self.profiles.get_or_create_profile(user_id).await?),
            Viewer::Anonymous => None,
        };
        let is_premium = profile.as_ref().is_some_and(|p| p.is_premium());
        let write = usage::plan_generation(viewer, profile.as_ref(), local, today)
            .ok_or(PortError::LimitExceeded)?;

        let (local, usage) = match (viewer, write) {
            (_, UsageWrite::Local(record)) => (record, UsageStatus::new(record.count, false)),
            (
                Viewer::User(user_id),
                UsageWrite::Remote {
                    daily_usage_count,
                    last_usage_date,
                },
            ) => {
                self.profiles
                    .set_daily_usage(user_id, daily_usage_count, last_usage_date)
                    .await?;
                (local, UsageStatus::new(daily_usage_count, is_premium))
            }
            (Viewer::Anonymous, UsageWrite::Remote { .. }) => {
                return Err(PortError::Unexpected(
                    "remote usage write planned for an anonymous viewer".to_string(),
                ))
            }
        };
        info!(
            "Usage counted ({} today, premium: {}). Generating explanations for '{}'.",
            usage.effective_count, usage.is_premium, topic
        );

        let explanations = match self.explainer.generate_explanations(topic).await {
            Ok(explanations) => explanations,
            Err(error) => {
                warn!("Explanation generation for '{}' failed: {:?}", topic, error);
                return Ok(GenerationOutcome::Failed { local, error });
            }
        };

        if cancel.is_cancelled() {
            info!("Generation for '{}' finished after the requester left. Discarding.", topic);
            return Ok(GenerationOutcome::Discarded { local });
        }

        let streak = match viewer {
            Viewer::User(user_id) => match self.profiles.record_activity(user_id, today).await {
                Ok(update) => Some(update),
                Err(e) => {
                    warn!("Failed to record streak activity for {}: {:?}", user_id, e);
                    None
                }
            },
            Viewer::Anonymous => None,
        };
        let milestone = streak.as_ref().and_then(milestone_for);
        if let Some(m) = milestone {
            info!("Streak milestone reached: {} days", m);
        }

        let parsed = ParsedLevels::from_explanations(&explanations);
        Ok(GenerationOutcome::Completed(Box::new(GeneratedExplanation {
            concept: DraftConcept {
                id: Uuid::new_v4(),
                topic: topic.to_string(),
                explanations,
                parsed,
            },
            usage,
            local,
            streak,
            milestone,
        })))
    }

    /// Generates flashcards, falling back to a fixed deck on any failure.
    pub async fn generate_flashcards(&self, topic: &str, explanation: &str) -> Vec<FlashcardDraft> {
        let topic = topic.trim();
        let explanation = if explanation.trim().is_empty() {
            topic
        } else {
            explanation
        };
        match self.flashcards.generate_flashcards(topic, explanation).await {
            Ok(cards) if !cards.is_empty() => cards,
            Ok(_) => {
                warn!("Flashcard generation returned no cards. Using fallback deck.");
                fallback_deck(topic)
            }
            Err(e) => {
                warn!("Flashcard generation failed: {:?}. Using fallback deck.", e);
                fallback_deck(topic)
            }
        }
    }

    /// Folds an anonymous session's usage into the user's profile on sign-in.
    ///
    /// Returns the local record to store afterwards (always reset for today),
    /// so running it twice never moves the remote count a second time.
    pub async fn merge_local_usage(
        &self,
        user_id: Uuid,
        local: UsageRecord,
    ) -> PortResult<UsageRecord> {
        let today = self.clock.today();
        let profile = self.profiles.get_or_create_profile(user_id).await?;
        if let Some(count) = usage::plan_merge(&profile, local, today) {
            self.profiles.set_daily_usage(user_id, count, today).await?;
            info!(
                "Merged {} anonymous generations into user {} (now {}).",
                local.count, user_id, count
            );
        }
        Ok(UsageRecord::fresh(today))
    }

    pub async fn streak(&self, user_id: Uuid) -> PortResult<StreakSummary> {
        let profile = self.profiles.get_or_create_profile(user_id).await?;
        let record = profile.streak;
        Ok(StreakSummary {
            current_streak: record.current_streak,
            longest_streak: record.longest_streak,
            last_activity_date: record.last_activity_date,
            active_today: is_active_today(record.last_activity_date, self.clock.today()),
        })
    }
}

fn validate_topic(topic: &str) -> PortResult<&str> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(PortError::InvalidInput("Topic is required".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(PortError::InvalidInput(format!(
            "Topic must be at most {} characters",
            MAX_TOPIC_CHARS
        )));
    }
    Ok(topic)
}

/// The generic deck substituted when flashcard generation fails.
pub fn fallback_deck(topic: &str) -> Vec<FlashcardDraft> {
    vec![
        FlashcardDraft::new(
            format!("What is the core concept of {}?", topic),
            "The fundamental principle that governs how its elements interact.",
        ),
        FlashcardDraft::new(
            format!("How does {} affect the overall process?", topic),
            "It coordinates different components so they work together toward an outcome.",
        ),
        FlashcardDraft::new(
            format!("What's a real-world example of {}?", topic),
            "Think of a team where each member has a specific role that contributes to success.",
        ),
    ]
}
