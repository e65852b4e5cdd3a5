pub mod domain;
pub mod parser;
pub mod ports;
pub mod service;
pub mod streak;
pub mod usage;

pub use domain::{
    Concept, ExplanationLevel, Explanations, Flashcard, FlashcardDraft, NewConcept,
    PlanType, Profile, ReviewStatus, StreakRecord, StreakUpdate, UsageRecord, User,
    UserCredentials, Viewer,
};
pub use parser::{parse_explanation, ParsedExplanation, Step};
pub use ports::{
    Clock, DatabaseService, ExplanationGenerationService, FlashcardGenerationService, PortError,
    PortResult, ProfileStore, SystemClock,
};
pub use service::{GenerationOutcome, StudyService};
pub use streak::{PendingMilestone, STREAK_MILESTONES};
pub use usage::{UsageStatus, DAILY_LIMIT};
