//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ErrorBody, HttpError};
use crate::web::{auth, cookies, state::AppState};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_aid_core::{
    domain::{
        Concept, Explanations, Flashcard, FlashcardDraft, NewConcept, ReviewStatus, StreakUpdate,
        Viewer,
    },
    parser::ParsedExplanation,
    ports::PortError,
    service::{GenerationOutcome, ParsedLevels, StreakSummary},
    streak::milestone_for,
    UsageStatus, DAILY_LIMIT,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        get_usage_handler,
        generate_explanation_handler,
        generate_flashcards_handler,
        list_concepts_handler,
        save_concept_handler,
        get_concept_handler,
        delete_concept_handler,
        list_flashcards_handler,
        update_flashcard_handler,
        get_streak_handler,
        dismiss_milestone_handler,
    ),
    components(
        schemas(
            auth::SignupRequest, auth::LoginRequest, auth::AuthResponse, ErrorBody,
            UsageResponse, GenerateExplanationRequest, ExplanationResponse, ExplanationTexts,
            ParsedLevelsResponse, ParsedExplanationResponse, StepResponse, StreakUpdateResponse,
            GenerateFlashcardsRequest, FlashcardDraftPayload, FlashcardDeckResponse,
            SaveConceptRequest, ConceptResponse, FlashcardResponse, UpdateFlashcardRequest,
            StreakResponse,
        )
    ),
    tags(
        (name = "Study Aid API", description = "Layered explanations, flashcards, daily quota and streaks.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The viewer's daily explanation quota.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub usage_count: u32,
    pub remaining: u32,
    pub daily_limit: u32,
    pub is_premium: bool,
    pub can_generate: bool,
}

impl From<UsageStatus> for UsageResponse {
    fn from(status: UsageStatus) -> Self {
        Self {
            usage_count: status.effective_count,
            remaining: status.remaining,
            daily_limit: DAILY_LIMIT,
            is_premium: status.is_premium,
            can_generate: status.can_generate,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateExplanationRequest {
    pub topic: String,
}

/// The three raw explanation texts, shallowest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExplanationTexts {
    pub simplest: String,
    pub standard: String,
    pub deep: String,
}

impl From<Explanations> for ExplanationTexts {
    fn from(e: Explanations) -> Self {
        Self {
            simplest: e.simplest,
            standard: e.standard,
            deep: e.deep_dive,
        }
    }
}

impl From<ExplanationTexts> for Explanations {
    fn from(e: ExplanationTexts) -> Self {
        Self {
            simplest: e.simplest,
            standard: e.standard,
            deep_dive: e.deep,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepResponse {
    pub title: String,
    pub description: String,
}

/// The outline of one explanation. `structured` says whether the steps
/// should be shown as a numbered list.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ParsedExplanationResponse {
    pub intro: String,
    pub steps: Vec<StepResponse>,
    pub key_takeaway: Option<String>,
    pub remainder: String,
    pub structured: bool,
}

impl From<ParsedExplanation> for ParsedExplanationResponse {
    fn from(p: ParsedExplanation) -> Self {
        let structured = p.is_structured();
        Self {
            intro: p.intro,
            steps: p
                .steps
                .into_iter()
                .map(|s| StepResponse {
                    title: s.title,
                    description: s.description,
                })
                .collect(),
            key_takeaway: p.key_takeaway,
            remainder: p.remainder,
            structured,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ParsedLevelsResponse {
    pub simplest: ParsedExplanationResponse,
    pub standard: ParsedExplanationResponse,
    pub deep: ParsedExplanationResponse,
}

impl From<ParsedLevels> for ParsedLevelsResponse {
    fn from(p: ParsedLevels) -> Self {
        Self {
            simplest: p.simplest.into(),
            standard: p.standard.into(),
            deep: p.deep_dive.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StreakUpdateResponse {
    pub streak: u32,
    pub longest: u32,
    pub increased: bool,
    pub is_new_streak: bool,
}

impl From<StreakUpdate> for StreakUpdateResponse {
    fn from(u: StreakUpdate) -> Self {
        Self {
            streak: u.streak,
            longest: u.longest,
            increased: u.increased,
            is_new_streak: u.is_new_streak,
        }
    }
}

/// A freshly generated, unsaved concept.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExplanationResponse {
    pub id: Uuid,
    pub topic: String,
    pub explanations: ExplanationTexts,
    pub parsed: ParsedLevelsResponse,
    pub usage: UsageResponse,
    pub streak: Option<StreakUpdateResponse>,
    /// Streak milestone reached by this generation, if any.
    pub milestone: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateFlashcardsRequest {
    pub topic: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FlashcardDraftPayload {
    pub front: String,
    pub back: String,
}

impl From<FlashcardDraft> for FlashcardDraftPayload {
    fn from(d: FlashcardDraft) -> Self {
        Self {
            front: d.front,
            back: d.back,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FlashcardDeckResponse {
    pub flashcards: Vec<FlashcardDraftPayload>,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveConceptRequest {
    pub topic: String,
    #[serde(default)]
    pub input_text: Option<String>,
    pub explanations: ExplanationTexts,
    #[serde(default)]
    pub flashcards: Vec<FlashcardDraftPayload>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FlashcardResponse {
    pub id: Uuid,
    pub concept_id: Uuid,
    pub front: String,
    pub back: String,
    /// One of `new`, `learning`, `mastered`.
    pub review_status: String,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(f: Flashcard) -> Self {
        Self {
            id: f.id,
            concept_id: f.concept_id,
            front: f.front,
            back: f.back,
            review_status: f.review_status.as_str().to_string(),
            last_reviewed_at: f.last_reviewed_at,
            next_review_at: f.next_review_at,
            created_at: f.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConceptResponse {
    pub id: Uuid,
    pub topic: String,
    pub input_text: Option<String>,
    pub explanations: ExplanationTexts,
    pub flashcards: Vec<FlashcardResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Concept> for ConceptResponse {
    fn from(c: Concept) -> Self {
        Self {
            id: c.id,
            topic: c.topic,
            input_text: c.input_text,
            explanations: c.explanations.into(),
            flashcards: c.flashcards.into_iter().map(Into::into).collect(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateFlashcardRequest {
    /// One of `new`, `learning`, `mastered`.
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StreakResponse {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub active_today: bool,
    /// Milestone armed and not yet dismissed.
    pub pending_milestone: Option<u32>,
}

impl StreakResponse {
    fn new(summary: StreakSummary, pending_milestone: Option<u32>) -> Self {
        Self {
            current_streak: summary.current_streak,
            longest_streak: summary.longest_streak,
            last_activity_date: summary.last_activity_date,
            active_today: summary.active_today,
            pending_milestone,
        }
    }
}

//=========================================================================================
// Usage & Generation Handlers
//=========================================================================================

/// Report the viewer's quota for today.
#[utoipa::path(
    get,
    path = "/usage",
    responses(
        (status = 200, description = "Current usage", body = UsageResponse),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn get_usage_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let local = cookies::read_usage(&headers, app_state.study.today());
    let (status, local) = app_state.study.usage_status(viewer, local).await?;
    let body = Json(UsageResponse::from(status));

    Ok(match viewer {
        Viewer::Anonymous => {
            ([(header::SET_COOKIE, cookies::usage_cookie(local))], body).into_response()
        }
        Viewer::User(_) => body.into_response(),
    })
}

/// Generate the three explanation levels for a topic.
///
/// Counts against the daily quota before the model is called. If the client
/// disconnects while the model is working, the late result is thrown away
/// and the streak is left alone.
#[utoipa::path(
    post,
    path = "/explanations",
    request_body = GenerateExplanationRequest,
    responses(
        (status = 200, description = "Explanations generated", body = ExplanationResponse),
        (status = 400, description = "Missing or overlong topic", body = ErrorBody),
        (status = 402, description = "AI provider billing problem", body = ErrorBody),
        (status = 403, description = "Daily limit reached (code LIMIT_EXCEEDED)", body = ErrorBody),
        (status = 429, description = "AI provider rate limit", body = ErrorBody),
        (status = 503, description = "AI provider unavailable", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn generate_explanation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
    Json(req): Json<GenerateExplanationRequest>,
) -> Result<Response, HttpError> {
    let local = cookies::read_usage(&headers, app_state.study.today());

    // Cancelled when this handler is dropped, i.e. when the client goes away.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let study = app_state.study.clone();
    let task = tokio::spawn(async move { study.generate(viewer, &req.topic, local, &cancel).await });
    let outcome = task.await.map_err(|e| {
        error!("Explanation task panicked: {:?}", e);
        PortError::Unexpected("Explanation task failed".to_string())
    })??;

    let generated = match outcome {
        GenerationOutcome::Completed(generated) => *generated,
        GenerationOutcome::Discarded { local } => {
            let cookie = [(header::SET_COOKIE, cookies::usage_cookie(local))];
            return Ok((StatusCode::NO_CONTENT, cookie).into_response());
        }
        // The quota was spent, so the cookie goes out with the error.
        GenerationOutcome::Failed { local, error } => {
            let response = HttpError(error).into_response();
            return Ok(match viewer {
                Viewer::Anonymous => {
                    ([(header::SET_COOKIE, cookies::usage_cookie(local))], response)
                        .into_response()
                }
                Viewer::User(_) => response,
            });
        }
    };

    let milestone = match (viewer.user_id(), &generated.streak) {
        (Some(user_id), Some(update)) if milestone_for(update).is_some() => app_state
            .milestones
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .observe(update),
        _ => None,
    };

    let concept = generated.concept;
    let body = Json(ExplanationResponse {
        id: concept.id,
        topic: concept.topic,
        explanations: concept.explanations.into(),
        parsed: concept.parsed.into(),
        usage: generated.usage.into(),
        streak: generated.streak.map(Into::into),
        milestone,
    });

    Ok(match viewer {
        Viewer::Anonymous => {
            ([(header::SET_COOKIE, cookies::usage_cookie(generated.local))], body).into_response()
        }
        Viewer::User(_) => body.into_response(),
    })
}

/// Generate a flashcard deck for an explanation.
///
/// Never fails because of the AI provider: a generic deck is returned instead.
#[utoipa::path(
    post,
    path = "/flashcards/generate",
    request_body = GenerateFlashcardsRequest,
    responses(
        (status = 200, description = "Flashcards generated", body = FlashcardDeckResponse),
        (status = 400, description = "Missing topic", body = ErrorBody)
    )
)]
pub async fn generate_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<GenerateFlashcardsRequest>,
) -> Result<Json<FlashcardDeckResponse>, HttpError> {
    if req.topic.trim().is_empty() {
        return Err(PortError::InvalidInput("Topic is required".to_string()).into());
    }
    let drafts = app_state
        .study
        .generate_flashcards(&req.topic, &req.explanation)
        .await;
    Ok(Json(FlashcardDeckResponse {
        flashcards: drafts.into_iter().map(Into::into).collect(),
    }))
}

//=========================================================================================
// Library Handlers
//=========================================================================================

/// List the signed-in user's saved concepts, newest first.
#[utoipa::path(
    get,
    path = "/concepts",
    responses(
        (status = 200, description = "Saved concepts", body = [ConceptResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_concepts_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<ConceptResponse>>, HttpError> {
    let concepts = app_state.db.list_concepts(user_id).await?;
    Ok(Json(concepts.into_iter().map(Into::into).collect()))
}

/// Save a generated concept, with its flashcards, to the user's library.
#[utoipa::path(
    post,
    path = "/concepts",
    request_body = SaveConceptRequest,
    responses(
        (status = 201, description = "Concept saved", body = ConceptResponse),
        (status = 400, description = "Missing topic", body = ErrorBody),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn save_concept_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SaveConceptRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(PortError::InvalidInput("Topic is required".to_string()).into());
    }

    let concept = app_state
        .db
        .save_concept(
            user_id,
            NewConcept {
                topic: topic.to_string(),
                input_text: req.input_text,
                explanations: req.explanations.into(),
                flashcards: req
                    .flashcards
                    .into_iter()
                    .map(|f| FlashcardDraft::new(f.front, f.back))
                    .collect(),
            },
        )
        .await?;

    info!("User {} saved concept {}", user_id, concept.id);
    Ok((StatusCode::CREATED, Json(ConceptResponse::from(concept))))
}

/// Fetch one saved concept with its flashcards.
#[utoipa::path(
    get,
    path = "/concepts/{id}",
    params(("id" = Uuid, Path, description = "The concept ID.")),
    responses(
        (status = 200, description = "The concept", body = ConceptResponse),
        (status = 404, description = "No such concept in this library", body = ErrorBody)
    )
)]
pub async fn get_concept_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(concept_id): Path<Uuid>,
) -> Result<Json<ConceptResponse>, HttpError> {
    let concept = app_state.db.get_concept(user_id, concept_id).await?;
    Ok(Json(concept.into()))
}

/// Delete a saved concept and its flashcards.
#[utoipa::path(
    delete,
    path = "/concepts/{id}",
    params(("id" = Uuid, Path, description = "The concept ID.")),
    responses(
        (status = 204, description = "Concept deleted"),
        (status = 404, description = "No such concept in this library", body = ErrorBody)
    )
)]
pub async fn delete_concept_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(concept_id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    app_state.db.delete_concept(user_id, concept_id).await?;
    info!("User {} deleted concept {}", user_id, concept_id);
    Ok(StatusCode::NO_CONTENT)
}

/// List a saved concept's flashcards in deck order, for a review session.
#[utoipa::path(
    get,
    path = "/concepts/{id}/flashcards",
    params(("id" = Uuid, Path, description = "The concept ID.")),
    responses(
        (status = 200, description = "The deck", body = [FlashcardResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(concept_id): Path<Uuid>,
) -> Result<Json<Vec<FlashcardResponse>>, HttpError> {
    let cards = app_state.db.list_flashcards(user_id, concept_id).await?;
    Ok(Json(cards.into_iter().map(Into::into).collect()))
}

/// Record a review of a saved flashcard.
#[utoipa::path(
    patch,
    path = "/flashcards/{id}",
    params(("id" = Uuid, Path, description = "The flashcard ID.")),
    request_body = UpdateFlashcardRequest,
    responses(
        (status = 200, description = "Flashcard updated", body = FlashcardResponse),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 404, description = "No such flashcard in this library", body = ErrorBody)
    )
)]
pub async fn update_flashcard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(flashcard_id): Path<Uuid>,
    Json(req): Json<UpdateFlashcardRequest>,
) -> Result<Json<FlashcardResponse>, HttpError> {
    let status = ReviewStatus::parse(&req.status).ok_or_else(|| {
        PortError::InvalidInput(format!("Unknown review status '{}'", req.status))
    })?;
    let card = app_state
        .db
        .update_flashcard_status(user_id, flashcard_id, status, app_state.study.now())
        .await?;
    Ok(Json(card.into()))
}

//=========================================================================================
// Streak Handlers
//=========================================================================================

/// Read the user's streak and any milestone awaiting celebration.
#[utoipa::path(
    get,
    path = "/streak",
    responses(
        (status = 200, description = "Streak summary", body = StreakResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_streak_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<StreakResponse>, HttpError> {
    let summary = app_state.study.streak(user_id).await?;
    let pending = app_state
        .milestones
        .lock()
        .await
        .get(&user_id)
        .and_then(|m| m.get());
    Ok(Json(StreakResponse::new(summary, pending)))
}

/// Dismiss the pending milestone celebration.
#[utoipa::path(
    post,
    path = "/streak/milestone/dismiss",
    responses(
        (status = 204, description = "Milestone dismissed"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn dismiss_milestone_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> StatusCode {
    if let Some(pending) = app_state.milestones.lock().await.remove(&user_id) {
        info!("User {} dismissed milestone {:?}", user_id, pending.get());
    }
    StatusCode::NO_CONTENT
}
