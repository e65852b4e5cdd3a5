//! In-memory stand-ins for the ports, and helpers for driving the router.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api_lib::web::{self, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use study_aid_core::{
    domain::{
        Concept, Explanations, Flashcard, FlashcardDraft, NewConcept, Profile, ReviewStatus,
        StreakUpdate, User, UserCredentials,
    },
    ports::{
        Clock, DatabaseService, ExplanationGenerationService, FlashcardGenerationService,
        PortError, PortResult, ProfileStore,
    },
    StudyService,
};
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// Fakes
//=========================================================================================

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, Profile>,
    concepts: Vec<Concept>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Makes `set_daily_usage` fail.
    pub fail_usage_writes: AtomicBool,
    /// Makes every flashcard insert fail, as a constraint violation would.
    pub fail_flashcard_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates a user with a live session and returns `(user_id, session_id)`.
    pub fn seed_session(&self) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4().to_string();
        let mut tables = self.tables.lock().unwrap();
        tables.users.push(UserCredentials {
            user_id,
            email: format!("{}@example.com", user_id),
            hashed_password: String::new(),
        });
        tables
            .sessions
            .insert(session_id.clone(), (user_id, Utc::now() + chrono::Duration::days(1)));
        (user_id, session_id)
    }

    pub fn put_profile(&self, profile: Profile) {
        self.tables
            .lock()
            .unwrap()
            .profiles
            .insert(profile.user_id, profile);
    }

    pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
        self.tables.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn concept_count(&self) -> usize {
        self.tables.lock().unwrap().concepts.len()
    }

    pub fn user_id_for(&self, email: &str) -> Option<Uuid> {
        self.tables
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.user_id)
    }
}

#[async_trait]
impl DatabaseService for MemoryStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(PortError::InvalidInput("Email already registered".to_string()));
        }
        let user_id = Uuid::new_v4();
        tables.users.push(UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(email.to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables.lock().unwrap().sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn list_concepts(&self, user_id: Uuid) -> PortResult<Vec<Concept>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .concepts
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_concept(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<Concept> {
        self.tables
            .lock()
            .unwrap()
            .concepts
            .iter()
            .find(|c| c.id == concept_id && c.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Concept {} not found", concept_id)))
    }

    async fn save_concept(&self, user_id: Uuid, concept: NewConcept) -> PortResult<Concept> {
        if !concept.flashcards.is_empty() && self.fail_flashcard_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("flashcard insert failed".to_string()));
        }
        let concept_id = Uuid::new_v4();
        let flashcards = concept
            .flashcards
            .iter()
            .map(|d| Flashcard {
                id: Uuid::new_v4(),
                concept_id,
                user_id,
                front: d.front.clone(),
                back: d.back.clone(),
                review_status: ReviewStatus::New,
                last_reviewed_at: None,
                next_review_at: None,
                created_at: Utc::now(),
            })
            .collect();
        let saved = Concept {
            id: concept_id,
            user_id,
            topic: concept.topic,
            input_text: concept.input_text,
            explanations: concept.explanations,
            flashcards,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.tables.lock().unwrap().concepts.push(saved.clone());
        Ok(saved)
    }

    async fn delete_concept(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.concepts.len();
        tables
            .concepts
            .retain(|c| !(c.id == concept_id && c.user_id == user_id));
        if tables.concepts.len() == before {
            return Err(PortError::NotFound(format!("Concept {} not found", concept_id)));
        }
        Ok(())
    }

    async fn list_flashcards(&self, user_id: Uuid, concept_id: Uuid) -> PortResult<Vec<Flashcard>> {
        Ok(self.get_concept(user_id, concept_id).await?.flashcards)
    }

    async fn update_flashcard_status(
        &self,
        user_id: Uuid,
        flashcard_id: Uuid,
        status: ReviewStatus,
        reviewed_at: DateTime<Utc>,
    ) -> PortResult<Flashcard> {
        let mut tables = self.tables.lock().unwrap();
        let card = tables
            .concepts
            .iter_mut()
            .filter(|c| c.user_id == user_id)
            .flat_map(|c| c.flashcards.iter_mut())
            .find(|f| f.id == flashcard_id)
            .ok_or_else(|| PortError::NotFound(format!("Flashcard {} not found", flashcard_id)))?;
        card.review_status = status;
        card.last_reviewed_at = Some(reviewed_at);
        card.next_review_at = status.next_review_at(reviewed_at);
        Ok(card.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .profiles
            .entry(user_id)
            .or_insert_with(|| Profile::new(user_id))
            .clone())
    }

    async fn set_daily_usage(&self, user_id: Uuid, count: u32, date: NaiveDate) -> PortResult<()> {
        if self.fail_usage_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("usage write refused".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        let profile = tables
            .profiles
            .entry(user_id)
            .or_insert_with(|| Profile::new(user_id));
        profile.daily_usage_count = count;
        profile.last_usage_date = Some(date);
        Ok(())
    }

    async fn record_activity(&self, user_id: Uuid, today: NaiveDate) -> PortResult<StreakUpdate> {
        let mut tables = self.tables.lock().unwrap();
        let profile = tables
            .profiles
            .entry(user_id)
            .or_insert_with(|| Profile::new(user_id));
        let (record, update) = profile.streak.advance(today);
        profile.streak = record;
        Ok(update)
    }
}

#[derive(Default)]
pub struct FakeExplainer {
    pub calls: AtomicUsize,
    /// Makes every call fail as an unavailable model would.
    pub fail: AtomicBool,
}

#[async_trait]
impl ExplanationGenerationService for FakeExplainer {
    async fn generate_explanations(&self, topic: &str) -> PortResult<Explanations> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Transient("model unavailable".to_string()));
        }
        Ok(Explanations {
            simplest: format!(
                "Think of {} like a kitchen.\n\nFirst, you gather things.\nThen, you mix them.\n\nNow you can say: it is cooking.",
                topic
            ),
            standard: format!("Building on the analogy, {} has **parts**.", topic),
            deep_dive: "1. Setup - prepare inputs\n2. Run - combine them\n\nKey Takeaway: order matters"
                .to_string(),
        })
    }
}

pub struct BrokenFlashcards;

#[async_trait]
impl FlashcardGenerationService for BrokenFlashcards {
    async fn generate_flashcards(
        &self,
        _topic: &str,
        _explanation: &str,
    ) -> PortResult<Vec<FlashcardDraft>> {
        Err(PortError::Transient("model unavailable".to_string()))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub explainer: Arc<FakeExplainer>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let explainer = Arc::new(FakeExplainer::default());
    let study = Arc::new(StudyService::new(
        store.clone(),
        explainer.clone(),
        Arc::new(BrokenFlashcards),
        Arc::new(FixedClock),
    ));
    let state = Arc::new(AppState::new(store.clone(), study));
    TestApp {
        router: web::router(state.clone()),
        state,
        store,
        explainer,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `name=value` pair of a cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{}=", name)))
            .map(str::to_string)
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        cookies: &[&str],
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if !cookies.is_empty() {
            builder = builder.header(header::COOKIE, cookies.join("; "));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }
}
