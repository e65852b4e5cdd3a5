mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use chrono::Duration;
use common::{test_app, today};
use pretty_assertions::assert_eq;
use serde_json::json;
use study_aid_core::domain::{Profile, StreakRecord};

#[tokio::test]
async fn anonymous_visitor_is_stopped_after_three_generations() {
    let app = test_app();
    let mut usage_cookie: Option<String> = None;

    for expected in 1..=3 {
        let cookies: Vec<&str> = usage_cookie.iter().map(String::as_str).collect();
        let res = app
            .send("POST", "/explanations", &cookies, Some(json!({ "topic": "Osmosis" })))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["usage"]["usage_count"], expected);
        assert_eq!(res.body["usage"]["remaining"], 3 - expected);
        usage_cookie = res.cookie("usage");
        assert!(usage_cookie.is_some());
    }

    let cookies: Vec<&str> = usage_cookie.iter().map(String::as_str).collect();
    let res = app
        .send("POST", "/explanations", &cookies, Some(json!({ "topic": "Osmosis" })))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "LIMIT_EXCEEDED");
    assert_eq!(app.explainer.calls.load(Ordering::SeqCst), 3);

    let res = app.send("GET", "/usage", &cookies, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["can_generate"], false);
    assert_eq!(res.body["daily_limit"], 3);
}

#[tokio::test]
async fn generated_explanations_come_back_parsed() {
    let app = test_app();
    let res = app
        .send("POST", "/explanations", &[], Some(json!({ "topic": "Baking" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["topic"], "Baking");
    assert_eq!(res.body["parsed"]["simplest"]["key_takeaway"], "it is cooking.");
    assert_eq!(res.body["parsed"]["simplest"]["structured"], true);
    assert_eq!(res.body["parsed"]["deep"]["steps"][0]["title"], "Setup");
    assert_eq!(res.body["parsed"]["deep"]["steps"][0]["description"], "prepare inputs");
    assert_eq!(res.body["parsed"]["deep"]["key_takeaway"], "order matters");
    assert_eq!(res.body["parsed"]["standard"]["structured"], false);
    assert!(res.body["streak"].is_null());
}

#[tokio::test]
async fn blank_topic_is_rejected_without_using_quota() {
    let app = test_app();
    let res = app
        .send("POST", "/explanations", &[], Some(json!({ "topic": "   " })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.explainer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn premium_users_are_never_limited() {
    let app = test_app();
    let (user_id, session) = app.store.seed_session();
    app.store.put_profile(Profile {
        daily_usage_count: 10,
        last_usage_date: Some(today()),
        plan_type: study_aid_core::PlanType::Premium,
        ..Profile::new(user_id)
    });
    let cookie = format!("session={}", session);

    let res = app
        .send("POST", "/explanations", &[&cookie], Some(json!({ "topic": "Tides" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["usage"]["is_premium"], true);
    assert_eq!(res.body["usage"]["usage_count"], 11);
    assert_eq!(app.store.profile(user_id).unwrap().daily_usage_count, 11);
}

#[tokio::test]
async fn reaching_a_week_arms_the_milestone_until_dismissed() {
    let app = test_app();
    let (user_id, session) = app.store.seed_session();
    app.store.put_profile(Profile {
        streak: StreakRecord {
            current_streak: 6,
            longest_streak: 6,
            last_activity_date: Some(today() - Duration::days(1)),
        },
        ..Profile::new(user_id)
    });
    let cookie = format!("session={}", session);

    let res = app
        .send("POST", "/explanations", &[&cookie], Some(json!({ "topic": "Tides" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["streak"]["streak"], 7);
    assert_eq!(res.body["streak"]["increased"], true);
    assert_eq!(res.body["milestone"], 7);

    let res = app.send("GET", "/streak", &[&cookie], None).await;
    assert_eq!(res.body["current_streak"], 7);
    assert_eq!(res.body["active_today"], true);
    assert_eq!(res.body["pending_milestone"], 7);

    // A second generation on the same day leaves the streak where it is.
    let res = app
        .send("POST", "/explanations", &[&cookie], Some(json!({ "topic": "Waves" })))
        .await;
    assert_eq!(res.body["streak"]["streak"], 7);
    assert_eq!(res.body["streak"]["increased"], false);
    assert!(res.body["milestone"].is_null());

    let res = app
        .send("POST", "/streak/milestone/dismiss", &[&cookie], None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.send("GET", "/streak", &[&cookie], None).await;
    assert!(res.body["pending_milestone"].is_null());
    assert!(app.state.milestones.lock().await.is_empty());
}

#[tokio::test]
async fn generations_without_a_milestone_leave_no_pending_entry() {
    let app = test_app();
    let (_, session) = app.store.seed_session();
    let cookie = format!("session={}", session);

    let res = app
        .send("POST", "/explanations", &[&cookie], Some(json!({ "topic": "Tides" })))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["streak"]["streak"], 1);
    assert!(res.body["milestone"].is_null());
    assert!(app.state.milestones.lock().await.is_empty());
}

#[tokio::test]
async fn failed_generation_still_counts_for_anonymous_visitors() {
    let app = test_app();
    app.explainer.fail.store(true, Ordering::SeqCst);

    let res = app
        .send("POST", "/explanations", &[], Some(json!({ "topic": "Osmosis" })))
        .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    let usage_cookie = res.cookie("usage").unwrap();

    let res = app.send("GET", "/usage", &[&usage_cookie], None).await;
    assert_eq!(res.body["usage_count"], 1);
    assert_eq!(res.body["remaining"], 2);
}

#[tokio::test]
async fn failed_generation_still_counts_for_signed_in_users() {
    let app = test_app();
    let (user_id, session) = app.store.seed_session();
    let cookie = format!("session={}", session);
    app.explainer.fail.store(true, Ordering::SeqCst);

    let res = app
        .send("POST", "/explanations", &[&cookie], Some(json!({ "topic": "Osmosis" })))
        .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(res.cookie("usage").is_none());
    let profile = app.store.profile(user_id).unwrap();
    assert_eq!(profile.daily_usage_count, 1);
    assert_eq!(profile.streak.current_streak, 0);
}

#[tokio::test]
async fn signup_carries_anonymous_usage_into_the_profile() {
    let app = test_app();
    let mut usage_cookie: Option<String> = None;
    for _ in 0..2 {
        let cookies: Vec<&str> = usage_cookie.iter().map(String::as_str).collect();
        let res = app
            .send("POST", "/explanations", &cookies, Some(json!({ "topic": "Gravity" })))
            .await;
        usage_cookie = res.cookie("usage");
    }
    let usage_cookie = usage_cookie.unwrap();

    let res = app
        .send(
            "POST",
            "/auth/signup",
            &[&usage_cookie],
            Some(json!({ "email": "Student@Example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["email"], "student@example.com");
    let session = res.cookie("session").unwrap();
    let reset_usage = res.cookie("usage").unwrap();
    assert_ne!(reset_usage, usage_cookie);

    let user_id = app.store.user_id_for("student@example.com").unwrap();
    let profile = app.store.profile(user_id).unwrap();
    assert_eq!(profile.daily_usage_count, 2);
    assert_eq!(profile.last_usage_date, Some(today()));

    let res = app.send("GET", "/usage", &[&session], None).await;
    assert_eq!(res.body["usage_count"], 2);
    assert_eq!(res.body["remaining"], 1);

    // Logging in again with the reset cookie does not count anything twice.
    let res = app
        .send(
            "POST",
            "/auth/login",
            &[&reset_usage],
            Some(json!({ "email": "student@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.store.profile(user_id).unwrap().daily_usage_count, 2);
}

#[tokio::test]
async fn failed_usage_merge_fails_sign_in_and_keeps_the_cookie() {
    let app = test_app();
    let mut usage_cookie: Option<String> = None;
    for _ in 0..2 {
        let cookies: Vec<&str> = usage_cookie.iter().map(String::as_str).collect();
        let res = app
            .send("POST", "/explanations", &cookies, Some(json!({ "topic": "Gravity" })))
            .await;
        usage_cookie = res.cookie("usage");
    }
    let usage_cookie = usage_cookie.unwrap();
    let credentials = json!({ "email": "student@example.com", "password": "correct horse" });

    app.store.fail_usage_writes.store(true, Ordering::SeqCst);
    let res = app
        .send("POST", "/auth/signup", &[&usage_cookie], Some(credentials.clone()))
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.cookie("session").is_none());
    assert!(res.cookie("usage").is_none());

    let res = app.send("GET", "/usage", &[&usage_cookie], None).await;
    assert_eq!(res.body["usage_count"], 2);

    // Signing in once the store recovers carries the count over.
    app.store.fail_usage_writes.store(false, Ordering::SeqCst);
    let res = app
        .send("POST", "/auth/login", &[&usage_cookie], Some(credentials))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let session = res.cookie("session").unwrap();

    let res = app.send("GET", "/usage", &[&session], None).await;
    assert_eq!(res.body["usage_count"], 2);
    assert_eq!(res.body["remaining"], 1);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = test_app();
    let res = app
        .send(
            "POST",
            "/auth/signup",
            &[],
            Some(json!({ "email": "a@b.c", "password": "long enough" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app
        .send(
            "POST",
            "/auth/login",
            &[],
            Some(json!({ "email": "a@b.c", "password": "not the one" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn library_routes_require_a_session() {
    let app = test_app();
    let res = app.send("GET", "/concepts", &[], None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.send("GET", "/streak", &["session=bogus"], None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn saved_concepts_can_be_listed_reviewed_and_deleted() {
    let app = test_app();
    let (_, session) = app.store.seed_session();
    let cookie = format!("session={}", session);

    let res = app
        .send(
            "POST",
            "/concepts",
            &[&cookie],
            Some(json!({
                "topic": "Osmosis",
                "explanations": { "simplest": "a", "standard": "b", "deep": "c" },
                "flashcards": [
                    { "front": "Why does water move?", "back": "To balance concentration." },
                    { "front": "Through what?", "back": "A semi-permeable membrane." }
                ]
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let concept_id = res.body["id"].as_str().unwrap().to_string();
    let card_id = res.body["flashcards"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(res.body["flashcards"][0]["review_status"], "new");

    let res = app.send("GET", "/concepts", &[&cookie], None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = app
        .send(
            "PATCH",
            &format!("/flashcards/{}", card_id),
            &[&cookie],
            Some(json!({ "status": "learning" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["review_status"], "learning");
    assert!(res.body["next_review_at"].is_string());

    let res = app
        .send(
            "PATCH",
            &format!("/flashcards/{}", card_id),
            &[&cookie],
            Some(json!({ "status": "forgotten" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .send("GET", &format!("/concepts/{}", concept_id), &[&cookie], None)
        .await;
    assert_eq!(res.body["flashcards"].as_array().unwrap().len(), 2);
    assert_eq!(res.body["explanations"]["deep"], "c");

    let res = app
        .send(
            "GET",
            &format!("/concepts/{}/flashcards", concept_id),
            &[&cookie],
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body[0]["front"], "Why does water move?");
    assert_eq!(res.body[0]["review_status"], "learning");
    assert_eq!(res.body[1]["review_status"], "new");

    let res = app
        .send("DELETE", &format!("/concepts/{}", concept_id), &[&cookie], None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .send("GET", &format!("/concepts/{}", concept_id), &[&cookie], None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_deck_write_leaves_no_concept_behind() {
    let app = test_app();
    let (_, session) = app.store.seed_session();
    let cookie = format!("session={}", session);
    app.store.fail_flashcard_writes.store(true, Ordering::SeqCst);

    let res = app
        .send(
            "POST",
            "/concepts",
            &[&cookie],
            Some(json!({
                "topic": "Osmosis",
                "explanations": { "simplest": "a", "standard": "b", "deep": "c" },
                "flashcards": [{ "front": "Why?", "back": "Because." }]
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.concept_count(), 0);

    let res = app.send("GET", "/concepts", &[&cookie], None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn other_users_concepts_are_invisible() {
    let app = test_app();
    let (_, owner) = app.store.seed_session();
    let (_, stranger) = app.store.seed_session();
    let owner = format!("session={}", owner);
    let stranger = format!("session={}", stranger);

    let res = app
        .send(
            "POST",
            "/concepts",
            &[&owner],
            Some(json!({
                "topic": "Entropy",
                "explanations": { "simplest": "a", "standard": "b", "deep": "c" }
            })),
        )
        .await;
    let concept_id = res.body["id"].as_str().unwrap().to_string();

    let res = app
        .send("GET", &format!("/concepts/{}", concept_id), &[&stranger], None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let res = app.send("GET", "/concepts", &[&stranger], None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn flashcard_generation_falls_back_to_generic_deck() {
    let app = test_app();
    let res = app
        .send(
            "POST",
            "/flashcards/generate",
            &[],
            Some(json!({ "topic": "Photosynthesis", "explanation": "Plants make sugar." })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let cards = res.body["flashcards"].as_array().unwrap();
    assert_eq!(cards.len(), 3);
    assert_eq!(
        cards[0]["front"],
        "What is the core concept of Photosynthesis?"
    );
}
