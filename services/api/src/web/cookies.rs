//! services/api/src/web/cookies.rs
//!
//! Cookie helpers: the `session` login cookie and the `usage` cookie that
//! carries an anonymous visitor's daily generation count.
//!
//! The usage cookie value is URL-safe base64 of `{"count": n, "date": "YYYY-MM-DD"}`.
//! Anything that does not decode cleanly is read as a fresh record for today.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use study_aid_core::{domain::UsageRecord, usage};
use tracing::debug;

pub const SESSION_COOKIE: &str = "session";
pub const USAGE_COOKIE: &str = "usage";

/// Lifetime of a login session.
pub const SESSION_DAYS: i64 = 30;

#[derive(Serialize, Deserialize)]
struct UsagePayload {
    count: u32,
    date: NaiveDate,
}

/// Finds a cookie by name in the request's `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

pub fn session_cookie(session_id: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Reads the anonymous usage record, reset to today if it is from another day.
pub fn read_usage(headers: &HeaderMap, today: NaiveDate) -> UsageRecord {
    let record = cookie_value(headers, USAGE_COOKIE)
        .and_then(decode_usage)
        .unwrap_or_else(|| UsageRecord::fresh(today));
    usage::current_local(record, today)
}

pub fn usage_cookie(record: UsageRecord) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        USAGE_COOKIE,
        encode_usage(record),
        Duration::days(2).num_seconds()
    )
}

fn encode_usage(record: UsageRecord) -> String {
    let payload = UsagePayload {
        count: record.count,
        date: record.date,
    };
    // Serializing two plain fields cannot fail.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_usage(value: &str) -> Option<UsageRecord> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| debug!("Ignoring undecodable usage cookie: {}", e))
        .ok()?;
    let payload: UsagePayload = serde_json::from_slice(&bytes)
        .map_err(|e| debug!("Ignoring unparsable usage cookie: {}", e))
        .ok()?;
    Some(UsageRecord {
        count: payload.count,
        date: payload.date,
    })
}
