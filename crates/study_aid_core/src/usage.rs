//! crates/study_aid_core/src/usage.rs
//!
//! Daily quota reconciliation between the anonymous local usage record and
//! the per-user remote profile.
//!
//! Every comparison is at calendar-day granularity: a record whose date is
//! not `today` counts as zero usage.

use chrono::NaiveDate;

use crate::domain::{Profile, UsageRecord, Viewer};

/// Free explanation generations per calendar day.
pub const DAILY_LIMIT: u32 = 3;

/// The authoritative view of a viewer's quota for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageStatus {
    pub effective_count: u32,
    pub remaining: u32,
    pub is_premium: bool,
    pub can_generate: bool,
}

impl UsageStatus {
    pub fn new(effective_count: u32, is_premium: bool) -> Self {
        Self {
            effective_count,
            remaining: DAILY_LIMIT.saturating_sub(effective_count),
            is_premium,
            can_generate: is_premium || effective_count < DAILY_LIMIT,
        }
    }
}

/// A write the caller must issue, and see acknowledged, before generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageWrite {
    Local(UsageRecord),
    Remote {
        daily_usage_count: u32,
        last_usage_date: NaiveDate,
    },
}

/// Resets a local record from a previous day.
pub fn current_local(local: UsageRecord, today: NaiveDate) -> UsageRecord {
    if local.date == today {
        local
    } else {
        UsageRecord::fresh(today)
    }
}

/// The remote count for today, zero when the profile was last used on another day.
pub fn remote_count(profile: &Profile, today: NaiveDate) -> u32 {
    if profile.last_usage_date == Some(today) {
        profile.daily_usage_count
    } else {
        0
    }
}

/// Computes the usage status from whichever record is authoritative for the viewer.
///
/// `profile` must be present for signed-in viewers; a missing profile is
/// treated as an empty free-tier record.
pub fn evaluate(
    viewer: Viewer,
    profile: Option<&Profile>,
    local: UsageRecord,
    today: NaiveDate,
) -> UsageStatus {
    match (viewer, profile) {
        (Viewer::Anonymous, _) => UsageStatus::new(current_local(local, today).count, false),
        (Viewer::User(_), Some(profile)) => {
            UsageStatus::new(remote_count(profile, today), profile.is_premium())
        }
        (Viewer::User(_), None) => UsageStatus::new(0, false),
    }
}

/// Decides the write that consumes one generation, or `None` when the quota is spent.
pub fn plan_generation(
    viewer: Viewer,
    profile: Option<&Profile>,
    local: UsageRecord,
    today: NaiveDate,
) -> Option<UsageWrite> {
    let status = evaluate(viewer, profile, local, today);
    if !status.can_generate {
        return None;
    }
    let next = status.effective_count + 1;
    Some(match viewer {
        Viewer::Anonymous => UsageWrite::Local(UsageRecord {
            count: next,
            date: today,
        }),
        Viewer::User(_) => UsageWrite::Remote {
            daily_usage_count: next,
            last_usage_date: today,
        },
    })
}

/// The remote count to write when an anonymous session signs in.
///
/// Returns `None` when there is nothing to merge: the local record is empty
/// or belongs to a previous day. When both records are from today the higher
/// count wins, so quota already spent locally is never forgotten.
pub fn plan_merge(profile: &Profile, local: UsageRecord, today: NaiveDate) -> Option<u32> {
    if local.date != today || local.count == 0 {
        return None;
    }
    Some(remote_count(profile, today).max(local.count))
}
