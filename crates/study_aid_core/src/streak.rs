//! crates/study_aid_core/src/streak.rs
//!
//! Daily streak arithmetic and the pending-milestone state.

use chrono::NaiveDate;

use crate::domain::{StreakRecord, StreakUpdate};

/// Streak lengths that earn a one-time celebration, ascending.
pub const STREAK_MILESTONES: [u32; 4] = [7, 30, 100, 365];

impl StreakRecord {
    /// Records activity on `today` and reports how the streak moved.
    ///
    /// Calling it again on the same day changes nothing.
    pub fn advance(&self, today: NaiveDate) -> (StreakRecord, StreakUpdate) {
        let yesterday = today.pred_opt();
        let (streak, is_new_streak) = match self.last_activity_date {
            Some(last) if last == today => (self.current_streak, false),
            Some(last) if Some(last) == yesterday => (self.current_streak + 1, false),
            _ => (1, true),
        };
        let longest = self.longest_streak.max(streak);

        let record = StreakRecord {
            current_streak: streak,
            longest_streak: longest,
            last_activity_date: Some(today),
        };
        let update = StreakUpdate {
            streak,
            longest,
            increased: streak > self.current_streak,
            is_new_streak,
        };
        (record, update)
    }
}

pub fn is_active_today(last_activity: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_activity == Some(today)
}

/// The milestone an update reaches, if it increased onto one exactly.
pub fn milestone_for(update: &StreakUpdate) -> Option<u32> {
    if !update.increased {
        return None;
    }
    STREAK_MILESTONES
        .iter()
        .copied()
        .find(|m| *m == update.streak)
}

/// A milestone waiting to be celebrated. Absent until armed; dismissal drops it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingMilestone(Option<u32>);

impl PendingMilestone {
    /// Arms the milestone the update reaches; leaves the state untouched otherwise.
    pub fn observe(&mut self, update: &StreakUpdate) -> Option<u32> {
        let hit = milestone_for(update);
        if hit.is_some() {
            self.0 = hit;
        }
        hit
    }

    pub fn get(&self) -> Option<u32> {
        self.0
    }
}
