//! Deciding whether a recurring task needs an instance on a given day.
//!
//! Instances are materialized lazily: nothing is generated ahead of time, the
//! planner asks for each day it shows.

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{Frequency, RecurrenceEnd, RecurrenceRule, Task};

impl RecurrenceRule {
    fn step(&self) -> i64 {
        self.interval.max(1) as i64
    }

    /// Frequency pattern only. Bounds, dismissals and existing instances are
    /// checked by [`should_generate`].
    pub fn matches(&self, original: NaiveDate, target: NaiveDate) -> bool {
        let days = (target - original).num_days();
        match self.frequency {
            Frequency::Daily => days > 0 && days % self.step() == 0,
            Frequency::Weekly => match self.weekdays.as_deref() {
                // Interval is not applied when explicit weekdays are set.
                Some(weekdays) if !weekdays.is_empty() => weekdays.contains(&target.weekday()),
                _ => {
                    let weeks = days / 7;
                    weeks > 0
                        && weeks % self.step() == 0
                        && target.weekday() == original.weekday()
                }
            },
            Frequency::Monthly => {
                let months = (target.year() - original.year()) as i64 * 12
                    + target.month() as i64
                    - original.month() as i64;
                months > 0 && months % self.step() == 0 && target.day() == original.day()
            }
        }
    }

    /// Whether the series is already over by `target`.
    pub fn has_ended(&self, original: NaiveDate, target: NaiveDate) -> bool {
        match &self.end {
            None => false,
            Some(RecurrenceEnd::OnDate(last)) => target > *last,
            Some(RecurrenceEnd::AfterOccurrences(total)) => {
                // The parent itself is the first occurrence.
                let mut seen = 1u32;
                let mut day = original + Duration::days(1);
                while day < target {
                    if self.matches(original, day) {
                        seen += 1;
                        if seen >= *total {
                            return true;
                        }
                    }
                    day += Duration::days(1);
                }
                seen >= *total
            }
        }
    }
}

/// Whether `parent` needs a new instance on `target`. `existing` is whatever
/// is already loaded for that day.
pub fn should_generate(target: NaiveDate, parent: &Task, existing: &[Task]) -> bool {
    let (Some(rule), Some(original), Some(parent_id)) =
        (parent.recurrence.as_ref(), parent.scheduled_date(), parent.id)
    else {
        return false;
    };

    if target <= original {
        return false;
    }
    if rule.has_ended(original, target) {
        return false;
    }
    let already_there = existing
        .iter()
        .any(|t| t.parent_id == Some(parent_id) && t.scheduled_date() == Some(target));
    if already_there {
        return false;
    }
    if parent.is_dismissed(target) {
        return false;
    }
    rule.matches(original, target)
}

/// A fresh instance of `parent` on `target`, at the parent's time of day.
pub fn materialize(parent: &Task, target: NaiveDate) -> Option<Task> {
    let start = parent.scheduled_at?;
    Some(Task {
        id: None,
        title: parent.title.clone(),
        duration_minutes: parent.duration_minutes,
        category: parent.category,
        scheduled_at: Some(target.and_time(start.time())),
        due_date: None,
        notes: parent.notes.clone(),
        completed: false,
        completed_at: None,
        recurrence: None,
        parent_id: parent.id,
        dismissed_dates: Vec::new(),
    })
}
