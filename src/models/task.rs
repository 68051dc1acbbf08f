use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Work,
    Personal,
    Worship,
    Study,
    Health,
    Errand,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Work => "work",
            TaskCategory::Personal => "personal",
            TaskCategory::Worship => "worship",
            TaskCategory::Study => "study",
            TaskCategory::Health => "health",
            TaskCategory::Errand => "errand",
        }
    }
}

impl FromStr for TaskCategory {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "work" => Ok(TaskCategory::Work),
            "personal" => Ok(TaskCategory::Personal),
            "worship" => Ok(TaskCategory::Worship),
            "study" => Ok(TaskCategory::Study),
            "health" => Ok(TaskCategory::Health),
            "errand" => Ok(TaskCategory::Errand),
            _ => Err(anyhow::anyhow!("Unknown task category: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(anyhow::anyhow!("Unknown frequency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceEnd {
    /// Last date an occurrence may fall on.
    OnDate(NaiveDate),
    /// Total occurrences in the series, the parent included.
    AfterOccurrences(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    /// Only meaningful for weekly rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<Vec<Weekday>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<RecurrenceEnd>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval: interval.max(1),
            weekdays: None,
            end: None,
        }
    }

    pub fn on_weekdays(mut self, days: Vec<Weekday>) -> Self {
        self.weekdays = if days.is_empty() { None } else { Some(days) };
        self
    }

    pub fn ending(mut self, end: RecurrenceEnd) -> Self {
        self.end = Some(end);
        self
    }
}

/// A unit of user work. A task with a `parent_id` is a materialized occurrence
/// of that parent's recurrence and never carries a rule of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub title: String,
    pub duration_minutes: u32,
    pub category: TaskCategory,
    pub scheduled_at: Option<NaiveDateTime>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub completed: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub recurrence: Option<RecurrenceRule>,
    pub parent_id: Option<i64>,
    pub dismissed_dates: Vec<NaiveDate>,
}

impl Task {
    pub fn new(title: &str, duration_minutes: u32, category: TaskCategory) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            duration_minutes,
            category,
            scheduled_at: None,
            due_date: None,
            notes: None,
            completed: false,
            completed_at: None,
            recurrence: None,
            parent_id: None,
            dismissed_dates: Vec::new(),
        }
    }

    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        self.scheduled_at.map(|dt| dt.date())
    }

    pub fn is_recurring_parent(&self) -> bool {
        self.recurrence.is_some() && self.parent_id.is_none()
    }

    pub fn is_dismissed(&self, date: NaiveDate) -> bool {
        self.dismissed_dates.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_clamped() {
        let rule = RecurrenceRule::new(Frequency::Daily, 0);
        assert_eq!(rule.interval, 1);
    }

    #[test]
    fn test_empty_weekdays_mean_none() {
        let rule = RecurrenceRule::new(Frequency::Weekly, 1).on_weekdays(vec![]);
        assert!(rule.weekdays.is_none());
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = RecurrenceRule::new(Frequency::Weekly, 2)
            .on_weekdays(vec![Weekday::Tue, Weekday::Thu])
            .ending(RecurrenceEnd::AfterOccurrences(10));
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"frequency\":\"weekly\""));
        assert!(json.contains("\"after_occurrences\":10"));
        let back: RecurrenceRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }
}
