use crate::db::{Database, DEADLINES_KEY};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Important,
    Normal,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: String,
    #[serde(rename = "titel")]
    pub title: String,
    #[serde(rename = "datum")]
    pub date: NaiveDate,
    pub label: Priority,
    #[serde(rename = "notities", default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlineFilter {
    #[default]
    All,
    Next7Days,
    Next30Days,
}

impl DeadlineFilter {
    fn window_days(self) -> Option<u64> {
        match self {
            DeadlineFilter::All => None,
            DeadlineFilter::Next7Days => Some(7),
            DeadlineFilter::Next30Days => Some(30),
        }
    }
}

impl FromStr for DeadlineFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DeadlineFilter::All),
            "7days" => Ok(DeadlineFilter::Next7Days),
            "30days" => Ok(DeadlineFilter::Next30Days),
            other => Err(format!("Unknown filter '{other}' (use all, 7days or 30days)")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeadlineError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Invalid deadline list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Deadlines inside the filter window, earliest first. Windows run from
/// `today` through `today + N days`, both ends included.
pub fn filter_deadlines(
    deadlines: &[Deadline],
    filter: DeadlineFilter,
    today: NaiveDate,
) -> Vec<Deadline> {
    let end = filter
        .window_days()
        .map(|days| today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX));

    let mut selected: Vec<Deadline> = deadlines
        .iter()
        .filter(|d| match end {
            None => true,
            Some(end) => d.date >= today && d.date <= end,
        })
        .cloned()
        .collect();
    selected.sort_by_key(|d| d.date);
    selected
}

/// The list is always read and written as a whole.
pub fn load_deadlines(db: &Database) -> Result<Vec<Deadline>, DeadlineError> {
    match db.get_item(DEADLINES_KEY)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

pub fn save_deadlines(db: &Database, deadlines: &[Deadline]) -> Result<(), DeadlineError> {
    let json = serde_json::to_string(deadlines)?;
    db.set_item(DEADLINES_KEY, &json)?;
    Ok(())
}
