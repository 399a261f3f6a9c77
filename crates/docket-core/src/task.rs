use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::datetime::iso_date_serde;

/// Indicator color used when a task carries no color of its own.
pub const DEFAULT_TASK_COLOR: &str = "#d64545";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub name: String,

    #[serde(with = "iso_date_serde")]
    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(name: String, date: NaiveDate, color: Option<String>) -> Self {
        Self {
            name,
            date,
            color,
            completed: false,
        }
    }

    pub fn indicator_color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_TASK_COLOR)
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.date == date
    }
}
