use thiserror::Error;

/// Validation and lookup failures raised by the task store and calendar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Please enter both task name and deadline date.")]
    MissingFields,

    #[error("task name cannot be empty")]
    EmptyName,

    #[error("invalid deadline date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid color {0:?}: expected a CSS color")]
    InvalidColor(String),

    #[error("no task at position {index} (store holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid month {0}: expected 1-12")]
    InvalidMonth(u32),
}
