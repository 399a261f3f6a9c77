use chrono::{
  Datelike,
  Duration,
  NaiveDate
};

use crate::error::TaskError;
use crate::task::{
  DEFAULT_TASK_COLOR,
  Task
};

pub const DEFAULT_INDICATOR_LIMIT:
  usize = 3;

pub const WEEKDAY_LABELS: [&str; 7] = [
  "Mon", "Tue", "Wed", "Thu", "Fri",
  "Sat", "Sun"
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
  pub date:         NaiveDate,
  pub is_today:     bool,
  /// Positions in the task list, in
  /// store order.
  pub task_indices: Vec<usize>
}

impl DayCell {
  pub fn day(&self) -> u32 {
    self.date.day()
  }

  pub fn has_tasks(&self) -> bool {
    !self.task_indices.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCell {
  Empty,
  Day(DayCell)
}

impl CalendarCell {
  pub fn as_day(
    &self
  ) -> Option<&DayCell> {
    match self {
      | CalendarCell::Day(cell) => {
        Some(cell)
      }
      | CalendarCell::Empty => None
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub year:   i32,
  pub month:  u32,
  pub offset: u32,
  pub cells:  Vec<CalendarCell>
}

impl MonthGrid {
  pub fn day(
    &self,
    day: u32
  ) -> Option<&DayCell> {
    if day == 0 {
      return None;
    }
    let idx =
      self.offset.checked_add(day - 1)?;
    self
      .cells
      .get(idx as usize)
      .and_then(CalendarCell::as_day)
  }

  pub fn day_cells(
    &self
  ) -> impl Iterator<Item = &DayCell> {
    self
      .cells
      .iter()
      .filter_map(CalendarCell::as_day)
  }

  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[CalendarCell]>
  {
    self.cells.chunks(7)
  }

  pub fn title(&self) -> String {
    month_title(self.year, self.month)
  }
}

/// How task indicators are drawn on a day cell.
///
/// All policies share the same per-day task filter and differ only in how
/// many markers they emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPolicy {
  Dot,
  FirstColor,
  Stacked { limit: usize }
}

impl Default for IndicatorPolicy {
  fn default() -> Self {
    IndicatorPolicy::Stacked {
      limit: DEFAULT_INDICATOR_LIMIT
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indicators {
  pub colors:   Vec<String>,
  pub overflow: usize
}

impl Indicators {
  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
      && self.overflow == 0
  }
}

impl IndicatorPolicy {
  pub fn from_config(
    name: &str,
    limit: Option<usize>
  ) -> Option<Self> {
    match name
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "dot" | "single" => {
        Some(IndicatorPolicy::Dot)
      }
      | "first-color" | "first" => {
        Some(IndicatorPolicy::FirstColor)
      }
      | "stacked" | "stack" => {
        Some(IndicatorPolicy::Stacked {
          limit: limit
            .filter(|value| *value > 0)
            .unwrap_or(
              DEFAULT_INDICATOR_LIMIT
            )
        })
      }
      | _ => None
    }
  }

  pub fn indicators(
    &self,
    cell: &DayCell,
    tasks: &[Task]
  ) -> Indicators {
    let due = cell
      .task_indices
      .iter()
      .filter_map(|idx| tasks.get(*idx))
      .collect::<Vec<_>>();
    let Some(first) = due.first() else {
      return Indicators::default();
    };

    match self {
      | IndicatorPolicy::Dot => {
        Indicators {
          colors:   vec![
            DEFAULT_TASK_COLOR
              .to_string(),
          ],
          overflow: 0
        }
      }
      | IndicatorPolicy::FirstColor => {
        Indicators {
          colors:   vec![
            first
              .indicator_color()
              .to_string(),
          ],
          overflow: 0
        }
      }
      | IndicatorPolicy::Stacked {
        limit
      } => {
        let capped =
          due.len().min(*limit);
        Indicators {
          colors:   due
            .iter()
            .take(capped)
            .map(|task| {
              task
                .indicator_color()
                .to_string()
            })
            .collect(),
          overflow: due
            .len()
            .saturating_sub(capped)
        }
      }
    }
  }
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate, TaskError> {
  if !(1..=12).contains(&month) {
    return Err(
      TaskError::InvalidMonth(month)
    );
  }
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or_else(|| {
    TaskError::InvalidDate(format!(
      "{year:04}-{month:02}-01"
    ))
  })
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> Result<u32, TaskError> {
  let first =
    first_day_of_month(year, month)?;
  let (next_year, next_month) =
    shift_month(year, month, 1);
  let next_first =
    first_day_of_month(
      next_year, next_month
    )?;
  Ok(
    (next_first - first).num_days()
      as u32
  )
}

/// Leading blank cells that align `first` under a Monday-first header.
pub fn weekday_offset(
  first: NaiveDate
) -> u32 {
  let weekday = first
    .weekday()
    .num_days_from_sunday();
  if weekday == 0 {
    6
  } else {
    weekday - 1
  }
}

pub fn shift_month(
  year: i32,
  month: u32,
  delta: i32
) -> (i32, u32) {
  let zero_based = year as i64 * 12
    + (month as i64 - 1)
    + delta as i64;
  let shifted_year =
    zero_based.div_euclid(12) as i32;
  let shifted_month =
    zero_based.rem_euclid(12) as u32
      + 1;
  (shifted_year, shifted_month)
}

pub fn month_title(
  year: i32,
  month: u32
) -> String {
  match NaiveDate::from_ymd_opt(
    year, month, 1
  ) {
    | Some(first) => {
      first.format("%B %Y").to_string()
    }
    | None => {
      format!("{year:04}-{month:02}")
    }
  }
}

#[tracing::instrument(skip(tasks), fields(task_count = tasks.len()))]
pub fn build_month_grid(
  year: i32,
  month: u32,
  tasks: &[Task],
  today: Option<NaiveDate>
) -> Result<MonthGrid, TaskError> {
  let first =
    first_day_of_month(year, month)?;
  let offset = weekday_offset(first);
  let day_count =
    days_in_month(year, month)?;

  let mut cells = Vec::with_capacity(
    (offset + day_count) as usize
  );
  cells.extend(
    (0..offset)
      .map(|_| CalendarCell::Empty)
  );

  for day_idx in 0..day_count {
    let date = first
      + Duration::days(day_idx as i64);
    let task_indices = tasks
      .iter()
      .enumerate()
      .filter(|(_, task)| {
        task.is_due_on(date)
      })
      .map(|(idx, _)| idx)
      .collect::<Vec<_>>();
    cells.push(CalendarCell::Day(
      DayCell {
        date,
        is_today: today == Some(date),
        task_indices
      }
    ));
  }

  tracing::debug!(
    year,
    month,
    offset,
    days = day_count,
    "calendar grid built"
  );

  Ok(MonthGrid {
    year,
    month,
    offset,
    cells
  })
}
