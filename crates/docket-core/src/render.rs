use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarCell, DayCell, IndicatorPolicy, MonthGrid, WEEKDAY_LABELS};
use crate::config::Config;
use crate::datetime::format_iso_date;
use crate::deadline::{Countdown, calculate_days_left};
use crate::task::Task;

const CELL_WIDTH: usize = 8;
const MARKER: &str = "•";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    highlight_today: bool,
    policy: IndicatorPolicy,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            highlight_today: cfg.get_bool("calendar.highlight_today").unwrap_or(true),
            policy: cfg.indicator_policy()?,
        })
    }

    pub fn with_options(color: bool, highlight_today: bool, policy: IndicatorPolicy) -> Self {
        Self {
            color,
            highlight_today,
            policy,
        }
    }

    /// Renders the task list followed by the calendar, the way every
    /// mutation re-derives both views.
    #[tracing::instrument(skip(self, tasks, grid))]
    pub fn print_views(&self, tasks: &[Task], grid: &MonthGrid, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, tasks, today)?;
        writeln!(out)?;
        self.write_calendar(&mut out, grid, tasks)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&self, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, tasks, today)
    }

    #[tracing::instrument(skip(self, grid, tasks))]
    pub fn print_calendar(&self, grid: &MonthGrid, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_calendar(&mut out, grid, tasks)
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Task".to_string(),
            "Deadline".to_string(),
            "Countdown".to_string(),
            "Color".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for (idx, task) in tasks.iter().enumerate() {
            let position = self.paint(&(idx + 1).to_string(), "33");
            let done = if task.completed { "x" } else { "" }.to_string();
            let name = if task.completed {
                self.paint(&task.name, "9")
            } else {
                task.name.clone()
            };

            let countdown = calculate_days_left(task.date, today);
            let countdown_text = countdown.to_string();
            let countdown_text = if task.completed {
                countdown_text
            } else if countdown.is_overdue() {
                self.paint(&countdown_text, "31")
            } else if countdown == Countdown::Today {
                self.paint(&countdown_text, "33")
            } else {
                countdown_text
            };

            let swatch = match &task.color {
                Some(color) => format!("{} {color}", self.swatch(color)),
                None => String::new(),
            };

            rows.push(vec![
                position,
                done,
                name,
                format_iso_date(task.date),
                countdown_text,
                swatch,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn write_calendar<W: Write>(
        &self,
        mut out: W,
        grid: &MonthGrid,
        tasks: &[Task],
    ) -> anyhow::Result<()> {
        let cells = grid
            .cells
            .iter()
            .map(|cell| match cell {
                CalendarCell::Empty => String::new(),
                CalendarCell::Day(day) => self.day_cell(day, tasks),
            })
            .collect::<Vec<_>>();
        // Columns widen together so every cell stays under its weekday.
        let width = cells
            .iter()
            .map(|text| visible_width(text) + 1)
            .max()
            .unwrap_or(0)
            .max(CELL_WIDTH);

        writeln!(out, "{}", grid.title())?;
        for label in WEEKDAY_LABELS {
            write!(out, "{}", pad_visible(label, width))?;
        }
        writeln!(out)?;

        for week in cells.chunks(7) {
            let line = week
                .iter()
                .map(|text| pad_visible(text, width))
                .collect::<String>();
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    fn day_cell(&self, cell: &DayCell, tasks: &[Task]) -> String {
        let label = if cell.is_today && self.highlight_today {
            if self.color {
                format!("\x1b[7m{:>2}\x1b[0m  ", cell.day())
            } else {
                format!("[{:>2}]", cell.day())
            }
        } else {
            format!("{:>2}  ", cell.day())
        };

        let indicators = self.policy.indicators(cell, tasks);
        let mut text = label;
        for color in &indicators.colors {
            text.push_str(&self.swatch(color));
        }
        if indicators.overflow > 0 {
            text.push_str(&format!("+{}", indicators.overflow));
        }
        text
    }

    fn swatch(&self, color: &str) -> String {
        if !self.color {
            return MARKER.to_string();
        }
        match csscolorparser::parse(color) {
            Ok(parsed) => {
                let [r, g, b, _] = parsed.to_rgba8();
                format!("\x1b[38;2;{r};{g};{b}m{MARKER}\x1b[0m")
            }
            Err(_) => MARKER.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

fn pad_visible(cell: &str, width: usize) -> String {
    let padding = width.saturating_sub(visible_width(cell));
    format!("{cell}{}", " ".repeat(padding))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
