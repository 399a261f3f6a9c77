use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{
  Datelike,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::config::Config;
use crate::error::TaskError;

const TIMEZONE_CONFIG_FILE: &str =
  "docket-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DOCKET_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DOCKET_TIME_CONFIG";

pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

fn iso_date_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> =
    OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r"^(\d{4})-(\d{2})-(\d{2})$"
    )
    .unwrap_or_else(|_| {
      unreachable!(
        "static ISO date pattern is \
         valid"
      )
    })
  })
}

fn year_month_pattern() -> &'static Regex
{
  static PATTERN: OnceLock<Regex> =
    OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})$")
      .unwrap_or_else(|_| {
        unreachable!(
          "static year-month pattern \
           is valid"
        )
      })
  })
}

/// Parses a strict `YYYY-MM-DD` calendar date.
///
/// Anything else, including out-of-range components such as `2026-02-30`,
/// is rejected instead of being carried around as an unusable string.
pub fn parse_iso_date(
  input: &str
) -> Result<NaiveDate, TaskError> {
  let token = input.trim();
  let invalid = || {
    TaskError::InvalidDate(
      token.to_string()
    )
  };

  let caps = iso_date_pattern()
    .captures(token)
    .ok_or_else(invalid)?;
  let year = caps[1]
    .parse::<i32>()
    .map_err(|_| invalid())?;
  let month = caps[2]
    .parse::<u32>()
    .map_err(|_| invalid())?;
  let day = caps[3]
    .parse::<u32>()
    .map_err(|_| invalid())?;

  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .ok_or_else(invalid)
}

/// Parses a `YYYY-MM` month selector into `(year, month)`.
pub fn parse_year_month(
  input: &str
) -> Result<(i32, u32), TaskError> {
  let token = input.trim();
  let caps = year_month_pattern()
    .captures(token)
    .ok_or_else(|| {
      TaskError::InvalidDate(
        token.to_string()
      )
    })?;
  let year = caps[1]
    .parse::<i32>()
    .map_err(|_| {
      TaskError::InvalidDate(
        token.to_string()
      )
    })?;
  let month = caps[2]
    .parse::<u32>()
    .map_err(|_| {
      TaskError::InvalidDate(
        token.to_string()
      )
    })?;
  if !(1..=12).contains(&month) {
    return Err(
      TaskError::InvalidMonth(month)
    );
  }
  Ok((year, month))
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date
    .format(ISO_DATE_FORMAT)
    .to_string()
}

/// The current calendar date, at midnight, in the configured timezone.
///
/// Without a configured timezone the system local time is used.
#[must_use]
pub fn today(
  timezone: Option<Tz>
) -> NaiveDate {
  match timezone {
    | Some(tz) => {
      Utc::now()
        .with_timezone(&tz)
        .date_naive()
    }
    | None => Local::now().date_naive()
  }
}

#[must_use]
pub fn year_month_of(
  date: NaiveDate
) -> (i32, u32) {
  (date.year(), date.month())
}

/// Resolves the timezone used to decide what "today" is.
///
/// Precedence: `DOCKET_TIMEZONE`, the `timezone` config key, then a
/// `docket-time.toml` file. `None` means system local time.
#[tracing::instrument(skip(cfg))]
pub fn resolve_timezone(
  cfg: &Config
) -> Option<Tz> {
  let env_tz =
    std::env::var(TIMEZONE_ENV_VAR)
      .ok();
  let file = timezone_config_path(
    std::env::var(
      TIMEZONE_CONFIG_ENV_VAR
    )
    .ok()
    .as_deref()
  );
  resolve_timezone_from(
    env_tz.as_deref(),
    cfg,
    file.as_ref()
  )
}

fn resolve_timezone_from(
  env_tz: Option<&str>,
  cfg: &Config,
  file: Option<&PathBuf>
) -> Option<Tz> {
  if let Some(raw) = env_tz
    && let Some(tz) =
      parse_timezone(raw, TIMEZONE_ENV_VAR)
  {
    return Some(tz);
  }

  if let Some(raw) = cfg.get("timezone")
    && let Some(tz) =
      parse_timezone(&raw, "docketrc")
  {
    return Some(tz);
  }

  if let Some(path) = file
    && let Some(tz) =
      load_timezone_from_file(path)
  {
    return Some(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  None
}

/// `DOCKET_TIME_CONFIG` when set, else `docket-time.toml` in the working
/// directory.
fn timezone_config_path(
  env_path: Option<&str>
) -> Option<PathBuf> {
  if let Some(raw) = env_path {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::trace!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  parse_timezone_toml(
    &raw,
    &format!("file:{}", path.display())
  )
}

fn parse_timezone_toml(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let parsed = match toml::from_str::<
    TimezoneConfig
  >(raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        source,
        error = %err,
        "failed parsing timezone config"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      source,
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(&timezone, source)
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}


pub mod iso_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_iso_date(*date)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso_date(&raw)
      .map_err(serde::de::Error::custom)
  }
}
