use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::warn;

pub const TOKEN_ENV_VAR: &str = "GITHUB_ACCESS_TOKEN";

/// Reads the API token from the environment. A missing token is a fatal
/// configuration error; no request can be made without it.
pub fn github_token() -> Result<String> {
    std::env::var(TOKEN_ENV_VAR).with_context(|| {
        format!(
            "set {} env var with a PAT that can read the org repos",
            TOKEN_ENV_VAR
        )
    })
}

/// Repository visibility filter, mapped onto the GraphQL `privacy` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    Public,
    Private,
}

impl Visibility {
    /// Unrecognized values degrade to `All` with a warning instead of
    /// aborting the run.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "public" => Visibility::Public,
            "private" => Visibility::Private,
            "" | "all" => Visibility::All,
            other => {
                warn!("unknown visibility {:?} -> using all", other);
                Visibility::All
            }
        }
    }

    /// The GraphQL variable value; `None` means the variable is omitted
    /// entirely and the server applies no privacy filter.
    pub fn privacy_filter(&self) -> Option<&'static str> {
        match self {
            Visibility::All => None,
            Visibility::Public => Some("PUBLIC"),
            Visibility::Private => Some("PRIVATE"),
        }
    }
}

/// Merge-date window. Both bounds are inclusive; an unset bound imposes no
/// constraint on that side.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(since: Option<&str>, until: Option<&str>) -> Self {
        Self {
            since: since.and_then(parse_time_filter),
            until: until.and_then(parse_time_filter),
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if t < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if t > until {
                return false;
            }
        }
        true
    }
}

/// Accepts RFC3339 timestamps (with or without fractional seconds) or plain
/// `YYYY-MM-DD` dates, read as midnight UTC. Unparseable values log a warning
/// and disable the filter on that side.
pub fn parse_time_filter(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Some(Utc.from_utc_datetime(&midnight));
        }
    }
    warn!("cannot parse time {:?}, ignoring filter", s);
    None
}
