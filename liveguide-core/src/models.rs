use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH#{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProgramId(String);

impl ProgramId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PG#{}", self.0)
    }
}

impl From<&str> for ProgramId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProgramId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A reference to the primary image of an item on the media server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub item_id: String,
    pub tag: String,
}

/// The identity of the user on whose behalf the guide is fetched.
///
/// Supplied by the host application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Session {
            user_id: user_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork: Option<Artwork>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: ProgramId,
    pub channel_id: ChannelId,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork: Option<Artwork>,
}

impl Program {
    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    /// Returns `true` if `now` is in `[start_at, end_at)`.
    pub fn is_airing(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now < self.end_at
    }

    /// Returns the elapsed fraction of the program while it's airing.
    pub fn progress(&self, now: DateTime<Utc>) -> Option<f64> {
        if !self.is_airing(now) {
            return None;
        }
        let elapsed = (now - self.start_at).num_milliseconds() as f64;
        let total = self.duration().num_milliseconds() as f64;
        Some((elapsed / total).clamp(0.0, 1.0))
    }
}

/// A channel paired with its programs in the time window.
///
/// Programs are sorted by `start_at` in ascending order and every program
/// belongs to `channel`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProgramAggregate {
    pub channel: Channel,
    pub programs: Vec<Program>,
}

impl ChannelProgramAggregate {
    /// Returns the first program on air at `now`.
    pub fn current_program(&self, now: DateTime<Utc>) -> Option<&Program> {
        self.programs.iter().find(|program| program.is_airing(now))
    }
}

/// The range of time displayed in the guide.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "reason")]
pub enum RefreshState {
    Initial,
    Refreshing,
    Content,
    Error(String),
}

impl RefreshState {
    pub fn is_refreshing(&self) -> bool {
        matches!(self, RefreshState::Refreshing)
    }
}

// </coverage:exclude>
