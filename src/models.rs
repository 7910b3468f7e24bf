//! Core data models for the cashbook agent

use crate::error::BotError;
use crate::Result;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Ledger =================
//

/// One recorded financial movement.
///
/// `value` is always a non-negative magnitude; direction lives in `is_payment`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub value: f64,
    pub is_payment: bool,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entry {
    /// Build an entry from a signed amount, folding the sign into `is_payment`
    pub fn from_signed(
        owner: &str,
        amount: f64,
        description: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value: amount.abs(),
            is_payment: amount < 0.0,
            owner: owner.to_string(),
            created_at,
            description,
            tags: Vec::new(),
        }
    }

    /// Signed amount: negative for payments
    pub fn signed_value(&self) -> f64 {
        if self.is_payment {
            -self.value
        } else {
            self.value
        }
    }

    /// Append a tag unless the entry already carries it
    pub fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

//
// ================= Conversation =================
//

/// How the next free-text message of an owner is interpreted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingEntry,
    AwaitingTagName,
    AwaitingTagAssignment,
}

impl ConversationState {
    /// Integer code used by the persistent stores
    pub fn code(self) -> i16 {
        match self {
            ConversationState::Idle => 0,
            ConversationState::AwaitingEntry => 1,
            ConversationState::AwaitingTagName => 2,
            ConversationState::AwaitingTagAssignment => 3,
        }
    }

    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            0 => Ok(ConversationState::Idle),
            1 => Ok(ConversationState::AwaitingEntry),
            2 => Ok(ConversationState::AwaitingTagName),
            3 => Ok(ConversationState::AwaitingTagAssignment),
            other => Err(BotError::StateError(format!(
                "unknown conversation state code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingEntry => "awaiting-entry",
            ConversationState::AwaitingTagName => "awaiting-tag-name",
            ConversationState::AwaitingTagAssignment => "awaiting-tag-assignment",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Time Windows =================
//

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at < self.end
    }

    /// Calendar day of `now`, midnight to midnight in `now`'s timezone
    pub fn day_of<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let today = now.date_naive();
        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| BotError::InvalidEntry("date out of range".to_string()))?;

        Ok(Self {
            start: midnight(&now.timezone(), today)?,
            end: midnight(&now.timezone(), tomorrow)?,
        })
    }

    /// Calendar month of `now`, first-of-month to first-of-next-month
    pub fn month_of<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let (year, month) = (now.year(), now.month());
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| BotError::InvalidEntry("date out of range".to_string()))?;
        let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .ok_or_else(|| BotError::InvalidEntry("date out of range".to_string()))?;

        Ok(Self {
            start: midnight(&now.timezone(), first)?,
            end: midnight(&now.timezone(), next_first)?,
        })
    }
}

fn midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| BotError::InvalidEntry("invalid midnight".to_string()))?;

    // DST gaps can swallow midnight; earliest() takes the first valid instant
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| BotError::InvalidEntry(format!("no local midnight on {}", date)))
}

//
// ================= Reply =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    #[default]
    Plain,
    Markdown,
}

/// A rendered document handed to the transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportFile {
    pub name: String,
    #[serde(rename = "content_hex", with = "hex_bytes")]
    pub content: Vec<u8>,
}

/// Reply descriptor the transport turns into an outbound message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReplyPayload {
    pub body: String,
    pub mode: ReplyMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<ReportFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub remove_keyboard: bool,
}

impl ReplyPayload {
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn markdown(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            mode: ReplyMode::Markdown,
            ..Self::default()
        }
    }

    pub fn file(file: ReportFile) -> Self {
        Self {
            body: file.name.clone(),
            file: Some(file),
            ..Self::default()
        }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<String>>) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn removing_keyboard(mut self) -> Self {
        self.remove_keyboard = true;
        self
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
