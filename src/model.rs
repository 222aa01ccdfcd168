use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Lead status as stored in the table. Values this tool does not know about
/// are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadStatus {
    New,
    Contacted,
    Queued,
    IgDeleted,
    Other(String),
}

impl LeadStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Queued => "QUEUED",
            LeadStatus::IgDeleted => "IG_DELETED",
            LeadStatus::Other(s) => s,
        }
    }
}

impl From<String> for LeadStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NEW" => LeadStatus::New,
            "CONTACTED" => LeadStatus::Contacted,
            "QUEUED" => LeadStatus::Queued,
            "IG_DELETED" => LeadStatus::IgDeleted,
            _ => LeadStatus::Other(s),
        }
    }
}

impl From<LeadStatus> for String {
    fn from(status: LeadStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the leads table.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadRecord {
    pub id: String,
    #[serde(rename = "createdTime", default, deserialize_with = "lenient_timestamp")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: LeadFields,
}

/// The subset of lead columns this tool reads. Empty cells are omitted by
/// the store, so every column is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub instagram_handle: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<LeadStatus>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeadRecord {
    /// Display name for logs, falling back to the record id.
    pub fn display_name(&self) -> &str {
        self.fields
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Formula errors (`{"specialValue":"NaN"}`) and lookup arrays read as missing
/// instead of failing the whole page.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<LeadStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.map(LeadStatus::from))
}

/// Accepts RFC 3339 strings and treats anything else as missing.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

/// Follower/following counts for one handle at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub followers: u64,
    pub following: u64,
}

/// Opaque continuation token handed out by the table store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        PageCursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of records; `next` is `None` on the final page.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<LeadRecord>,
    pub next: Option<PageCursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort {
            field: field.into(),
            direction,
        }
    }
}
