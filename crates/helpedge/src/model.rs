//! Ticket and category records shared by the store and the ingestion pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix of every generated ticket number.
pub const TICKET_NUMBER_PREFIX: &str = "TKT-";

/// Minimum number of digits in a ticket number.
pub const TICKET_NUMBER_WIDTH: usize = 6;

/// Longest ticket title accepted by the store.
pub const MAX_TITLE_CHARS: usize = 200;

/// Longest ticket description accepted by the store.
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Longest customer display name accepted by the store.
pub const MAX_CUSTOMER_NAME_CHARS: usize = 100;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("valid regex"));

static TICKET_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^TKT-\d{6,}$").expect("valid regex"));

/// Formats a counter value as a ticket number, e.g. `7` -> `TKT-000007`.
pub fn format_ticket_number(value: i64, width: usize) -> String {
    format!("{}{:0width$}", TICKET_NUMBER_PREFIX, value, width = width)
}

/// Returns true if `s` looks like a generated ticket number.
pub fn is_valid_ticket_number(s: &str) -> bool {
    TICKET_NUMBER.is_match(s)
}

/// Returns true if `s` is a `#RGB` or `#RRGGBB` color.
pub fn is_valid_hex_color(s: &str) -> bool {
    HEX_COLOR.is_match(s)
}

/// Truncates `s` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Ticket lifecycle state. Ingested mail always starts `Open`.
    TicketStatus, "status" {
        Open => "open",
        InProgress => "in-progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

string_enum!(
    /// Ticket urgency. Ingested mail is always `Medium`.
    TicketPriority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
);

string_enum!(
    /// Channel a ticket arrived through.
    TicketSource, "source" {
        Email => "email",
        Web => "web",
        Phone => "phone",
        Chat => "chat",
    }
);

/// A persisted classification category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a category that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_by: String,
}

/// A persisted support ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub ticket_number: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category_id: String,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub source: TicketSource,
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a ticket about to be inserted. The ticket number is assigned
/// separately by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category_id: String,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub source: TicketSource,
    pub message_id: Option<String>,
}
