//! Raw MIME to structured message conversion.

use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{Header, Message, MessageParser};

use crate::model::{truncate_chars, MAX_DESCRIPTION_CHARS};

use super::error::ParseError;

/// Address substituted when a message carries no usable sender.
pub const UNKNOWN_SENDER: &str = "unknown@example.com";

/// A message reduced to the fields a ticket needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    /// Subject line, `None` when absent or blank.
    pub subject: Option<String>,
    /// Plain-text body, possibly empty, already truncated.
    pub body: String,
    /// Lowercased sender address, or [`UNKNOWN_SENDER`].
    pub from_address: String,
    /// Sender display name, if the From header had one.
    pub from_name: Option<String>,
    /// The Date header, or the time of parsing when it is missing.
    pub received_at: DateTime<Utc>,
    /// Message-ID header without angle brackets.
    pub message_id: Option<String>,
}

impl ParsedEmail {
    /// True when the sender was substituted with [`UNKNOWN_SENDER`].
    pub fn has_unknown_sender(&self) -> bool {
        self.from_address == UNKNOWN_SENDER
    }
}

/// Parser for turning fetched messages into [`ParsedEmail`] values.
#[derive(Debug, Clone)]
pub struct EmailParser {
    max_body_chars: usize,
}

impl Default for EmailParser {
    fn default() -> Self {
        Self::new(MAX_DESCRIPTION_CHARS)
    }
}

impl EmailParser {
    /// Creates a parser that truncates bodies to `max_body_chars` characters.
    pub fn new(max_body_chars: usize) -> Self {
        Self { max_body_chars }
    }

    /// Parses a raw RFC 5322 message.
    ///
    /// Malformed but readable content degrades to placeholders: a missing
    /// text part gives an empty body and a missing sender gives
    /// [`UNKNOWN_SENDER`]. Only byte streams with no recognisable header
    /// block are rejected.
    pub fn parse(&self, raw: &[u8]) -> Result<ParsedEmail, ParseError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Unreadable {
                size: raw.len(),
                reason: "message is empty".to_string(),
            });
        }

        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| ParseError::Unreadable {
                size: raw.len(),
                reason: "not an RFC 5322 message".to_string(),
            })?;

        // mail-parser turns any leading run of bytes into a header name, even
        // without a colon, so only well-formed fields count as a header block.
        if !message.headers().iter().any(|h| is_header_field(raw, h)) {
            return Err(ParseError::Unreadable {
                size: raw.len(),
                reason: "no header block".to_string(),
            });
        }

        let parsed = ParsedEmail {
            subject: non_blank(message.subject()),
            body: self.extract_body(&message),
            from_address: sender_address(&message),
            from_name: sender_name(&message),
            received_at: received_at(&message),
            message_id: non_blank(message.message_id()),
        };

        debug!(
            "Parsed message from={} subject={:?} body_chars={}",
            parsed.from_address,
            parsed.subject.as_deref().unwrap_or("(no subject)"),
            parsed.body.chars().count()
        );
        Ok(parsed)
    }

    fn extract_body(&self, message: &Message) -> String {
        // body_text falls back to a text rendering of the HTML part.
        let text = message.body_text(0).unwrap_or_default();
        truncate_chars(text.trim_end(), self.max_body_chars)
    }
}

/// A `name: value` field whose name is printable ASCII without spaces.
fn is_header_field(raw: &[u8], header: &Header) -> bool {
    let name = header.name();
    let well_named = !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':');
    let has_colon = raw
        .get(header.offset_field() as usize..header.offset_start() as usize)
        .is_some_and(|field| field.contains(&b':'));
    well_named && has_colon
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn sender_address(message: &Message) -> String {
    message
        .from()
        .and_then(|addr| addr.first())
        .and_then(|addr| non_blank(addr.address()))
        .map(|addr| addr.to_lowercase())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string())
}

fn sender_name(message: &Message) -> Option<String> {
    message
        .from()
        .and_then(|addr| addr.first())
        .and_then(|addr| non_blank(addr.name()))
}

fn received_at(message: &Message) -> DateTime<Utc> {
    message
        .date()
        .and_then(|date| DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0))
        .unwrap_or_else(Utc::now)
}
