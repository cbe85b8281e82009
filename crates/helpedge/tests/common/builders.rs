//! Builders for raw test messages.

#![allow(dead_code)]

/// Builder for raw RFC 5322 messages.
pub struct MessageBuilder {
    from: Option<String>,
    subject: Option<String>,
    message_id: Option<String>,
    date: Option<String>,
    html: bool,
    body: String,
}

impl MessageBuilder {
    /// Create a plain-text message with a sender, subject and Date.
    pub fn new() -> Self {
        Self {
            from: Some("Customer <customer@example.com>".to_string()),
            subject: Some("Help needed".to_string()),
            message_id: None,
            date: Some("Tue, 1 Jul 2025 10:52:37 +0000".to_string()),
            html: false,
            body: "Hello, something is wrong.".to_string(),
        }
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = Some(from.to_string());
        self
    }

    pub fn no_from(mut self) -> Self {
        self.from = None;
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn no_subject(mut self) -> Self {
        self.subject = None;
        self
    }

    pub fn message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut raw = String::new();
        if let Some(from) = &self.from {
            raw.push_str(&format!("From: {}\r\n", from));
        }
        raw.push_str("To: helpdesk@example.com\r\n");
        if let Some(subject) = &self.subject {
            raw.push_str(&format!("Subject: {}\r\n", subject));
        }
        if let Some(date) = &self.date {
            raw.push_str(&format!("Date: {}\r\n", date));
        }
        if let Some(id) = &self.message_id {
            raw.push_str(&format!("Message-ID: <{}>\r\n", id));
        }
        raw.push_str("MIME-Version: 1.0\r\n");
        let content_type = if self.html { "text/html" } else { "text/plain" };
        raw.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", content_type));
        raw.push_str("\r\n");
        raw.push_str(&self.body);
        raw.push_str("\r\n");
        raw.into_bytes()
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A message with the given subject and body from `customer@example.com`.
pub fn simple_message(subject: &str, body: &str) -> Vec<u8> {
    MessageBuilder::new().subject(subject).body(body).build()
}

/// Bytes no parser can make sense of.
pub fn unreadable_message() -> Vec<u8> {
    b"\r\n\r\n".to_vec()
}

/// Non-blank binary garbage with no `name: value` field in it.
pub fn binary_junk_message() -> Vec<u8> {
    b"\x00\xff\xfe junk".to_vec()
}
