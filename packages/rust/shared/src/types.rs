//! Core domain types for job postings and their sent records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Posting
// ---------------------------------------------------------------------------

/// A single job opportunity scraped from a source table.
///
/// The on-disk form uses camelCase keys so existing sent-record files stay
/// readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    /// Hiring company.
    pub company: String,
    /// Role or position title.
    pub role: String,
    /// Date as published by the source, e.g. `"Jan 5"`. Never carries a year.
    pub date_posted: String,
    /// Where the role is based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Link to the application page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_link: Option<String>,
    /// When this posting was sent to an audience. Set only by de-duplication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_message_sent: Option<DateTime<Utc>>,
}

impl Posting {
    /// Create an unsent posting with just the identity fields.
    pub fn new(
        company: impl Into<String>,
        role: impl Into<String>,
        date_posted: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            role: role.into(),
            date_posted: date_posted.into(),
            location: None,
            application_link: None,
            date_message_sent: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_application_link(mut self, link: impl Into<String>) -> Self {
        self.application_link = Some(link.into());
        self
    }

    /// Identity used for de-duplication.
    pub fn key(&self) -> PostingKey<'_> {
        PostingKey {
            company: &self.company,
            role: &self.role,
            date_posted: &self.date_posted,
        }
    }

    /// Return a copy stamped as sent at `at`.
    pub fn mark_sent(&self, at: DateTime<Utc>) -> Self {
        Self {
            date_message_sent: Some(at),
            ..self.clone()
        }
    }

    pub fn is_sent(&self) -> bool {
        self.date_message_sent.is_some()
    }
}

// ---------------------------------------------------------------------------
// PostingKey
// ---------------------------------------------------------------------------

/// `(company, role, date_posted)`: two postings with equal keys are the same
/// posting, whatever their other fields say. Comparison is exact and
/// case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostingKey<'a> {
    pub company: &'a str,
    pub role: &'a str,
    pub date_posted: &'a str,
}

impl std::fmt::Display for PostingKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} ({})", self.company, self.role, self.date_posted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_sent_timestamp_and_extras() {
        let fresh = Posting::new("Acme", "SWE Intern", "Jan 5");
        let sent = fresh
            .clone()
            .with_location("Remote")
            .mark_sent(Utc::now());

        assert_ne!(fresh, sent);
        assert_eq!(fresh.key(), sent.key());
    }

    #[test]
    fn key_is_case_sensitive() {
        let a = Posting::new("Acme", "SWE Intern", "Jan 5");
        let b = Posting::new("acme", "SWE Intern", "Jan 5");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn serializes_with_camel_case_and_omits_unset_fields() {
        let posting = Posting::new("Acme", "SWE Intern", "Jan 5");
        let json = serde_json::to_value(&posting).expect("serialize");

        assert_eq!(json["datePosted"], "Jan 5");
        assert!(json.get("dateMessageSent").is_none());
        assert!(json.get("location").is_none());
    }

    #[test]
    fn reads_legacy_sent_record() {
        let json = r#"{
            "company": "Acme",
            "role": "SWE Intern",
            "datePosted": "Jan 5",
            "dateMessageSent": "2024-01-06T10:15:00.000Z"
        }"#;
        let posting: Posting = serde_json::from_str(json).expect("deserialize");
        assert!(posting.is_sent());
        assert_eq!(posting.key().company, "Acme");
    }
}
