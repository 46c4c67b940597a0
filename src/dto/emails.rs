use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Ready,
    Processing,
    Error,
    #[serde(other)]
    Unknown,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IngestionStatus::Ready | IngestionStatus::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadEmailsResponse {
    pub status: IngestionStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailStatusResponse {
    pub status: IngestionStatus,
    #[serde(default)]
    pub last_checked: Option<String>,
}

impl EmailStatusResponse {
    /// `last_checked` as a timestamp; accepts RFC 3339 or a naive ISO 8601 value.
    pub fn last_checked_at(&self) -> Option<NaiveDateTime> {
        let raw = self.last_checked.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.naive_local())
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub k: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub query: Option<String>,
}

impl SearchResponse {
    pub fn summaries(&self) -> Vec<EmailSummary> {
        self.results.iter().map(|r| EmailSummary::parse(r)).collect()
    }
}

/// Structured view of one search hit.
///
/// The backend returns each hit as formatted text:
///
/// ```text
/// <Email Start>
/// Date and Time: 2024-05-01 10:00
/// Sender: alice@example.com
/// CC: bob@example.com
/// Subject: Invoice
/// Email Context: Please find attached...
/// <Email End>
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSummary {
    pub subject: String,
    pub from: String,
    pub cc: String,
    pub date: String,
    pub preview: String,
    pub full_text: String,
}

impl EmailSummary {
    pub fn parse(text: &str) -> Self {
        let mut summary = EmailSummary {
            subject: "No Subject".to_string(),
            from: "Unknown".to_string(),
            cc: String::new(),
            date: String::new(),
            preview: String::new(),
            full_text: text.to_string(),
        };

        let mut in_content = false;
        let mut content = Vec::new();

        for line in text.trim().lines().map(str::trim) {
            if line.starts_with("<Email Start>") {
                continue;
            } else if line.starts_with("<Email End>") {
                break;
            } else if let Some(rest) = line.strip_prefix("Date and Time:") {
                summary.date = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("Sender:") {
                summary.from = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("CC:") {
                summary.cc = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("Subject:") {
                summary.subject = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("Email Context:") {
                in_content = true;
                let rest = rest.trim();
                if !rest.is_empty() {
                    content.push(rest);
                }
            } else if in_content && !line.is_empty() {
                content.push(line);
            }
        }

        summary.preview = content.join(" ");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_email() {
        let text = "<Email Start>\n\
                    Date and Time: 2024-05-01 10:00\n\
                    Sender: alice@example.com\n\
                    CC: bob@example.com\n\
                    Subject: Invoice #42\n\
                    Email Context: Please find the invoice attached.\n\
                    Payment is due Friday.\n\
                    \n\
                    <Email End>\n\
                    trailing noise";

        let summary = EmailSummary::parse(text);
        assert_eq!(summary.date, "2024-05-01 10:00");
        assert_eq!(summary.from, "alice@example.com");
        assert_eq!(summary.cc, "bob@example.com");
        assert_eq!(summary.subject, "Invoice #42");
        assert_eq!(
            summary.preview,
            "Please find the invoice attached. Payment is due Friday."
        );
        assert_eq!(summary.full_text, text);
    }

    #[test]
    fn test_parse_defaults_for_unstructured_text() {
        let summary = EmailSummary::parse("just some text");
        assert_eq!(summary.subject, "No Subject");
        assert_eq!(summary.from, "Unknown");
        assert!(summary.preview.is_empty());
    }

    #[test]
    fn test_ingestion_status_unknown_value() {
        let status: IngestionStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, IngestionStatus::Unknown);
        assert!(IngestionStatus::Ready.is_terminal());
        assert!(!IngestionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_last_checked_parsing() {
        let naive = EmailStatusResponse {
            status: IngestionStatus::Ready,
            last_checked: Some("2024-05-01T10:00:00.123456".into()),
        };
        assert!(naive.last_checked_at().is_some());

        let missing = EmailStatusResponse {
            status: IngestionStatus::Ready,
            last_checked: None,
        };
        assert!(missing.last_checked_at().is_none());
    }
}
