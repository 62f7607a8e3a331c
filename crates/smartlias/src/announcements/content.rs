//! Announcement input validation and content screening.
//!
//! Announcement bodies double as SMS text, so words that carrier filters
//! reject are blocked before an announcement can be saved.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{AnnouncementKind, TargetGroup};

/// Minimum title length, after trimming.
pub const TITLE_MIN_LEN: usize = 10;

/// Minimum content length, after trimming.
pub const CONTENT_MIN_LEN: usize = 30;

/// Maximum content length, after trimming.
pub const CONTENT_MAX_LEN: usize = 1000;

/// A word or phrase that SMS providers refuse to deliver.
#[derive(Debug)]
pub struct BlockedTerm {
    /// Name of the term for identification.
    pub name: &'static str,

    /// Message shown when the term is found.
    pub message: &'static str,

    regex: Regex,
}

impl BlockedTerm {
    /// Create a new blocked term.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(name: &'static str, message: &'static str, pattern: &str) -> Self {
        Self {
            name,
            message,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if the content contains this term.
    #[must_use]
    pub fn matches(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }
}

/// Terms screened out of announcement content.
pub fn blocked_terms() -> &'static [BlockedTerm] {
    static TERMS: OnceLock<Vec<BlockedTerm>> = OnceLock::new();
    TERMS.get_or_init(|| {
        vec![BlockedTerm::new(
            "test_word",
            "Content cannot contain the word \"test\" (blocked by SMS providers)",
            r"(?i)test",
        )]
    })
}

/// Announcement fields as submitted by the admin form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnouncementInput {
    /// Headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category code; General when absent.
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<AnnouncementKind>,
    /// Urgent flag.
    #[serde(alias = "isUrgent")]
    pub is_urgent: bool,
    /// Send SMS on publish.
    #[serde(alias = "sendSms")]
    pub send_sms: bool,
    /// Tags such as `purok:3`. Ignored unless `send_sms` is set.
    #[serde(alias = "smsTargetGroups")]
    pub sms_target_groups: Vec<String>,
}

/// Validated announcement fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementFields {
    /// Trimmed title.
    pub title: String,
    /// Trimmed content.
    pub content: String,
    /// Category.
    pub kind: AnnouncementKind,
    /// Urgent flag.
    pub is_urgent: bool,
    /// SMS audience; empty when no SMS was requested.
    pub sms_target_groups: Vec<TargetGroup>,
}

/// Validate a title.
///
/// # Errors
///
/// Returns a validation error if the title is too short.
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::validation("title", "Title is required"));
    }
    if title.chars().count() < TITLE_MIN_LEN {
        return Err(Error::validation(
            "title",
            format!("Title must be at least {TITLE_MIN_LEN} characters"),
        ));
    }
    Ok(title.to_string())
}

/// Validate announcement content.
///
/// # Errors
///
/// Returns a validation error for content that is too short, too long or
/// contains a blocked term.
pub fn validate_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::validation("content", "Content is required"));
    }
    let len = content.chars().count();
    if len < CONTENT_MIN_LEN {
        return Err(Error::validation(
            "content",
            format!("Content must be at least {CONTENT_MIN_LEN} characters"),
        ));
    }
    if len > CONTENT_MAX_LEN {
        return Err(Error::validation(
            "content",
            format!("Content must not exceed {CONTENT_MAX_LEN} characters"),
        ));
    }
    if let Some(term) = blocked_terms().iter().find(|t| t.matches(content)) {
        return Err(Error::validation("content", term.message));
    }
    Ok(content.to_string())
}

/// Parse SMS target tags, dropping duplicates.
///
/// # Errors
///
/// Returns a validation error naming the first unknown tag.
pub fn parse_target_groups<S: AsRef<str>>(tags: &[S]) -> Result<Vec<TargetGroup>> {
    let mut groups = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.as_ref();
        let group = tag.parse::<TargetGroup>().map_err(|_| {
            Error::validation("sms_target_groups", format!("Invalid target group: {tag}"))
        })?;
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    Ok(groups)
}

impl AnnouncementInput {
    /// Validate and normalise the input.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<AnnouncementFields> {
        let title = validate_title(&self.title)?;
        let content = validate_content(&self.content)?;
        let sms_target_groups = if self.send_sms {
            let groups = parse_target_groups(&self.sms_target_groups)?;
            if groups.is_empty() {
                return Err(Error::validation(
                    "sms_target_groups",
                    "Select at least one SMS target group",
                ));
            }
            groups
        } else {
            Vec::new()
        };
        Ok(AnnouncementFields {
            title,
            content,
            kind: self.kind.unwrap_or_default(),
            is_urgent: self.is_urgent,
            sms_target_groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpecialCategory;

    const BODY: &str = "Free check-ups at the barangay hall on Saturday morning.";

    fn input() -> AnnouncementInput {
        AnnouncementInput {
            title: "Medical mission".to_string(),
            content: BODY.to_string(),
            ..AnnouncementInput::default()
        }
    }

    #[test]
    fn test_blocked_test_word() {
        let term = &blocked_terms()[0];
        assert!(term.matches("This is a test message"));
        assert!(term.matches("TEST"));
        assert!(term.matches("test."));
        assert!(!term.matches("Free vaccination at the clinic"));
    }

    #[test]
    fn test_blocked_word_inside_other_words() {
        let term = &blocked_terms()[0];
        assert!(term.matches("Testing of the new water line starts Monday"));
        assert!(term.matches("Free COVID tests at the health center"));
        assert!(term.matches("Latest schedule for garbage collection"));
        assert!(validate_content("Latest schedule for garbage collection in all puroks.").is_err());
    }

    #[test]
    fn test_title_rules() {
        assert_eq!(validate_title("  Medical mission ").unwrap(), "Medical mission");
        assert_eq!(validate_title("   ").unwrap_err().to_string(), "Title is required");
        assert_eq!(
            validate_title("Too short").unwrap_err().to_string(),
            "Title must be at least 10 characters"
        );
    }

    #[test]
    fn test_content_rules() {
        assert_eq!(validate_content(BODY).unwrap(), BODY);
        assert!(validate_content("Only twenty nine characters!!").is_err());
        assert!(validate_content(&"a".repeat(1001)).is_err());
        assert!(validate_content(&"a".repeat(1000)).is_ok());
        let err = validate_content("Please ignore, this is a test of the SMS broadcast.")
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("\"test\""));
    }

    #[test]
    fn test_content_length_counts_characters() {
        let accented = "ñ".repeat(30);
        assert_eq!(validate_content(&accented).unwrap(), accented);
    }

    #[test]
    fn test_sms_groups_required_only_when_sending() {
        let mut plain = input();
        plain.sms_target_groups = vec!["bogus".to_string()];
        assert!(plain.validate().unwrap().sms_target_groups.is_empty());

        let mut sms = input();
        sms.send_sms = true;
        assert_eq!(
            sms.validate().unwrap_err().to_string(),
            "Select at least one SMS target group"
        );

        sms.sms_target_groups = vec![
            "purok:2".to_string(),
            "special_category:PWD".to_string(),
            "purok:2".to_string(),
        ];
        assert_eq!(
            sms.validate().unwrap().sms_target_groups,
            vec![
                TargetGroup::Purok(2),
                TargetGroup::SpecialCategory(SpecialCategory::Pwd)
            ]
        );

        sms.sms_target_groups = vec!["everyone".to_string()];
        assert_eq!(
            sms.validate().unwrap_err().to_string(),
            "Invalid target group: everyone"
        );
    }

    #[test]
    fn test_kind_defaults_to_general() {
        let parsed: AnnouncementInput = serde_json::from_str(&format!(
            r#"{{"title": "Medical mission", "content": "{BODY}", "isUrgent": true}}"#
        ))
        .unwrap();
        let fields = parsed.validate().unwrap();
        assert_eq!(fields.kind, AnnouncementKind::General);
        assert!(fields.is_urgent);

        let parsed: AnnouncementInput =
            serde_json::from_str(r#"{"title": "x", "content": "y", "type": 4}"#).unwrap();
        assert_eq!(parsed.kind, Some(AnnouncementKind::Assistance));
    }
}
