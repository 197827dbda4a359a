//! Critical-keyword classification
//!
//! Decides whether an observed warning or error escalates to a critical
//! notification. Informational output never escalates.

use crate::events::{NotificationKind, Severity};

/// Matches messages against a set of critical keywords
///
/// Keywords are matched case-insensitively as contiguous substrings, so a
/// multi-word keyword such as "server error" only matches when the words
/// appear together.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    /// Lower-cased keywords; empty entries are dropped
    keywords: Vec<String>,
}

impl KeywordClassifier {
    /// Create a classifier from the configured keyword list
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Whether the message contains any configured keyword
    pub fn contains_keyword(&self, message: &str) -> bool {
        if message.is_empty() || self.keywords.is_empty() {
            return false;
        }
        let lowered = message.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Classify a write observed at `severity`
    ///
    /// # Returns
    ///
    /// `Some(NotificationKind::Critical)` if the write escalates, `None` otherwise
    pub fn classify(&self, severity: Severity, message: &str) -> Option<NotificationKind> {
        if severity.can_escalate() && self.contains_keyword(message) {
            Some(NotificationKind::Critical)
        } else {
            None
        }
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CRITICAL_KEYWORDS;

    fn default_classifier() -> KeywordClassifier {
        KeywordClassifier::new(DEFAULT_CRITICAL_KEYWORDS)
    }

    #[test]
    fn test_error_with_keyword_escalates() {
        let classifier = default_classifier();
        assert_eq!(
            classifier.classify(Severity::Error, "Database connection FAILED"),
            Some(NotificationKind::Critical)
        );
        assert_eq!(
            classifier.classify(Severity::Warn, "Low memory - this is a Critical issue"),
            Some(NotificationKind::Critical)
        );
    }

    #[test]
    fn test_info_never_escalates() {
        let classifier = default_classifier();
        assert_eq!(classifier.classify(Severity::Info, "fatal crash"), None);
    }

    #[test]
    fn test_no_keyword_no_escalation() {
        let classifier = default_classifier();
        assert_eq!(classifier.classify(Severity::Error, "all good here"), None);
        assert_eq!(classifier.classify(Severity::Error, ""), None);
    }

    #[test]
    fn test_empty_keyword_list_never_escalates() {
        let classifier = KeywordClassifier::new(Vec::<String>::new());
        assert_eq!(classifier.classify(Severity::Error, "anything"), None);
        assert_eq!(classifier.keyword_count(), 0);
    }

    #[test]
    fn test_multi_word_keyword_is_contiguous() {
        let classifier = KeywordClassifier::new(["server error"]);
        assert!(classifier.contains_keyword("Internal SERVER ERROR on /api"));
        assert!(!classifier.contains_keyword("server returned an error"));
    }

    #[test]
    fn test_empty_keywords_are_dropped() {
        let classifier = KeywordClassifier::new(["", "boom"]);
        assert_eq!(classifier.keyword_count(), 1);
        assert!(!classifier.contains_keyword("quiet"));
    }
}
