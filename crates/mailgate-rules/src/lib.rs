//! # Mailgate Rules
//!
//! Classifies a message summary (sender, subject, optional body snippet)
//! into an alert category. Pure and deterministic: the only inputs are
//! the three configured pattern lists and the message fields.
//!
//! Priority is strict and deliberate: sender-level suppression beats
//! everything (urgent wording from a no-reply address is still noise),
//! bulk detection beats keyword detection (a "Newsletter — Action
//! Required" is still bulk), and the question-mark heuristic on the body
//! is the weakest signal.

use mailgate_core::config::RulesConfig;
use mailgate_core::types::{Category, Classification};

/// Priority-ordered substring classifier.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    ignore_senders: Vec<String>,
    ignore_subjects: Vec<String>,
    action_keywords: Vec<String>,
}

impl RuleEngine {
    /// Build from configured pattern lists. The lists are expected to be
    /// lowercase already (`RulesConfig::normalize`); matching is substring
    /// containment in configured order.
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            ignore_senders: rules.ignore_senders.clone(),
            ignore_subjects: rules.ignore_subjects.clone(),
            action_keywords: rules.action_keywords.clone(),
        }
    }

    /// Classify one message. Never fails; empty inputs are fine.
    pub fn classify(&self, from: &str, subject: &str, snippet: &str) -> Classification {
        let from_lower = from.to_lowercase();
        let subject_lower = subject.to_lowercase();

        if self.ignore_senders.iter().any(|p| from_lower.contains(p)) {
            return Classification::new(Category::InfoOnly, "no-reply sender");
        }

        if self.ignore_subjects.iter().any(|p| subject_lower.contains(p)) {
            return Classification::new(Category::InfoOnly, "bulk/newsletter pattern");
        }

        if let Some(keyword) = self
            .action_keywords
            .iter()
            .find(|p| subject_lower.contains(p.as_str()))
        {
            return Classification::new(Category::ActionRequired, format!("keyword: {keyword}"));
        }

        if !snippet.is_empty() && snippet.contains('?') {
            return Classification::new(Category::ActionRequired, "question in body");
        }

        Classification::new(Category::InfoOnly, "no action signals")
    }
}
