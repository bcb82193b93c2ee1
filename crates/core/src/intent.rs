//! Intent tags and the entities extracted alongside them.

use serde::{Deserialize, Serialize};

use crate::cutoff::Quota;

/// The classified purpose of a user message. Exactly one per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Informational,
    Cutoff,
    /// Both the cutoff engine and retrieval must be consulted.
    Mixed,
    OutOfScope,
    ContactRequest,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Informational => "informational",
            Intent::Cutoff => "cutoff",
            Intent::Mixed => "mixed",
            Intent::OutOfScope => "out_of_scope",
            Intent::ContactRequest => "contact_request",
        }
    }

    pub fn needs_cutoff_lookup(&self) -> bool {
        matches!(self, Intent::Cutoff | Intent::Mixed)
    }

    pub fn needs_retrieval(&self) -> bool {
        matches!(self, Intent::Informational | Intent::Mixed)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fields pulled out of a message for the cutoff engine.
///
/// Values are canonical codes when the spelling was recognized and the raw
/// token otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    /// Branch codes in the order they were mentioned, deduplicated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
    /// The user asked about every branch.
    #[serde(default)]
    pub all_branches: bool,
    pub category: Option<String>,
    pub year: Option<u16>,
    pub quota: Option<Quota>,
    pub gender: Option<String>,
    pub rank: Option<u32>,
    pub disability: Option<String>,
}

impl Entities {
    /// Number of cutoff-relevant fields present. Used to detect terse
    /// structured follow-ups such as "CSE, OC, boys, 8000".
    pub fn structured_field_count(&self) -> usize {
        [
            !self.branches.is_empty() || self.all_branches,
            self.category.is_some(),
            self.gender.is_some(),
            self.rank.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.structured_field_count() == 0
            && self.year.is_none()
            && self.quota.is_none()
            && self.disability.is_none()
    }

    /// Fill fields missing here from an earlier turn's entities.
    pub fn merge_missing(&mut self, earlier: &Entities) {
        if self.branches.is_empty() && !self.all_branches {
            self.branches = earlier.branches.clone();
            self.all_branches = earlier.all_branches;
        }
        self.category = self.category.take().or_else(|| earlier.category.clone());
        self.year = self.year.or(earlier.year);
        self.quota = self.quota.or(earlier.quota);
        self.gender = self.gender.take().or_else(|| earlier.gender.clone());
        self.rank = self.rank.or(earlier.rank);
        self.disability = self.disability.take().or_else(|| earlier.disability.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Intent::OutOfScope).unwrap(), "out_of_scope");
        assert_eq!(serde_json::to_value(Intent::ContactRequest).unwrap(), "contact_request");
        assert_eq!(Intent::Mixed.to_string(), "mixed");
    }

    #[test]
    fn mixed_needs_both_paths() {
        assert!(Intent::Mixed.needs_cutoff_lookup());
        assert!(Intent::Mixed.needs_retrieval());
        assert!(!Intent::Greeting.needs_retrieval());
        assert!(!Intent::Informational.needs_cutoff_lookup());
    }

    #[test]
    fn structured_field_count() {
        let e = Entities {
            branches: vec!["CSE".into()],
            category: Some("OC".into()),
            gender: Some("Boys".into()),
            ..Default::default()
        };
        assert_eq!(e.structured_field_count(), 3);
        assert!(Entities::default().is_empty());
    }

    #[test]
    fn merge_keeps_current_values() {
        let mut now = Entities { category: Some("SC".into()), ..Default::default() };
        let earlier = Entities {
            branches: vec!["ECE".into()],
            category: Some("OC".into()),
            ..Default::default()
        };
        now.merge_missing(&earlier);
        assert_eq!(now.branches, vec!["ECE".to_string()]);
        assert_eq!(now.category.as_deref(), Some("SC"));
    }
}
