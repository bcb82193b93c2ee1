//! Intent classification.
//!
//! A message is scanned once into [`Signals`]; an ordered rule table then
//! picks the intent. The first rule whose predicate holds wins, so the
//! table order is the precedence:
//!
//! 1. another institution named without ours → `out_of_scope`
//! 2. explicit request for a human → `contact_request`
//! 3. cutoff or eligibility question with no informational signal → `cutoff`
//! 4. cutoff and informational signals together → `mixed`
//! 5. short greeting → `greeting`
//! 6. anything else → `informational`

pub mod entities;

use admitline_config::InstitutionConfig;
use admitline_core::intent::{Entities, Intent};
use serde::Serialize;

use entities::{contains_any, normalize};

/// Other institutions, matched as whole words.
const OTHER_INSTITUTIONS: &[&str] = &[
    "iit", "iits", "nit", "nits", "iiit", "bits", "bits pilani", "vit", "srm", "manipal", "amrita",
    "jntu", "jntuh", "osmania", "ou", "cbit", "chaitanya bharathi", "vasavi", "muffakham jah",
    "mgit", "cvr", "mlr", "anurag", "cmr", "cmrit", "gokaraju", "griet", "bvrit", "keshav",
    "matrusri", "stanley", "anna university", "mit", "harvard", "stanford",
];

const CONTACT_TRIGGERS: &[&str] = &[
    "talk to admission",
    "talk to admissions",
    "speak with admission",
    "speak with admissions",
    "speak to someone",
    "speak with someone",
    "talk to someone",
    "talk to a person",
    "talk to a human",
    "speak to a human",
    "human agent",
    "real person",
    "contact admission",
    "contact admissions",
    "call me",
    "callback",
    "call back",
    "reach out to me",
    "not satisfied",
    "dissatisfied",
    "not happy",
    "unhappy",
    "want to speak",
    "want to talk",
    "admission department",
    "admission team",
    "admissions team",
    "admission office",
    "admissions office",
    "report fraud",
    "report an agent",
];

const CUTOFF_KEYWORDS: &[&str] = &[
    "cutoff",
    "cutoffs",
    "cut off",
    "cut offs",
    "last rank",
    "closing rank",
    "opening rank",
    "eapcet",
    "tseamcet",
    "ts eamcet",
    "eamcet",
    "tgeapcet",
    "seat allotment",
    "counselling",
    "counseling",
    "trend",
    "trends",
    "previous year",
    "previous years",
    "past year",
    "past years",
    "last year",
    "year wise",
];

const ELIGIBILITY_PHRASES: &[&str] = &[
    "eligible",
    "eligibility",
    "can i get",
    "will i get",
    "could i get",
    "chance",
    "chances",
    "my rank",
    "do i qualify",
    "am i eligible",
    "rank check",
    "get a seat",
    "get seat",
];

const INFORMATIONAL: &[&str] = &[
    "fee",
    "fees",
    "tuition",
    "hostel",
    "hostels",
    "placement",
    "placements",
    "package",
    "scholarship",
    "scholarships",
    "document",
    "documents",
    "certificates",
    "admission process",
    "how to apply",
    "application",
    "campus",
    "transport",
    "bus",
    "library",
    "facilities",
    "infrastructure",
    "faculty",
    "syllabus",
    "curriculum",
    "accreditation",
    "naac",
    "nba",
    "intake",
    "canteen",
    "deadline",
    "address",
    "location",
];

const GREETINGS: &[&str] = &[
    "hi",
    "hii",
    "hello",
    "hey",
    "namaste",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "bye",
    "goodbye",
];

const QUESTION_WORDS: &[&str] = &[
    "what", "which", "when", "where", "how", "who", "why", "is", "are", "was", "were", "can",
    "could", "will", "would", "do", "does", "did", "should", "shall", "may", "tell", "show",
    "give", "list", "check",
];

const MAX_GREETING_WORDS: usize = 3;

// ── Signals ───────────────────────────────────────────────────────────────

/// Everything the rules look at, computed once per message.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub word_count: usize,
    pub mentions_institution: bool,
    pub other_institution: Option<&'static str>,
    pub contact_trigger: bool,
    pub cutoff_keyword: bool,
    pub eligibility_phrase: bool,
    pub informational: bool,
    pub greeting: bool,
    pub question_form: bool,
    pub entities: Entities,
    pub previous: Option<Intent>,
}

impl Signals {
    /// A category, quota, rank or disability was named. A branch alone is
    /// not enough: "tell me about CSE" is informational.
    fn cutoff_entity(&self) -> bool {
        let e = &self.entities;
        e.category.is_some() || e.quota.is_some() || e.rank.is_some() || e.disability.is_some()
    }

    fn asks_about_cutoffs(&self) -> bool {
        self.cutoff_keyword || self.eligibility_phrase
    }

    /// Terse field lists ("CSE, OC, boys, 8000") or a refinement of the
    /// previous cutoff answer ("what about ECE?").
    fn follow_up(&self) -> bool {
        self.entities.structured_field_count() >= 3
            || (self.previous == Some(Intent::Cutoff) && !self.entities.is_empty())
    }
}

// ── Rules ─────────────────────────────────────────────────────────────────

/// One row of the classification table.
pub struct Rule {
    pub name: &'static str,
    pub intent: Intent,
    pub applies: fn(&Signals) -> bool,
}

pub const RULES: &[Rule] = &[
    Rule {
        name: "other_institution",
        intent: Intent::OutOfScope,
        applies: |s| s.other_institution.is_some() && !s.mentions_institution,
    },
    Rule {
        name: "contact_trigger",
        intent: Intent::ContactRequest,
        applies: |s| s.contact_trigger,
    },
    Rule {
        name: "cutoff_question",
        intent: Intent::Cutoff,
        applies: |s| {
            !s.informational
                && (s.asks_about_cutoffs() || (s.cutoff_entity() && s.question_form))
        },
    },
    Rule {
        name: "cutoff_follow_up",
        intent: Intent::Cutoff,
        applies: |s| !s.informational && s.follow_up(),
    },
    Rule {
        name: "cutoff_with_information",
        intent: Intent::Mixed,
        applies: |s| s.informational && (s.asks_about_cutoffs() || s.cutoff_entity()),
    },
    Rule {
        name: "greeting",
        intent: Intent::Greeting,
        applies: |s| s.greeting && s.word_count <= MAX_GREETING_WORDS,
    },
];

/// Result of classifying one message.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// Name of the rule that fired, or `"default"`.
    pub rule: &'static str,
    pub entities: Entities,
}

/// Rule-based classifier scoped to one institution.
pub struct IntentClassifier {
    /// Normalized names that count as a reference to our institution.
    institution_terms: Vec<String>,
}

impl IntentClassifier {
    pub fn new(institution: &InstitutionConfig) -> Self {
        let mut institution_terms: Vec<String> = std::iter::once(&institution.name)
            .chain(std::iter::once(&institution.short_name))
            .chain(institution.aliases.iter())
            .map(|t| normalize(t).trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        institution_terms.sort();
        institution_terms.dedup();
        Self { institution_terms }
    }

    /// Scan a message into signals. `previous` is the intent of the
    /// session's last classified message.
    pub fn signals(&self, text: &str, previous: Option<Intent>) -> Signals {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mentions_institution = self
            .institution_terms
            .iter()
            .any(|t| entities::contains_phrase(&normalized, t));
        let other_institution = OTHER_INSTITUTIONS
            .iter()
            .copied()
            .filter(|name| !self.institution_terms.iter().any(|t| t.as_str() == *name))
            .find(|name| entities::contains_phrase(&normalized, name));
        let eligibility_phrase = contains_any(&normalized, ELIGIBILITY_PHRASES);

        Signals {
            word_count: words.len(),
            mentions_institution,
            other_institution,
            contact_trigger: contains_any(&normalized, CONTACT_TRIGGERS),
            cutoff_keyword: contains_any(&normalized, CUTOFF_KEYWORDS),
            eligibility_phrase,
            informational: contains_any(&normalized, INFORMATIONAL),
            greeting: contains_any(&normalized, GREETINGS),
            question_form: text.contains('?')
                || words.first().is_some_and(|w| QUESTION_WORDS.contains(w))
                || eligibility_phrase,
            entities: entities::extract(text),
            previous,
        }
    }

    /// Classify a message. Deterministic for a given text and previous
    /// intent.
    pub fn classify(&self, text: &str, previous: Option<Intent>) -> Classification {
        let signals = self.signals(text, previous);
        let (intent, rule) = RULES
            .iter()
            .find(|rule| (rule.applies)(&signals))
            .map(|rule| (rule.intent, rule.name))
            .unwrap_or((Intent::Informational, "default"));
        tracing::debug!(intent = %intent, rule, "message classified");
        Classification { intent, rule, entities: signals.entities }
    }
}
