//! Entity extraction: branch, category, year, quota, gender, rank and
//! disability out of free text.
//!
//! Matching runs on a normalized copy of the message (lowercase, punctuation
//! folded to spaces, space padded) so table phrases match on word
//! boundaries. Recognized spellings map to canonical codes; values given
//! after an explicit label ("branch: biotech") that no table knows are kept
//! as typed.

use admitline_core::cutoff::Quota;
use admitline_core::intent::Entities;
use regex_lite::Regex;
use std::sync::LazyLock;

/// Lowercase, fold non-alphanumerics to single spaces, pad with spaces.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

/// Whole-phrase containment on a [`normalize`]d string.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {phrase} "))
}

pub fn contains_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(normalized, p))
}

// ── Tables ────────────────────────────────────────────────────────────────

/// Longer and more specific phrases first: matched spans are masked so a
/// later, shorter phrase cannot re-match them.
const BRANCHES: &[(&str, &str)] = &[
    ("cse ai ml", "CSM"),
    ("cse aiml", "CSM"),
    ("cse ai and ml", "CSM"),
    ("artificial intelligence and machine learning", "CSM"),
    ("artificial intelligence", "CSM"),
    ("ai ml", "CSM"),
    ("aiml", "CSM"),
    ("csm", "CSM"),
    ("cse data science", "CSD"),
    ("cse ds", "CSD"),
    ("data science", "CSD"),
    ("csd", "CSD"),
    ("cse cyber security", "CSC"),
    ("cyber security", "CSC"),
    ("cybersecurity", "CSC"),
    ("csc", "CSC"),
    ("computer science and engineering", "CSE"),
    ("computer science", "CSE"),
    ("cse", "CSE"),
    ("electronics and instrumentation", "EIE"),
    ("instrumentation", "EIE"),
    ("eie", "EIE"),
    ("electrical and electronics", "EEE"),
    ("electrical", "EEE"),
    ("eee", "EEE"),
    ("electronics and communication", "ECE"),
    ("electronics", "ECE"),
    ("ece", "ECE"),
    ("information technology", "IT"),
    ("mechanical", "ME"),
    ("mech", "ME"),
    ("civil", "CIV"),
    ("civ", "CIV"),
    ("automobile", "AUT"),
    ("automotive", "AUT"),
];

const CATEGORIES: &[(&str, &str)] = &[
    ("bc a", "BC-A"),
    ("bca", "BC-A"),
    ("bc b", "BC-B"),
    ("bcb", "BC-B"),
    ("bc c", "BC-C"),
    ("bcc", "BC-C"),
    ("bc d", "BC-D"),
    ("bcd", "BC-D"),
    ("obc", "BC-D"),
    ("bc e", "BC-E"),
    ("bce", "BC-E"),
    ("ews", "EWS"),
    ("open category", "OC"),
    ("general category", "OC"),
    ("general merit", "OC"),
    ("oc", "OC"),
    ("sc", "SC"),
    ("st", "ST"),
];

const GENDERS: &[(&str, &str)] = &[
    ("boy", "Boys"),
    ("boys", "Boys"),
    ("male", "Boys"),
    ("girl", "Girls"),
    ("girls", "Girls"),
    ("female", "Girls"),
];

const QUOTAS: &[(&str, Quota)] = &[
    ("convenor", Quota::Convenor),
    ("convener", Quota::Convenor),
    ("cap", Quota::Cap),
    ("ncc", Quota::Ncc),
    ("sports quota", Quota::Sports),
    ("sports", Quota::Sports),
    ("other quota", Quota::Others),
    ("others quota", Quota::Others),
];

const DISABILITIES: &[&str] = &["pha", "phh", "pho", "phv", "phm"];

const ALL_BRANCHES: &[&str] = &["all branches", "every branch", "each branch", "all the branches"];

/// Words that follow "branch"/"category" without naming one.
const LABEL_STOPWORDS: &[&str] = &[
    "is", "the", "and", "for", "wise", "cutoff", "cutoffs", "list", "names", "details", "of",
    "in", "with", "please", "what", "which",
];

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20[1-3][0-9])\b").expect("valid year pattern"));

static K_RANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([0-9]{1,3}(?:\.[0-9])?)\s*k\b").expect("valid k-rank pattern"));

static LABELLED_RANK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\brank\s*(?:is|of|=|:|-|was|around|about)?\s*([0-9]{1,3}(?:,[0-9]{2,3})+|[0-9]+)\b|\b([0-9]{1,3}(?:,[0-9]{2,3})+|[0-9]+)\s*(?:st|nd|rd|th)?\s+rank\b",
    )
    .expect("valid labelled rank pattern")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9]{1,3}(?:,[0-9]{2,3})+|[0-9]+)\b").expect("valid number pattern")
});

static LABELLED_BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbranch\s*(?:is|:|=)\s*([A-Za-z][A-Za-z&\-]{1,20})")
        .expect("valid branch label pattern")
});

static LABELLED_CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcategory\s*(?:is|:|=)\s*([A-Za-z][A-Za-z\-]{0,10})")
        .expect("valid category label pattern")
});

/// Codes that are everyday words in lower case; only the upper-case form
/// counts.
const CASE_SENSITIVE_BRANCHES: &[(&str, &str)] = &[("IT", "IT")];

/// Ranks above this are treated as typos rather than ranks.
pub const MAX_PLAUSIBLE_RANK: u32 = 300_000;

// ── Extraction ────────────────────────────────────────────────────────────

/// Extract every entity the message mentions.
pub fn extract(text: &str) -> Entities {
    let normalized = normalize(text);
    let mut entities = Entities {
        branches: extract_branches(text, &normalized),
        all_branches: contains_any(&normalized, ALL_BRANCHES) || normalized.trim() == "all",
        category: extract_category(text, &normalized),
        year: extract_year(text),
        quota: first_match(&normalized, QUOTAS).copied(),
        gender: first_match(&normalized, GENDERS).map(|g| g.to_string()),
        rank: extract_rank(text),
        disability: DISABILITIES
            .iter()
            .find(|d| contains_phrase(&normalized, d))
            .map(|d| d.to_ascii_uppercase()),
    };
    if entities.all_branches {
        entities.branches.clear();
    }
    entities
}

/// Table entry whose phrase appears earliest in the message.
fn first_match<'a, T>(normalized: &str, table: &'a [(&str, T)]) -> Option<&'a T> {
    table
        .iter()
        .filter_map(|(phrase, value)| {
            normalized.find(&format!(" {phrase} ")).map(|pos| (pos, value))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, value)| value)
}

/// Branch codes in mention order, deduplicated.
///
/// Matches are ordered by word index so table hits (found in the normalized
/// text) and case-sensitive hits (found in the raw text) compare directly.
pub fn extract_branches(text: &str, normalized: &str) -> Vec<String> {
    let mut masked = normalized.to_string();
    let mut found: Vec<(usize, &str)> = Vec::new();

    for (phrase, code) in BRANCHES {
        let needle = format!(" {phrase} ");
        while let Some(pos) = masked.find(&needle) {
            found.push((normalized[..pos].split_whitespace().count(), *code));
            // Keep the delimiting spaces so neighbours still match.
            let blank = " ".repeat(needle.len() - 2);
            masked.replace_range(pos + 1..pos + needle.len() - 1, &blank);
        }
    }

    // Upper-case-only codes, matched against the raw text.
    for token_start in word_starts(text) {
        let token: String = text[token_start..]
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .collect();
        if let Some((_, code)) = CASE_SENSITIVE_BRANCHES.iter().find(|(t, _)| *t == token) {
            found.push((normalize(&text[..token_start]).split_whitespace().count(), *code));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    let mut codes: Vec<String> = Vec::new();
    for (_, code) in found {
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }

    if codes.is_empty()
        && let Some(raw) = labelled_value(&LABELLED_BRANCH_RE, text)
    {
        codes.push(raw);
    }
    codes
}

fn word_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    let mut prev_alnum = false;
    text.char_indices().filter_map(move |(i, c)| {
        let start = c.is_alphanumeric() && !prev_alnum;
        prev_alnum = c.is_alphanumeric();
        start.then_some(i)
    })
}

fn extract_category(text: &str, normalized: &str) -> Option<String> {
    first_match(normalized, CATEGORIES)
        .map(|c| c.to_string())
        .or_else(|| labelled_value(&LABELLED_CATEGORY_RE, text))
}

/// The value after an explicit label, as typed, unless it is filler.
fn labelled_value(re: &Regex, text: &str) -> Option<String> {
    let raw = re.captures(text)?.get(1)?.as_str();
    if LABEL_STOPWORDS.contains(&raw.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(raw.to_string())
}

pub fn extract_year(text: &str) -> Option<u16> {
    YEAR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_rank(raw: &str) -> Option<u32> {
    raw.replace(',', "").parse::<u32>().ok().filter(|r| *r > 0)
}

fn is_year(value: u32) -> bool {
    (2010..=2039).contains(&value)
}

/// Rank from "21k", "rank 5000", "5000th rank", or a bare number of at
/// least three digits that is not a year. Implausibly large values are
/// ignored.
pub fn extract_rank(text: &str) -> Option<u32> {
    find_rank(text).filter(|r| *r <= MAX_PLAUSIBLE_RANK)
}

fn find_rank(text: &str) -> Option<u32> {
    if let Some(caps) = K_RANK_RE.captures(text) {
        let thousands: f64 = caps.get(1)?.as_str().parse().ok()?;
        let rank = (thousands * 1000.0).round() as u32;
        if rank > 0 {
            return Some(rank);
        }
    }

    if let Some(caps) = LABELLED_RANK_RE.captures(text) {
        let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
        if let Some(rank) = parse_rank(raw) {
            return Some(rank);
        }
    }

    NUMBER_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| parse_rank(m.as_str()))
        .find(|n| *n >= 100 && !is_year(*n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_punctuation() {
        assert_eq!(normalize("CSE (AI & ML), BC-D!"), " cse ai ml bc d ");
        assert_eq!(normalize(""), " ");
    }

    #[test]
    fn branches_in_mention_order() {
        let e = extract("Compare ECE and CSE cutoffs");
        assert_eq!(e.branches, vec!["ECE", "CSE"]);
    }

    #[test]
    fn specialisations_do_not_double_count() {
        assert_eq!(extract("cutoff for CSE (AI & ML)").branches, vec!["CSM"]);
        assert_eq!(extract("cse data science cutoff").branches, vec!["CSD"]);
        assert_eq!(extract("electrical and electronics").branches, vec!["EEE"]);
    }

    #[test]
    fn it_requires_upper_case() {
        assert_eq!(extract("IT cutoff for OC").branches, vec!["IT"]);
        assert!(extract("is it worth it").branches.is_empty());
        assert_eq!(extract("information technology").branches, vec!["IT"]);
    }

    #[test]
    fn upper_case_codes_keep_mention_order() {
        assert_eq!(extract("Cutoffs for CSE, IT").branches, vec!["CSE", "IT"]);
        assert_eq!(extract("Hmm.......... IT or CSE?").branches, vec!["IT", "CSE"]);
        assert_eq!(extract("ECE -- -- -- IT -- CSE").branches, vec!["ECE", "IT", "CSE"]);
    }

    #[test]
    fn all_branches_flag() {
        let e = extract("show cutoffs for all branches");
        assert!(e.all_branches);
        assert!(e.branches.is_empty());
        assert!(extract("all").all_branches);
    }

    #[test]
    fn categories_map_to_codes() {
        assert_eq!(extract("OC category").category.as_deref(), Some("OC"));
        assert_eq!(extract("I am OBC").category.as_deref(), Some("BC-D"));
        assert_eq!(extract("bc-a girls").category.as_deref(), Some("BC-A"));
        assert_eq!(extract("EWS").category.as_deref(), Some("EWS"));
        assert_eq!(extract("what is the fee").category, None);
    }

    #[test]
    fn unknown_labelled_values_pass_through() {
        let e = extract("cutoff for branch: Biotech, category: XYZ");
        assert_eq!(e.branches, vec!["Biotech"]);
        assert_eq!(e.category.as_deref(), Some("XYZ"));
        assert!(extract("branch wise cutoff").branches.is_empty());
        assert!(extract("which branch has the best placements").branches.is_empty());
    }

    #[test]
    fn gender_quota_disability() {
        let e = extract("female candidate, sports quota, PHO");
        assert_eq!(e.gender.as_deref(), Some("Girls"));
        assert_eq!(e.quota, Some(Quota::Sports));
        assert_eq!(e.disability.as_deref(), Some("PHO"));
        assert_eq!(extract("boys convenor").quota, Some(Quota::Convenor));
    }

    #[test]
    fn year_is_not_a_rank() {
        let e = extract("CSE cutoff for OC in 2025");
        assert_eq!(e.year, Some(2025));
        assert_eq!(e.rank, None);
    }

    #[test]
    fn rank_forms() {
        assert_eq!(extract_rank("my rank is 21k"), Some(21_000));
        assert_eq!(extract_rank("around 7.5k"), Some(7_500));
        assert_eq!(extract_rank("rank 21,000"), Some(21_000));
        assert_eq!(extract_rank("I got 5000th rank"), Some(5_000));
        assert_eq!(extract_rank("CSE, OC, boys, 8000"), Some(8_000));
        assert_eq!(extract_rank("rank 42"), Some(42));
        assert_eq!(extract_rank("4 years of btech"), None);
        assert_eq!(extract_rank("in 2024"), None);
        assert_eq!(extract_rank("call 9876543210"), None);
    }
}
