//! Historical admission-cutoff records and query shapes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Admission channel with its own independent rank list.
///
/// Declaration order is the tie-break priority: `Convenor` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quota {
    #[serde(alias = "CONVENOR", alias = "convenor")]
    Convenor,
    #[serde(rename = "CAP", alias = "cap")]
    Cap,
    #[serde(rename = "NCC", alias = "ncc")]
    Ncc,
    #[serde(rename = "SPORTS", alias = "sports")]
    Sports,
    #[serde(rename = "OTHERS", alias = "others")]
    Others,
}

impl Quota {
    pub const ALL: [Quota; 5] = [Quota::Convenor, Quota::Cap, Quota::Ncc, Quota::Sports, Quota::Others];

    /// Lower sorts first.
    pub fn priority(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quota::Convenor => "Convenor",
            Quota::Cap => "CAP",
            Quota::Ncc => "NCC",
            Quota::Sports => "SPORTS",
            Quota::Others => "OTHERS",
        }
    }
}

impl std::fmt::Display for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quota {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "convenor" | "convener" => Ok(Quota::Convenor),
            "cap" => Ok(Quota::Cap),
            "ncc" => Ok(Quota::Ncc),
            "sports" | "sport" => Ok(Quota::Sports),
            "others" | "other" => Ok(Quota::Others),
            other => Err(format!("unknown quota: {other}")),
        }
    }
}

/// One row of historical cutoff data.
///
/// Uniquely keyed by (year, branch, category, gender, quota, disability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffRecord {
    pub year: u16,
    pub branch: String,
    pub category: String,
    pub gender: String,
    pub quota: Quota,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disability: Option<String>,
    #[serde(alias = "first_rank")]
    pub opening_rank: u32,
    #[serde(alias = "last_rank")]
    pub closing_rank: u32,
}

/// The uniqueness key of a [`CutoffRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CutoffKey {
    pub year: u16,
    pub branch: String,
    pub category: String,
    pub gender: String,
    pub quota: Quota,
    pub disability: Option<String>,
}

impl CutoffRecord {
    pub fn key(&self) -> CutoffKey {
        CutoffKey {
            year: self.year,
            branch: self.branch.clone(),
            category: self.category.clone(),
            gender: self.gender.clone(),
            quota: self.quota,
            disability: self.disability.clone(),
        }
    }

    /// Downstream document id: `{year}_{branch}_{category}_{gender}_{quota}_{disability}`.
    pub fn doc_id(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.year,
            self.branch,
            self.category,
            self.gender,
            self.quota,
            self.disability.as_deref().unwrap_or("none")
        )
    }

    /// Ranks are positive, opening ≤ closing, and the text key fields are set.
    pub fn is_well_formed(&self) -> bool {
        self.opening_rank > 0
            && self.closing_rank > 0
            && self.opening_rank <= self.closing_rank
            && !self.branch.trim().is_empty()
            && !self.category.trim().is_empty()
            && !self.gender.trim().is_empty()
    }

    /// A candidate with `rank` would have been admitted under this record.
    pub fn admits(&self, rank: u32) -> bool {
        rank <= self.closing_rank
    }
}

/// A lookup where every `None` field is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffQuery {
    pub year: Option<u16>,
    pub branch: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub quota: Option<Quota>,
    pub disability: Option<String>,
}

impl CutoffQuery {
    pub fn matches(&self, record: &CutoffRecord) -> bool {
        self.year.is_none_or(|y| y == record.year)
            && self.branch.as_ref().is_none_or(|b| *b == record.branch)
            && self.category.as_ref().is_none_or(|c| *c == record.category)
            && self.gender.as_ref().is_none_or(|g| *g == record.gender)
            && self.quota.is_none_or(|q| q == record.quota)
            && self
                .disability
                .as_ref()
                .is_none_or(|d| record.disability.as_ref() == Some(d))
    }
}

/// Query fields the engine may widen when no exact match exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelaxableField {
    Gender,
    Quota,
}

impl RelaxableField {
    /// Clear this field on the query. Returns whether anything was widened.
    pub fn clear(&self, query: &mut CutoffQuery) -> bool {
        match self {
            RelaxableField::Gender => query.gender.take().is_some(),
            RelaxableField::Quota => query.quota.take().is_some(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelaxableField::Gender => "gender",
            RelaxableField::Quota => "quota",
        }
    }
}

impl FromStr for RelaxableField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gender" => Ok(RelaxableField::Gender),
            "quota" => Ok(RelaxableField::Quota),
            other => Err(format!("field cannot be relaxed: {other}")),
        }
    }
}
