//! Historical cutoff lookups.
//!
//! The engine owns an in-memory, deduplicated copy of the cutoff snapshot.
//! Lookups try the exact query first, then widen the configured fields one
//! at a time (cumulatively) until something matches. Results are always
//! ordered the same way: newest year, then quota priority, then rows
//! without a disability marker, then gender, category and branch.

use admitline_core::cutoff::{CutoffKey, CutoffQuery, CutoffRecord, RelaxableField};
use admitline_core::intent::Entities;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Distinct records now held.
    pub loaded: usize,
    /// Records that replaced an earlier row with the same key.
    pub overwritten: usize,
    /// Rows skipped as malformed.
    pub rejected: usize,
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CutoffOutcome {
    Exact(Vec<CutoffRecord>),
    /// Matched only after widening `relaxed`, in the order they were widened.
    Relaxed {
        records: Vec<CutoffRecord>,
        relaxed: Vec<RelaxableField>,
    },
    NotFound,
}

impl CutoffOutcome {
    pub fn records(&self) -> &[CutoffRecord] {
        match self {
            CutoffOutcome::Exact(records) | CutoffOutcome::Relaxed { records, .. } => records,
            CutoffOutcome::NotFound => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, CutoffOutcome::NotFound)
    }
}

/// In-memory cutoff table with exact and relaxed lookup.
#[derive(Debug, Clone, Default)]
pub struct CutoffEngine {
    records: Vec<CutoffRecord>,
    index: HashMap<CutoffKey, usize>,
    relaxation_order: Vec<RelaxableField>,
}

impl CutoffEngine {
    pub fn new(relaxation_order: Vec<RelaxableField>) -> Self {
        Self { relaxation_order, ..Default::default() }
    }

    /// Build an engine from records in one step.
    pub fn from_records(
        records: impl IntoIterator<Item = CutoffRecord>,
        relaxation_order: Vec<RelaxableField>,
    ) -> (Self, IngestReport) {
        let mut engine = Self::new(relaxation_order);
        let report = engine.ingest(records);
        (engine, report)
    }

    /// Add records. A later row with an existing key replaces the earlier
    /// one; malformed rows are skipped and counted.
    pub fn ingest(&mut self, records: impl IntoIterator<Item = CutoffRecord>) -> IngestReport {
        let mut report = IngestReport::default();
        for record in records {
            if !record.is_well_formed() {
                tracing::debug!(doc_id = %record.doc_id(), "skipping malformed cutoff row");
                report.rejected += 1;
                continue;
            }
            match self.index.get(&record.key()) {
                Some(&slot) => {
                    self.records[slot] = record;
                    report.overwritten += 1;
                }
                None => {
                    self.index.insert(record.key(), self.records.len());
                    self.records.push(record);
                }
            }
        }
        report.loaded = self.records.len();
        report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn relaxation_order(&self) -> &[RelaxableField] {
        &self.relaxation_order
    }

    /// Every record matching the query, in canonical order.
    pub fn find(&self, query: &CutoffQuery) -> Vec<CutoffRecord> {
        let mut matches: Vec<CutoffRecord> =
            self.records.iter().filter(|r| query.matches(r)).cloned().collect();
        matches.sort_by(canonical_order);
        matches
    }

    /// Exact lookup, then cumulative relaxation in the configured order.
    pub fn lookup(&self, query: &CutoffQuery) -> CutoffOutcome {
        let exact = self.find(query);
        if !exact.is_empty() {
            return CutoffOutcome::Exact(exact);
        }

        let mut widened = query.clone();
        let mut relaxed = Vec::new();
        for field in &self.relaxation_order {
            if !field.clear(&mut widened) {
                continue;
            }
            relaxed.push(*field);
            let records = self.find(&widened);
            if !records.is_empty() {
                return CutoffOutcome::Relaxed { records, relaxed };
            }
        }
        CutoffOutcome::NotFound
    }

    /// Distinct branch codes present in the data, sorted.
    pub fn branches(&self) -> Vec<String> {
        let mut branches: Vec<String> = self.records.iter().map(|r| r.branch.clone()).collect();
        branches.sort();
        branches.dedup();
        branches
    }

    /// Distinct years present in the data, newest first.
    pub fn years(&self) -> Vec<u16> {
        let mut years: Vec<u16> = self.records.iter().map(|r| r.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }
}

/// Newest year first, then quota priority, rows without a disability
/// marker first, then gender, category and branch.
fn canonical_order(a: &CutoffRecord, b: &CutoffRecord) -> Ordering {
    b.year
        .cmp(&a.year)
        .then(a.quota.priority().cmp(&b.quota.priority()))
        .then(a.disability.is_some().cmp(&b.disability.is_some()))
        .then_with(|| a.disability.cmp(&b.disability))
        .then_with(|| a.gender.cmp(&b.gender))
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.branch.cmp(&b.branch))
}

/// Query for one branch built from message entities.
pub fn query_for(entities: &Entities, branch: Option<&str>) -> CutoffQuery {
    CutoffQuery {
        year: entities.year,
        branch: branch.map(str::to_string),
        category: entities.category.clone(),
        gender: entities.gender.clone(),
        quota: entities.quota,
        disability: entities.disability.clone(),
    }
}

// ── Presentation ──────────────────────────────────────────────────────────

/// Thousands separators: 21000 → "21,000".
pub fn format_rank(rank: u32) -> String {
    let digits = rank.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// One-line description of a record.
pub fn describe(record: &CutoffRecord) -> String {
    let disability = record
        .disability
        .as_deref()
        .map(|d| format!(", {d}"))
        .unwrap_or_default();
    format!(
        "{} {} ({}, {} quota{}), {}: opening rank {}, closing rank {}",
        record.branch,
        record.category,
        record.gender,
        record.quota,
        disability,
        record.year,
        format_rank(record.opening_rank),
        format_rank(record.closing_rank),
    )
}

/// The records worth showing: every row sharing the first row's year,
/// quota and disability (typically both genders).
pub fn headline(records: &[CutoffRecord]) -> Vec<&CutoffRecord> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.year == first.year && r.quota == first.quota && r.disability == first.disability)
        .collect()
}

/// Admission verdict for a rank against the best matching record.
pub fn eligibility_verdict(rank: u32, record: &CutoffRecord) -> String {
    if record.admits(rank) {
        format!(
            "With rank {} you would have been within the {} closing rank of {} for {} {} ({}).",
            format_rank(rank),
            record.year,
            format_rank(record.closing_rank),
            record.branch,
            record.category,
            record.gender,
        )
    } else {
        format!(
            "With rank {} you would have been outside the {} closing rank of {} for {} {} ({}).",
            format_rank(rank),
            record.year,
            format_rank(record.closing_rank),
            record.branch,
            record.category,
            record.gender,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admitline_core::cutoff::Quota;

    fn rec(year: u16, branch: &str, category: &str, gender: &str, quota: Quota, close: u32) -> CutoffRecord {
        CutoffRecord {
            year,
            branch: branch.into(),
            category: category.into(),
            gender: gender.into(),
            quota,
            disability: None,
            opening_rank: 1,
            closing_rank: close,
        }
    }

    fn engine(records: Vec<CutoffRecord>) -> CutoffEngine {
        CutoffEngine::from_records(records, vec![RelaxableField::Gender, RelaxableField::Quota]).0
    }

    fn sample() -> CutoffEngine {
        engine(vec![
            rec(2024, "CSE", "OC", "Boys", Quota::Convenor, 2100),
            rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 1850),
            rec(2025, "CSE", "OC", "Girls", Quota::Convenor, 2400),
            rec(2025, "CSE", "OC", "Boys", Quota::Sports, 9000),
            rec(2025, "ECE", "BC-D", "Girls", Quota::Ncc, 15000),
        ])
    }

    #[test]
    fn ingest_dedupes_last_write_wins() {
        let mut e = CutoffEngine::new(vec![]);
        let report = e.ingest(vec![
            rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 1000),
            rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 1850),
        ]);
        assert_eq!(report, IngestReport { loaded: 1, overwritten: 1, rejected: 0 });
        assert_eq!(e.find(&CutoffQuery::default())[0].closing_rank, 1850);
    }

    #[test]
    fn ingest_rejects_malformed_rows() {
        let mut bad = rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 100);
        bad.opening_rank = 500;
        let mut blank = rec(2025, " ", "OC", "Boys", Quota::Convenor, 100);
        blank.opening_rank = 1;
        let (e, report) = CutoffEngine::from_records(
            vec![bad, blank, rec(2025, "ECE", "OC", "Boys", Quota::Convenor, 5000)],
            vec![],
        );
        assert_eq!(report.rejected, 2);
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn exact_fully_keyed_lookup_returns_single_record() {
        let e = sample();
        let query = CutoffQuery {
            year: Some(2025),
            branch: Some("CSE".into()),
            category: Some("OC".into()),
            gender: Some("Boys".into()),
            quota: Some(Quota::Convenor),
            disability: None,
        };
        let outcome = e.lookup(&query);
        assert_eq!(outcome, CutoffOutcome::Exact(vec![rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 1850)]));
    }

    #[test]
    fn results_are_canonically_ordered() {
        let e = sample();
        let records = e.find(&CutoffQuery { branch: Some("CSE".into()), ..Default::default() });
        let order: Vec<_> = records
            .iter()
            .map(|r| (r.year, r.quota, r.gender.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (2025, Quota::Convenor, "Boys"),
                (2025, Quota::Convenor, "Girls"),
                (2025, Quota::Sports, "Boys"),
                (2024, Quota::Convenor, "Boys"),
            ]
        );
    }

    #[test]
    fn rows_without_disability_sort_first() {
        let mut ph = rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 40000);
        ph.disability = Some("PHO".into());
        let e = engine(vec![ph, rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 1850)]);
        let found = e.find(&CutoffQuery::default());
        assert_eq!(found[0].disability, None);
        assert_eq!(found[1].disability.as_deref(), Some("PHO"));
    }

    #[test]
    fn gender_relaxed_first() {
        let e = sample();
        let query = CutoffQuery {
            branch: Some("ECE".into()),
            category: Some("BC-D".into()),
            gender: Some("Boys".into()),
            ..Default::default()
        };
        match e.lookup(&query) {
            CutoffOutcome::Relaxed { records, relaxed } => {
                assert_eq!(relaxed, vec![RelaxableField::Gender]);
                assert_eq!(records[0].gender, "Girls");
            }
            other => panic!("expected relaxed match, got {other:?}"),
        }
    }

    #[test]
    fn relaxation_is_cumulative_and_skips_unset_fields() {
        let e = sample();
        let query = CutoffQuery {
            branch: Some("ECE".into()),
            gender: Some("Boys".into()),
            quota: Some(Quota::Convenor),
            ..Default::default()
        };
        match e.lookup(&query) {
            CutoffOutcome::Relaxed { relaxed, records } => {
                assert_eq!(relaxed, vec![RelaxableField::Gender, RelaxableField::Quota]);
                assert_eq!(records[0].quota, Quota::Ncc);
            }
            other => panic!("expected relaxed match, got {other:?}"),
        }

        let only_quota = CutoffQuery {
            branch: Some("ECE".into()),
            quota: Some(Quota::Convenor),
            ..Default::default()
        };
        match e.lookup(&only_quota) {
            CutoffOutcome::Relaxed { relaxed, .. } => assert_eq!(relaxed, vec![RelaxableField::Quota]),
            other => panic!("expected relaxed match, got {other:?}"),
        }
    }

    #[test]
    fn configured_order_is_respected() {
        let e = CutoffEngine::from_records(
            sample().find(&CutoffQuery::default()),
            vec![RelaxableField::Quota, RelaxableField::Gender],
        )
        .0;
        let query = CutoffQuery {
            branch: Some("ECE".into()),
            gender: Some("Girls".into()),
            quota: Some(Quota::Convenor),
            ..Default::default()
        };
        match e.lookup(&query) {
            CutoffOutcome::Relaxed { relaxed, .. } => assert_eq!(relaxed, vec![RelaxableField::Quota]),
            other => panic!("expected relaxed match, got {other:?}"),
        }
    }

    #[test]
    fn unknown_branch_is_not_found() {
        let e = sample();
        let query = CutoffQuery {
            branch: Some("XYZ".into()),
            gender: Some("Boys".into()),
            ..Default::default()
        };
        assert_eq!(e.lookup(&query), CutoffOutcome::NotFound);
        assert!(CutoffEngine::new(vec![]).lookup(&CutoffQuery::default()) == CutoffOutcome::NotFound);
    }

    #[test]
    fn branches_and_years() {
        let e = sample();
        assert_eq!(e.branches(), vec!["CSE", "ECE"]);
        assert_eq!(e.years(), vec![2025, 2024]);
    }

    #[test]
    fn query_from_entities() {
        let entities = Entities {
            branches: vec!["CSE".into(), "ECE".into()],
            category: Some("OC".into()),
            year: Some(2025),
            ..Default::default()
        };
        let q = query_for(&entities, Some("ECE"));
        assert_eq!(q.branch.as_deref(), Some("ECE"));
        assert_eq!(q.category.as_deref(), Some("OC"));
        assert_eq!(q.year, Some(2025));
        assert_eq!(q.gender, None);
    }

    #[test]
    fn rank_formatting() {
        assert_eq!(format_rank(7), "7");
        assert_eq!(format_rank(1850), "1,850");
        assert_eq!(format_rank(21000), "21,000");
        assert_eq!(format_rank(1234567), "1,234,567");
    }

    #[test]
    fn headline_keeps_both_genders() {
        let e = sample();
        let records = e.find(&CutoffQuery { branch: Some("CSE".into()), ..Default::default() });
        let top = headline(&records);
        assert_eq!(top.len(), 2);
        assert!(describe(top[0]).contains("closing rank 1,850"));
    }

    #[test]
    fn verdict_uses_closing_rank() {
        let r = rec(2025, "CSE", "OC", "Boys", Quota::Convenor, 1850);
        assert!(eligibility_verdict(1850, &r).contains("within"));
        assert!(eligibility_verdict(1851, &r).contains("outside"));
    }
}
