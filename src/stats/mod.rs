use std::collections::HashMap;

use serde::Serialize;

/// Per-author accumulator: created lazily on first sighting and only ever
/// added to, scoped either to one repository or to the whole organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub additions: i64,
    pub deletions: i64,
    pub pull_requests: u64,
}

impl Aggregate {
    pub fn record(&mut self, additions: i64, deletions: i64) {
        self.additions += additions;
        self.deletions += deletions;
        self.pull_requests += 1;
    }

    pub fn merge(&mut self, other: &Aggregate) {
        self.additions += other.additions;
        self.deletions += other.deletions;
        self.pull_requests += other.pull_requests;
    }

    /// Ranking metric: additions plus absolute deletions, never negative.
    pub fn score(&self) -> i64 {
        self.additions + self.deletions.abs()
    }
}

/// One output record per (repository, author) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub org: String,
    pub repo: String,
    pub user: String,
    pub additions: i64,
    pub deletions: i64,
    pub prs: u64,
    pub score: i64,
}

pub fn build_rows(org: &str, repo: &str, totals: &HashMap<String, Aggregate>) -> Vec<Row> {
    totals
        .iter()
        .map(|(user, agg)| Row {
            org: org.to_string(),
            repo: repo.to_string(),
            user: user.clone(),
            additions: agg.additions,
            deletions: agg.deletions,
            prs: agg.pull_requests,
            score: agg.score(),
        })
        .collect()
}

/// Deterministic ordering: score descending, then user, org, and repository
/// ascending.
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.user.cmp(&b.user))
            .then_with(|| a.org.cmp(&b.org))
            .then_with(|| a.repo.cmp(&b.repo))
    });
}

/// Organization-wide totals per author, re-summed across repositories.
#[derive(Debug, Default)]
pub struct OrgTotals {
    totals: HashMap<String, Aggregate>,
}

impl OrgTotals {
    pub fn absorb(&mut self, per_repo: &HashMap<String, Aggregate>) {
        for (user, agg) in per_repo {
            self.totals.entry(user.clone()).or_default().merge(agg);
        }
    }

    /// Summary rows, score descending with user as the tie-break.
    pub fn ranked(&self) -> Vec<SummaryRow> {
        let mut rows: Vec<SummaryRow> = self
            .totals
            .iter()
            .map(|(user, agg)| SummaryRow {
                user: user.clone(),
                additions: agg.additions,
                deletions: agg.deletions,
                prs: agg.pull_requests,
                score: agg.score(),
            })
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user.cmp(&b.user)));
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub user: String,
    pub additions: i64,
    pub deletions: i64,
    pub prs: u64,
    pub score: i64,
}
