//! Parsers for `git diff --numstat` and the seven-day activity logs.

use crate::repository::{DiffSide, FileDiffStat};
use chrono::{Days, NaiveDate};
use std::collections::HashMap;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `added\tdeleted\tpath` lines. `-\t-\tpath` marks a binary file.
pub fn parse_numstat(output: &str) -> DiffSide {
    let files = output
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let (added, deleted, path) = (parts.next()?, parts.next()?, parts.next()?);
            if added == "-" && deleted == "-" {
                return Some(FileDiffStat {
                    path: path.to_string(),
                    added: 0,
                    deleted: 0,
                    binary: true,
                });
            }
            Some(FileDiffStat {
                path: path.to_string(),
                added: added.parse().unwrap_or(0),
                deleted: deleted.parse().unwrap_or(0),
                binary: false,
            })
        })
        .collect();
    DiffSide::from_files(files)
}

/// Bucket one `YYYY-MM-DD` per line into the seven calendar days ending at
/// `today`. Index 0 is six days before `today`, index 6 is `today`.
pub fn parse_daily_commits(output: &str, today: NaiveDate) -> [usize; 7] {
    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Ok(day) = NaiveDate::parse_from_str(line, DATE_FORMAT) {
            *per_day.entry(day).or_default() += 1;
        }
    }

    let mut counts = [0; 7];
    for (offset, slot) in counts.iter_mut().enumerate() {
        if let Some(day) = today.checked_sub_days(Days::new((6 - offset) as u64)) {
            *slot = per_day.get(&day).copied().unwrap_or(0);
        }
    }
    counts
}

/// Count how many commits touched each path in `log --name-only --format=`
/// output (blank-line separated blocks, one per commit).
pub fn parse_file_churn(output: &str) -> HashMap<String, usize> {
    let mut churn = HashMap::new();
    for path in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        *churn.entry(path.to_string()).or_insert(0) += 1;
    }
    churn
}

/// Number of lines in trimmed output; empty output has none.
pub(crate) fn count_lines(output: &str) -> usize {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        0
    } else {
        trimmed.matches('\n').count() + 1
    }
}
