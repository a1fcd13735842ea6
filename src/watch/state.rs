//! Application state for watch mode

use chrono::{DateTime, Local};
use gitvision::{DiffStats, RepoStatus, Repository};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Maximum number of events to keep in memory
const MAX_EVENTS: usize = 1000;

/// Watch mode application state
pub struct WatchState {
    pub repos: IndexMap<PathBuf, Repository>,
    pub events: VecDeque<String>,
}

impl WatchState {
    /// Create WatchState with the discovered repositories
    pub fn with_repositories(repos: Vec<Repository>) -> Self {
        let mut state = Self {
            repos: repos
                .into_iter()
                .map(|repo| (repo.path.clone(), repo))
                .collect(),
            events: VecDeque::with_capacity(MAX_EVENTS),
        };
        state.add_event(format!("Watching {} repositories", state.repos.len()));
        state
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.repos.keys().cloned().collect()
    }

    /// Record an event line with a wall-clock timestamp, returning it
    pub fn add_event(&mut self, event: String) -> &str {
        self.add_event_at(Local::now(), event)
    }

    pub fn add_event_at(&mut self, at: DateTime<Local>, event: String) -> &str {
        let timestamp = at.format("%H:%M:%S");
        self.events.push_back(format!("[{}] {}", timestamp, event));
        while self.events.len() > MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.back().map(String::as_str).unwrap_or_default()
    }

    /// Replace a repository's status. Unknown paths are ignored.
    pub fn update_status(&mut self, path: &Path, status: RepoStatus) -> Option<&Repository> {
        let repo = self.repos.get_mut(path)?;
        repo.apply_status(status);
        Some(repo)
    }

    pub fn update_diff(&mut self, path: &Path, diff: DiffStats) {
        if let Some(repo) = self.repos.get_mut(path) {
            repo.apply_diff(diff);
        }
    }

    /// One-line description of what a repository looks like now
    pub fn describe(&self, path: &Path) -> Option<String> {
        let repo = self.repos.get(path)?;
        let status = repo.status.as_ref()?;

        let mut line = format!("{} [{}]", repo.display_name(), status.head_label());
        if status.is_dirty() {
            line.push_str(&format!(
                " +{} ~{} ?{}",
                status.staged, status.modified, status.untracked
            ));
        } else {
            line.push_str(" clean");
        }
        if status.ahead > 0 || status.behind > 0 {
            line.push_str(&format!(" ↑{} ↓{}", status.ahead, status.behind));
        }
        for state in status.special_states() {
            line.push_str(&format!(" ({state})"));
        }
        if let Some(diff) = &repo.diff
            && diff.total_diff_volume() > 0
        {
            line.push_str(&format!(" +{}/-{}", diff.total_added(), diff.total_deleted()));
        }
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_log_is_bounded() {
        let mut state = WatchState::with_repositories(Vec::new());
        for i in 0..(MAX_EVENTS + 10) {
            state.add_event(format!("event {i}"));
        }
        assert_eq!(state.events.len(), MAX_EVENTS);
        assert!(state.events.back().unwrap().ends_with(&format!("event {}", MAX_EVENTS + 9)));
    }

    #[test]
    fn test_event_timestamp_format() {
        let mut state = WatchState::with_repositories(Vec::new());
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 3, 7).unwrap();
        assert_eq!(state.add_event_at(at, "changed".to_string()), "[09:03:07] changed");
    }

    #[test]
    fn test_update_and_describe() {
        let path = PathBuf::from("/code/project");
        let mut state = WatchState::with_repositories(vec![Repository::new(&path)]);
        assert_eq!(state.describe(&path), None);

        let status = RepoStatus {
            branch: Some("main".to_string()),
            modified: 2,
            behind: 1,
            rebase_head: true,
            ..Default::default()
        };
        assert!(state.update_status(&path, status).is_some());
        assert_eq!(
            state.describe(&path).unwrap(),
            "project [main] +0 ~2 ?0 ↑0 ↓1 (rebasing)"
        );

        assert!(state
            .update_status(Path::new("/elsewhere"), RepoStatus::default())
            .is_none());
    }
}
