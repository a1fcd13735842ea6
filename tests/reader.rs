mod common;

use common::{TestRepo, git_available, git_in};
use gitvision::git::{STATUS_ARGS, git_output};
use gitvision::{CancelToken, GitError, GitReader};
use indexmap::IndexMap;
use std::fs;

macro_rules! require_git {
    () => {
        if !git_available() {
            eprintln!("skipping: git not installed");
            return;
        }
    };
}

#[test]
fn test_status_counts_working_tree_changes() {
    require_git!();
    let repo = TestRepo::new();
    repo.write_file("README.md", "# changed\n");
    repo.write_file("staged.txt", "new\n");
    repo.git(&["add", "staged.txt"]);
    repo.write_file("scratch.txt", "untracked\n");

    let status = GitReader::new()
        .get_status(repo.root_path(), &CancelToken::background())
        .unwrap();

    assert_eq!(status.branch.as_deref(), Some("main"));
    assert!(!status.detached_head);
    assert_eq!(status.commit_hash.as_ref().map(String::len), Some(7));
    assert_eq!(status.staged, 1);
    assert_eq!(status.modified, 1);
    assert_eq!(status.untracked, 1);
    assert_eq!(status.stashes, 0);
    assert_eq!(status.remote, None);
    assert_eq!(status.owner, None);
    assert!(status.last_commit.is_some());
    assert!(status.last_modified.is_some());
    assert!(!status.has_special_state());
}

#[test]
fn test_status_from_captured_output_matches_direct_read() {
    require_git!();
    let repo = TestRepo::new();
    repo.write_file("notes.txt", "draft\n");
    let reader = GitReader::new();
    let token = CancelToken::background();

    let output = git_output(repo.root_path(), &STATUS_ARGS, &token).unwrap();
    let from_output = reader.get_status_from_output(repo.root_path(), &output, &token);
    let direct = reader.get_status(repo.root_path(), &token).unwrap();
    assert_eq!(from_output, direct);
}

#[test]
fn test_stash_and_detached_head() {
    require_git!();
    let repo = TestRepo::new();
    repo.write_file("README.md", "# work in progress\n");
    repo.git(&["stash", "-q"]);
    repo.git(&["checkout", "-q", "--detach"]);

    let status = GitReader::new()
        .get_status(repo.root_path(), &CancelToken::background())
        .unwrap();
    assert_eq!(status.stashes, 1);
    assert!(status.detached_head);
    assert_eq!(status.branch, None);
    assert!(!status.is_dirty());
    let hash = status.commit_hash.clone().unwrap();
    assert_eq!(status.head_label(), format!("(detached {hash})"));
}

#[test]
fn test_merge_in_progress_detected() {
    require_git!();
    let repo = TestRepo::new();
    let head = repo.git(&["rev-parse", "HEAD"]);
    fs::write(repo.root_path().join(".git/MERGE_HEAD"), head).unwrap();

    let status = GitReader::new()
        .get_status(repo.root_path(), &CancelToken::background())
        .unwrap();
    assert!(status.merge_head);
    assert_eq!(status.special_states(), vec!["merging"]);
}

#[test]
fn test_owner_from_origin_url() {
    require_git!();
    let repo = TestRepo::new();
    repo.git(&["remote", "add", "origin", "git@github.com:acme/widgets.git"]);

    let status = GitReader::new()
        .get_status(repo.root_path(), &CancelToken::background())
        .unwrap();
    assert_eq!(status.owner.as_deref(), Some("acme"));
}

#[test]
fn test_ahead_of_upstream() {
    require_git!();
    let repo = TestRepo::new();
    let clone = repo.temp_path().join("clone");
    git_in(
        &repo.temp_path(),
        &["clone", "-q", repo.root_path().to_str().unwrap(), "clone"],
    );
    git_in(&clone, &["config", "user.name", "Test User"]);
    git_in(&clone, &["config", "user.email", "test@example.com"]);
    fs::write(clone.join("local.txt"), "local\n").unwrap();
    git_in(&clone, &["add", "-A"]);
    git_in(&clone, &["commit", "-q", "-m", "Local change"]);

    let status = GitReader::new()
        .get_status(&clone, &CancelToken::background())
        .unwrap();
    assert_eq!(status.remote.as_deref(), Some("origin/main"));
    assert_eq!(status.ahead, 1);
    assert_eq!(status.behind, 0);
}

#[test]
fn test_status_outside_repository_fails() {
    require_git!();
    let dir = tempfile::TempDir::new().unwrap();
    let err = GitReader::new()
        .get_status(dir.path(), &CancelToken::background())
        .unwrap_err();
    assert!(matches!(err, GitError::Failed { .. }), "{err}");
}

#[test]
fn test_batch_reports_failures_per_path() {
    require_git!();
    let repo = TestRepo::new();
    let not_a_repo = tempfile::TempDir::new().unwrap();
    let paths = vec![
        repo.root_path().to_path_buf(),
        not_a_repo.path().to_path_buf(),
    ];

    let batch = GitReader::with_concurrency(1).get_status_batch(&paths, &CancelToken::background());
    assert_eq!(batch.results.len(), 1);
    assert!(batch.results.contains_key(repo.root_path()));
    assert_eq!(batch.errors.len(), 1);
    assert!(batch.errors.contains_key(not_a_repo.path()));
}

#[test]
fn test_failed_fetch_still_reads_status() {
    require_git!();
    let repo = TestRepo::new();
    let missing = repo.temp_path().join("no-such-remote");
    repo.git(&["remote", "add", "origin", missing.to_str().unwrap()]);

    let outcome = GitReader::new()
        .fetch(repo.root_path(), &CancelToken::background())
        .unwrap();
    assert!(outcome.fetch_error.is_some());
    assert_eq!(outcome.status.branch.as_deref(), Some("main"));

    let batch = GitReader::new()
        .fetch_batch(&[repo.root_path().to_path_buf()], &CancelToken::background());
    assert!(batch.results.contains_key(repo.root_path()));
    assert!(batch.errors.contains_key(repo.root_path()));
}

#[test]
fn test_fetch_outside_repository_fails() {
    require_git!();
    let dir = tempfile::TempDir::new().unwrap();
    assert!(
        GitReader::new()
            .fetch(dir.path(), &CancelToken::background())
            .is_err()
    );
}

#[test]
fn test_diff_stats_split_staged_and_unstaged() {
    require_git!();
    let repo = TestRepo::new();
    repo.write_file("lib.txt", "one\ntwo\nthree\n");
    repo.commit("Add lib");
    repo.write_file("lib.txt", "one\ntwo\nthree\nfour\n");
    repo.write_file("new.txt", "x\ny\n");
    repo.git(&["add", "new.txt"]);

    let diff = GitReader::new().get_diff_stats(repo.root_path(), &CancelToken::background());

    assert_eq!(diff.unstaged.added(), 1);
    assert_eq!(diff.unstaged.deleted(), 0);
    assert_eq!(diff.unstaged.files().len(), 1);
    assert_eq!(diff.unstaged.files()[0].path, "lib.txt");
    assert_eq!(diff.staged.added(), 2);
    assert_eq!(diff.total_added(), 3);
    assert_eq!(diff.total_deleted(), 0);
    assert_eq!(diff.net_delta(), 3);

    assert_eq!(diff.commits_this_week(), 2);
    assert_eq!(diff.daily_commits[6], 2);
    assert_eq!(diff.file_churn.get("lib.txt"), Some(&1));
    assert_eq!(diff.file_churn.get("README.md"), Some(&1));
}

#[test]
fn test_diff_stats_outside_repository_are_empty() {
    require_git!();
    let dir = tempfile::TempDir::new().unwrap();
    let diff = GitReader::new().get_diff_stats(dir.path(), &CancelToken::background());
    assert_eq!(diff.total_diff_volume(), 0);
    assert_eq!(diff.commits_this_week(), 0);
    assert!(diff.file_churn.is_empty());
}

#[test]
fn test_aliases_keep_only_successful_output() {
    require_git!();
    let repo = TestRepo::new();
    let reader = GitReader::new();
    let token = CancelToken::background();

    let subject = reader
        .run_alias(repo.root_path(), "log -1 --format=%s", &token)
        .unwrap();
    assert_eq!(subject, "Initial commit\n");

    let mut aliases = IndexMap::new();
    aliases.insert("subject".to_string(), "log -1 --format=%s".to_string());
    aliases.insert("broken".to_string(), "not-a-git-command".to_string());
    let results = reader.run_aliases(repo.root_path(), &aliases, &token);

    assert_eq!(results.len(), 1);
    assert_eq!(results.get("subject").map(String::as_str), Some("Initial commit"));
}

#[test]
fn test_alias_batch_covers_every_repository() {
    require_git!();
    let first = TestRepo::new();
    let second = TestRepo::new();
    let not_a_repo = tempfile::TempDir::new().unwrap();
    let paths = vec![
        first.root_path().to_path_buf(),
        second.root_path().to_path_buf(),
        not_a_repo.path().to_path_buf(),
    ];
    let mut aliases = IndexMap::new();
    aliases.insert("subject".to_string(), "log -1 --format=%s".to_string());

    let results =
        GitReader::with_concurrency(1).run_aliases_batch(&paths, &aliases, &CancelToken::background());

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[first.root_path()].get("subject").map(String::as_str),
        Some("Initial commit")
    );
    assert!(results[not_a_repo.path()].is_empty());
    assert!(
        GitReader::new()
            .run_aliases_batch(&paths, &IndexMap::new(), &CancelToken::background())
            .is_empty()
    );
}
