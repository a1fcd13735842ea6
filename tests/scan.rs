mod common;

use common::{TestRepo, git_available, git_in};
use gitvision::{CancelToken, Config, IgnoreSet, Walker};
use std::fs;

#[test]
fn test_finds_repository_and_linked_worktree() {
    if !git_available() {
        eprintln!("skipping: git not installed");
        return;
    }
    let repo = TestRepo::new();
    let feature = repo.add_worktree("feature");

    let walker = Walker::new(vec![repo.temp_path()], 10, IgnoreSet::empty());
    let report = walker.scan(&CancelToken::background()).unwrap();

    assert!(report.errors.is_empty());
    assert_eq!(report.repos.len(), 2, "{:?}", report.repos);
    assert_eq!(report.worktree_count(), 1);

    let main = report
        .repos
        .iter()
        .find(|r| r.path == repo.root_path())
        .expect("main repository found");
    assert!(!main.is_worktree);
    assert_eq!(main.main_worktree, None);

    let linked = report
        .repos
        .iter()
        .find(|r| r.path == feature)
        .expect("linked worktree found");
    assert!(linked.is_worktree);
    assert_eq!(linked.main_worktree.as_deref(), Some(repo.root_path()));
    assert_eq!(linked.display_name(), "feature");
}

#[test]
fn test_from_config_prunes_default_ignores() {
    if !git_available() {
        eprintln!("skipping: git not installed");
        return;
    }
    let repo = TestRepo::new();
    let vendored = repo.temp_path().join("tools/node_modules/dep");
    fs::create_dir_all(&vendored).unwrap();
    git_in(&vendored, &["init", "-q", "-b", "main"]);

    let config = Config {
        scan_paths: vec![repo.temp_path()],
        ..Config::default()
    };
    let report = Walker::from_config(&config)
        .unwrap()
        .scan(&CancelToken::background())
        .unwrap();

    let paths: Vec<_> = report.repos.iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec![repo.root_path().to_path_buf()]);
}

#[test]
fn test_same_repository_under_two_roots_reported_once() {
    if !git_available() {
        eprintln!("skipping: git not installed");
        return;
    }
    let repo = TestRepo::new();

    let walker = Walker::new(
        vec![repo.temp_path(), repo.root_path().to_path_buf()],
        10,
        IgnoreSet::empty(),
    );
    let report = walker.scan(&CancelToken::background()).unwrap();
    assert_eq!(report.repos.len(), 1);
    assert_eq!(report.repos[0].path, repo.root_path());
}
