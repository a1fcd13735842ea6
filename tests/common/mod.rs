#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;
use tempfile::TempDir;

static ISOLATE_GIT: Once = Once::new();

/// Whether a usable `git` is on PATH; tests that need one skip themselves otherwise
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Keep the developer's global and system git config out of the tests
fn isolate_git_env() {
    ISOLATE_GIT.call_once(|| unsafe {
        std::env::set_var("GIT_CONFIG_GLOBAL", "/dev/null");
        std::env::set_var("GIT_CONFIG_SYSTEM", "/dev/null");
        std::env::set_var("GIT_TERMINAL_PROMPT", "0");
        std::env::set_var("LC_ALL", "C");
        std::env::set_var("LANG", "C");
    });
}

/// Run git in `dir`, panicking with its stderr on failure
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed in {}: {}",
        args.join(" "),
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub struct TestRepo {
    temp_dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    /// Create a repository at `<tmp>/main` with one commit
    pub fn new() -> Self {
        Self::named("main")
    }

    /// Create a repository at `<tmp>/<name>` with one commit
    pub fn named(name: &str) -> Self {
        isolate_git_env();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // Canonicalize to resolve symlinks (macOS /var -> /private/var)
        let base = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp path");
        let root = base.join(name);
        fs::create_dir_all(&root).expect("Failed to create repo directory");

        git_in(&root, &["init", "-b", "main"]);
        git_in(&root, &["config", "user.name", "Test User"]);
        git_in(&root, &["config", "user.email", "test@example.com"]);
        git_in(&root, &["config", "commit.gpgsign", "false"]);

        let repo = Self { temp_dir, root };
        repo.write_file("README.md", "# test\n");
        repo.commit("Initial commit");
        repo
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Canonical temp directory that contains the repository
    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp path")
    }

    pub fn git(&self, args: &[&str]) -> String {
        git_in(&self.root, args)
    }

    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, contents).expect("Failed to write file");
    }

    /// Stage everything and commit
    pub fn commit(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
    }

    /// Add a linked worktree on a new branch at `<tmp>/<name>`
    pub fn add_worktree(&self, name: &str) -> PathBuf {
        let path = self.temp_path().join(name);
        let path_str = path.to_str().expect("temp path is UTF-8");
        self.git(&["worktree", "add", "-q", "-b", name, path_str]);
        path
    }
}
