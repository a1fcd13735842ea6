use colored::{ColoredString, Colorize};
use gitvision::{
    CancelToken, Config, DiffStats, FileChurnEntry, GitError, GitReader, RepoStatus, Repository,
    ScanReport,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const STATUS_CEILING: Duration = Duration::from_secs(30);
const DIFF_CEILING: Duration = Duration::from_secs(60);
const FETCH_CEILING: Duration = Duration::from_secs(120);

/// JSON output for `status` and `fetch`
#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    repositories: &'a [Repository],
    errors: Vec<ErrorInfo>,
}

/// A per-repository failure, keyed by path
#[derive(Debug, Serialize)]
struct ErrorInfo {
    path: String,
    error: String,
}

/// JSON output for `scan`
#[derive(Debug, Serialize)]
struct ScanOutput<'a> {
    repositories: &'a [Repository],
    errors: Vec<String>,
    duration_ms: u128,
}

/// Diff figures for one repository with the derived totals spelled out
#[derive(Debug, Serialize)]
struct DiffInfo<'a> {
    name: String,
    path: String,
    total_added: usize,
    total_deleted: usize,
    net_delta: i64,
    unstaged: &'a gitvision::DiffSide,
    staged: &'a gitvision::DiffSide,
    daily_commits: [usize; 7],
    top_churn: Vec<FileChurnEntry>,
}

/// Handles the display of repositories and their status
pub struct StatusDisplay<'a> {
    repos: &'a [Repository],
    errors: &'a HashMap<PathBuf, GitError>,
}

impl<'a> StatusDisplay<'a> {
    pub fn new(repos: &'a [Repository], errors: &'a HashMap<PathBuf, GitError>) -> Self {
        Self { repos, errors }
    }

    /// Show every repository, then any failures
    pub fn show(&self) {
        let name_width = name_width(self.repos);
        println!("{}", "Repositories:".bright_cyan().bold());
        for repo in self.repos {
            match &repo.status {
                Some(status) => println!("  {}", status_line(repo, status, name_width)),
                None => println!(
                    "  {:width$}  {}",
                    repo.display_name().bright_blue(),
                    "unavailable".red(),
                    width = name_width
                ),
            }
            for (alias, output) in repo.status.iter().flat_map(|s| s.aliases.iter()) {
                println!(
                    "  {:width$}    {} {}",
                    "",
                    format!("{alias}:").bright_black(),
                    output.lines().next().unwrap_or_default(),
                    width = name_width
                );
            }
        }
        self.display_summary();
    }

    fn display_summary(&self) {
        let dirty = self.repos.iter().filter(|r| r.is_dirty()).count();
        let busy = self
            .repos
            .iter()
            .filter_map(|r| r.status.as_ref())
            .filter(|s| s.has_special_state())
            .count();

        print!("\n{}: ", "Summary".bright_cyan().bold());
        print!(
            "{} repositor{}, ",
            self.repos.len().to_string().bright_blue().bold(),
            if self.repos.len() == 1 { "y" } else { "ies" }
        );
        if dirty == 0 {
            print!("{} dirty", "none".bright_green().bold());
        } else {
            print!("{} dirty", dirty.to_string().yellow().bold());
        }
        if busy > 0 {
            print!(", {} mid-operation", busy.to_string().bright_red().bold());
        }
        println!();

        show_errors(self.errors);
    }
}

/// `name [branch] ↑a ↓b +staged ~modified ?untracked ≡stashes (states)`
fn status_line(repo: &Repository, status: &RepoStatus, name_width: usize) -> String {
    let head = status.head_label();
    let head = if status.detached_head {
        head.bright_yellow()
    } else if head == "main" || head == "master" {
        head.bright_white().bold()
    } else {
        head.bright_magenta()
    };

    let mut parts: Vec<ColoredString> = Vec::new();
    if status.ahead > 0 {
        parts.push(format!("↑{}", status.ahead).bright_green());
    }
    if status.behind > 0 {
        parts.push(format!("↓{}", status.behind).bright_red());
    }
    if status.staged > 0 {
        parts.push(format!("+{}", status.staged).green());
    }
    if status.modified > 0 {
        parts.push(format!("~{}", status.modified).yellow());
    }
    if status.untracked > 0 {
        parts.push(format!("?{}", status.untracked).bright_black());
    }
    if status.stashes > 0 {
        parts.push(format!("≡{}", status.stashes).cyan());
    }
    if !status.is_dirty() {
        parts.push("clean".green());
    }
    for state in status.special_states() {
        parts.push(format!("({state})").red().bold());
    }

    let mut line = format!(
        "{:width$} [{}]",
        repo.display_name().bright_blue(),
        head,
        width = name_width
    );
    for part in parts {
        line.push(' ');
        line.push_str(&part.to_string());
    }
    if repo.is_worktree {
        line.push_str(&format!(" {}", "worktree".bright_black().italic()));
    }
    line
}

fn name_width(repos: &[Repository]) -> usize {
    repos
        .iter()
        .map(|r| r.display_name().chars().count())
        .max()
        .unwrap_or(10)
        .clamp(10, 32)
}

fn show_errors(errors: &HashMap<PathBuf, GitError>) {
    if errors.is_empty() {
        return;
    }
    let mut errors: Vec<_> = errors.iter().collect();
    errors.sort_by(|a, b| a.0.cmp(b.0));
    println!(
        "  {} {} failed:",
        errors.len().to_string().bright_red().bold(),
        if errors.len() == 1 { "repository" } else { "repositories" }
    );
    for (path, err) in errors {
        println!("    {} {}: {}", "→".bright_red(), path.display(), err);
    }
}

fn error_infos(errors: &HashMap<PathBuf, GitError>) -> Vec<ErrorInfo> {
    let mut infos: Vec<ErrorInfo> = errors
        .iter()
        .map(|(path, err)| ErrorInfo {
            path: path.display().to_string(),
            error: err.to_string(),
        })
        .collect();
    infos.sort_by(|a, b| a.path.cmp(&b.path));
    infos
}

fn repo_paths(repos: &[Repository]) -> Vec<PathBuf> {
    repos.iter().map(|r| r.path.clone()).collect()
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(json_str) => println!("{}", json_str),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

/// Run the scan command - lists what discovery found
pub fn run_scan(report: &ScanReport, json: bool) {
    if json {
        print_json(&ScanOutput {
            repositories: &report.repos,
            errors: report.errors.iter().map(|e| e.to_string()).collect(),
            duration_ms: report.duration.as_millis(),
        });
        return;
    }

    println!("{}", "Repositories:".bright_cyan().bold());
    let width = name_width(&report.repos);
    for repo in &report.repos {
        let origin = match (&repo.main_worktree, repo.is_worktree) {
            (Some(main), true) => format!(" (worktree of {})", main.display()),
            (None, true) => " (worktree)".to_string(),
            _ => String::new(),
        };
        println!(
            "  {:width$} {}{}",
            repo.display_name().bright_blue(),
            repo.path.display().to_string().white(),
            origin.bright_black(),
            width = width
        );
    }
    println!(
        "\nFound {} repositor{} ({} worktree{}) in {:.1?}",
        report.repos.len().to_string().bright_blue().bold(),
        if report.repos.len() == 1 { "y" } else { "ies" },
        report.worktree_count(),
        if report.worktree_count() == 1 { "" } else { "s" },
        report.duration
    );
}

/// Run the status command - reads every repository and shows its state
pub fn run_status(mut repos: Vec<Repository>, reader: &GitReader, config: &Config, json: bool) {
    let token = CancelToken::background().with_timeout(STATUS_CEILING);
    let mut batch = reader.get_status_batch(&repo_paths(&repos), &token);

    let paths: Vec<PathBuf> = batch.results.keys().cloned().collect();
    for (path, aliases) in reader.run_aliases_batch(&paths, &config.aliases, &token) {
        if let Some(status) = batch.results.get_mut(&path) {
            status.aliases = aliases;
        }
    }

    apply_statuses(&mut repos, batch.results);
    if json {
        print_json(&StatusOutput {
            repositories: &repos,
            errors: error_infos(&batch.errors),
        });
    } else {
        StatusDisplay::new(&repos, &batch.errors).show();
    }
}

/// Run the fetch command - fetches every repository, then shows fresh status
pub fn run_fetch(mut repos: Vec<Repository>, reader: &GitReader, json: bool) {
    let token = CancelToken::background().with_timeout(FETCH_CEILING);
    if !json {
        println!(
            "{}",
            format!("Fetching {} repositories...", repos.len())
                .bright_yellow()
                .italic()
        );
    }
    let batch = reader.fetch_batch(&repo_paths(&repos), &token);

    apply_statuses(&mut repos, batch.results);
    if json {
        print_json(&StatusOutput {
            repositories: &repos,
            errors: error_infos(&batch.errors),
        });
    } else {
        StatusDisplay::new(&repos, &batch.errors).show();
    }
}

/// Run the diff command - line diffs and recent activity per repository
pub fn run_diff(mut repos: Vec<Repository>, reader: &GitReader, json: bool, top: usize) {
    let token = CancelToken::background().with_timeout(DIFF_CEILING);
    let mut stats = reader.get_diff_stats_batch(&repo_paths(&repos), &token);
    for repo in &mut repos {
        if let Some(diff) = stats.remove(&repo.path) {
            repo.apply_diff(diff);
        }
    }

    if json {
        let infos: Vec<DiffInfo> = repos
            .iter()
            .filter_map(|repo| repo.diff.as_ref().map(|diff| diff_info(repo, diff, top)))
            .collect();
        print_json(&infos);
        return;
    }

    println!("{}", "Diff stats:".bright_cyan().bold());
    let width = name_width(&repos);
    for repo in &repos {
        let Some(diff) = &repo.diff else {
            continue;
        };
        println!(
            "  {:width$} {} {}  {} {}",
            repo.display_name().bright_blue(),
            format!("+{}", diff.total_added()).green(),
            format!("-{}", diff.total_deleted()).red(),
            sparkline(&diff.daily_commits).bright_cyan(),
            format!("{} commits this week", diff.commits_this_week()).bright_black(),
            width = width
        );
        for entry in diff.top_churn_files(top) {
            println!(
                "  {:width$}   {} {} ({})",
                "",
                "→".bright_black(),
                entry.path.yellow(),
                entry.commits,
                width = width
            );
        }
    }
}

/// Run the config command - prints (and optionally persists) the effective config
pub fn run_config(config: &Config, path: &Path, write: bool) {
    match config.to_toml() {
        Ok(toml) => print!("{}", toml),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    if write {
        if let Err(e) = config.save(path) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        eprintln!("Wrote {}", path.display());
    }
}

fn apply_statuses(repos: &mut [Repository], mut statuses: HashMap<PathBuf, RepoStatus>) {
    for repo in repos {
        if let Some(status) = statuses.remove(&repo.path) {
            repo.apply_status(status);
        }
    }
}

fn diff_info<'a>(repo: &Repository, diff: &'a DiffStats, top: usize) -> DiffInfo<'a> {
    DiffInfo {
        name: repo.display_name(),
        path: repo.path.display().to_string(),
        total_added: diff.total_added(),
        total_deleted: diff.total_deleted(),
        net_delta: diff.net_delta(),
        unstaged: &diff.unstaged,
        staged: &diff.staged,
        daily_commits: diff.daily_commits,
        top_churn: diff.top_churn_files(top),
    }
}

/// One bar per day, scaled to the busiest day
fn sparkline(counts: &[usize; 7]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max = counts.iter().copied().max().unwrap_or(0);
    counts
        .iter()
        .map(|&count| {
            if max == 0 {
                BARS[0]
            } else {
                BARS[(count * (BARS.len() - 1)) / max]
            }
        })
        .collect()
}
