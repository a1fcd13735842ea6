//! Parser for `git status --porcelain=v2 --branch`.
//!
//! Line-oriented and total: unknown or truncated lines are skipped.

use crate::repository::RepoStatus;

const DETACHED_HEAD: &str = "(detached)";
const SHORT_HASH_LEN: usize = 7;

/// Parse porcelain v2 output into a fresh [`RepoStatus`].
///
/// Only branch headers and entry counts are filled in; stash count, remote
/// owner, timestamps and special states come from other probes.
pub fn parse_porcelain_v2(output: &str) -> RepoStatus {
    let mut status = RepoStatus::default();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("# ") {
            parse_header(header, &mut status);
        } else if line.starts_with("1 ") || line.starts_with("2 ") {
            count_tracked_entry(line, &mut status);
        } else if line.starts_with("? ") {
            status.untracked += 1;
        } else if line.starts_with("u ") {
            status.modified += 1;
        }
        // "! " (ignored) and anything unrecognised fall through.
    }

    status
}

fn parse_header(header: &str, status: &mut RepoStatus) {
    let Some((key, value)) = header.split_once(' ') else {
        return;
    };

    match key {
        "branch.oid" => {
            // "(initial)" on an unborn branch has no hash to shorten.
            if !value.starts_with('(')
                && let Some(short) = value.get(..SHORT_HASH_LEN)
            {
                status.commit_hash = Some(short.to_string());
            }
        }
        "branch.head" => {
            if value == DETACHED_HEAD {
                status.detached_head = true;
            } else {
                status.branch = Some(value.to_string());
            }
        }
        "branch.upstream" => status.remote = Some(value.to_string()),
        "branch.ab" => {
            for token in value.split_whitespace() {
                if let Some(n) = token.strip_prefix('+') {
                    status.ahead = n.parse().unwrap_or(0);
                } else if let Some(n) = token.strip_prefix('-') {
                    status.behind = n.parse().unwrap_or(0);
                }
            }
        }
        _ => {}
    }
}

/// `1 XY ...` / `2 XY ...`: X is the index side, Y the worktree side.
fn count_tracked_entry(line: &str, status: &mut RepoStatus) {
    let bytes = line.as_bytes();
    if bytes.len() < 4 {
        return;
    }
    if is_change(bytes[2]) {
        status.staged += 1;
    }
    if is_change(bytes[3]) {
        status.modified += 1;
    }
}

fn is_change(code: u8) -> bool {
    code != b'.' && code != b'?'
}

/// Working-tree paths named by changed, renamed, unmerged and untracked
/// entries. C-quoted paths are skipped.
pub(crate) fn entry_paths(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter_map(|line| {
        let path = match line.split_once(' ')? {
            ("1", _) => line.splitn(9, ' ').nth(8),
            ("2", _) => line
                .splitn(10, ' ')
                .nth(9)
                .and_then(|rest| rest.split('\t').next()),
            ("u", _) => line.splitn(11, ' ').nth(10),
            ("?", rest) => Some(rest),
            _ => None,
        }?;
        (!path.is_empty() && !path.starts_with('"')).then_some(path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# branch.oid 1234567890abcdef1234567890abcdef12345678
# branch.head main
# branch.upstream origin/main
# branch.ab +2 -1
1 M. N... 100644 100644 100644 aaaaaaa bbbbbbb src/lib.rs
1 .M N... 100644 100644 100644 aaaaaaa bbbbbbb src/main.rs
? notes.txt
";

    #[test]
    fn test_parses_branch_headers_and_counts() {
        let status = parse_porcelain_v2(SAMPLE);
        assert_eq!(status.commit_hash.as_deref(), Some("1234567"));
        assert_eq!(status.branch.as_deref(), Some("main"));
        assert_eq!(status.remote.as_deref(), Some("origin/main"));
        assert_eq!((status.ahead, status.behind), (2, 1));
        assert_eq!(
            (status.staged, status.modified, status.untracked),
            (1, 1, 1)
        );
        assert!(!status.detached_head);
    }

    #[test]
    fn test_detached_head_leaves_branch_empty() {
        let status = parse_porcelain_v2("# branch.oid abcdef0123\n# branch.head (detached)\n");
        assert!(status.detached_head);
        assert_eq!(status.branch, None);
        assert_eq!(status.commit_hash.as_deref(), Some("abcdef0"));
    }

    #[test]
    fn test_initial_oid_has_no_hash() {
        let status = parse_porcelain_v2("# branch.oid (initial)\n# branch.head main\n");
        assert_eq!(status.commit_hash, None);
        assert_eq!(status.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_staged_and_modified_from_same_entry() {
        let status = parse_porcelain_v2(
            "1 MM N... 100644 100644 100644 aaaaaaa bbbbbbb both.rs\n\
             2 R. N... 100644 100644 100644 aaaaaaa bbbbbbb R100 new.rs\told.rs\n",
        );
        assert_eq!(status.staged, 2);
        assert_eq!(status.modified, 1);
    }

    #[test]
    fn test_unmerged_counts_as_modified_and_ignored_is_skipped() {
        let status = parse_porcelain_v2(
            "u UU N... 100644 100644 100644 100644 aaaaaaa bbbbbbb ccccccc conflict.rs\n\
             ! target/\n",
        );
        assert_eq!(status.modified, 1);
        assert_eq!(status.untracked, 0);
        assert!(status.is_dirty());
    }

    #[test]
    fn test_partial_ahead_behind_keeps_other_count() {
        let status = parse_porcelain_v2("# branch.ab +3\n");
        assert_eq!((status.ahead, status.behind), (3, 0));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let status = parse_porcelain_v2("#\n# branch.head\n1 \n1 M\n\n???\n# branch.ab +x -y\n");
        assert_eq!(status, RepoStatus::default());
    }

    #[test]
    fn test_entry_paths() {
        let output = "\
# branch.head main
1 .M N... 100644 100644 100644 aaaaaaa bbbbbbb dir/file name.rs
2 R. N... 100644 100644 100644 aaaaaaa bbbbbbb R100 renamed.rs\told_name.rs
u UU N... 100644 100644 100644 100644 aaaaaaa bbbbbbb ccccccc merge.rs
? new.txt
? \"quoted\\tname\"
! ignored.log
";
        let paths: Vec<&str> = entry_paths(output).collect();
        assert_eq!(
            paths,
            vec!["dir/file name.rs", "renamed.rs", "merge.rs", "new.txt"]
        );
    }
}
