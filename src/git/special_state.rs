//! In-progress operation markers inside the git directory.

use crate::repository::RepoStatus;
use crate::scanner::resolve_git_dir;
use std::path::Path;

/// Set the merge/rebase/cherry-pick/revert/bisect flags on `status` from the
/// marker files in `repo`'s git directory. Presence is all that matters.
pub fn apply_special_state(repo: &Path, status: &mut RepoStatus) {
    let git_dir = resolve_git_dir(repo);
    let exists = |name: &str| git_dir.join(name).exists();

    status.merge_head = exists("MERGE_HEAD");
    status.cherry_pick = exists("CHERRY_PICK_HEAD");
    status.reverting = exists("REVERT_HEAD");
    status.bisecting = exists("BISECT_LOG");
    status.rebase_head = exists("rebase-merge") || exists("rebase-apply");
}
