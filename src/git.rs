//! Git CLI integration
//!
//! All repository state is read by running the `git` executable with the
//! repository as its working directory and parsing the text it prints.
//! Nothing here reads git's object store directly; the only filesystem
//! probes are for in-progress operation markers.

mod cmd;
mod error;
mod numstat;
mod porcelain;
mod reader;
mod remote;
mod special_state;

pub use cmd::git_output;
pub use error::{GitError, Result as GitResult};
pub use numstat::{parse_daily_commits, parse_file_churn, parse_numstat};
pub use porcelain::parse_porcelain_v2;
pub use reader::{
    Batch, DEFAULT_CONCURRENCY, FETCH_TIMEOUT, FetchOutcome, GitReader, PROBE_TIMEOUT,
    STATUS_ARGS,
};
pub use remote::owner_from_remote_url;
pub use special_state::apply_special_state;
