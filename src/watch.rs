//! Real-time change monitoring driven by the poller

mod state;

pub use state::WatchState;

use colored::Colorize;
use gitvision::{CancelToken, Config, GitReader, Poller, Repository};
use std::thread;
use std::time::Duration;

/// Ceiling for the initial status read of every repository
const INITIAL_CEILING: Duration = Duration::from_secs(30);
/// Ceiling for refreshing one repository after a change
const REFRESH_CEILING: Duration = Duration::from_secs(10);

/// Entry point for watch mode - polls until interrupted, printing a line per change
pub fn run_watch_mode(
    repos: Vec<Repository>,
    reader: &GitReader,
    config: &Config,
) -> Result<(), String> {
    if !config.auto_refresh {
        return Err("auto_refresh is disabled in the config".to_string());
    }

    let mut state = WatchState::with_repositories(repos);
    print_event(state.events.back().map(String::as_str).unwrap_or_default());

    let token = CancelToken::background().with_timeout(INITIAL_CEILING);
    let batch = reader.get_status_batch(&state.paths(), &token);
    for (path, err) in &batch.errors {
        eprintln!("Warning: {}: {}", path.display(), err);
    }
    for (path, status) in batch.results {
        state.update_status(&path, status);
    }

    let poller = Poller::new(config.poll_interval());
    poller.watch_all(&state.paths());

    let line = state.add_event(format!(
        "Polling every {}s (Ctrl+C to stop)",
        poller.interval().as_secs()
    ));
    print_event(line);

    let (handle, token) = CancelToken::new();
    let events = poller.events();

    thread::scope(|s| {
        s.spawn(|| poller.run(&token));

        // Runs until the process is interrupted (Ctrl+C); nothing here closes the poller.
        for event in events.iter() {
            let refresh = token.with_timeout(REFRESH_CEILING);
            let status = reader.get_status_from_output(&event.path, &event.status_output, &refresh);
            let diff = reader.get_diff_stats(&event.path, &refresh);
            state.update_status(&event.path, status);
            state.update_diff(&event.path, diff);

            if let Some(description) = state.describe(&event.path) {
                print_event(state.add_event_at(event.time, description));
            }
        }

        handle.cancel();
    });

    Ok(())
}

fn print_event(line: &str) {
    match line.split_once("] ") {
        Some((stamp, rest)) => println!("{}] {}", stamp.bright_black(), rest),
        None => println!("{}", line),
    }
}
