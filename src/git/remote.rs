//! Owner/organisation extraction from remote URLs.

const SCHEMES: [&str; 3] = ["ssh://", "https://", "http://"];

/// Extract the owner from a remote URL.
///
/// Handles SSH shorthand (`git@host:owner/repo.git`) and scheme-qualified
/// URLs (`https://host/owner/repo`, `ssh://git@host/owner/repo`). Returns
/// `None` when the URL has no owner segment.
pub fn owner_from_remote_url(url: &str) -> Option<&str> {
    let url = url.trim();
    let has_scheme = SCHEMES.iter().any(|scheme| url.starts_with(scheme));

    if !has_scheme
        && url.contains('@')
        && let Some((host, path)) = url.split_once(':')
        && !host.contains('/')
    {
        return path.split('/').next().filter(|owner| !owner.is_empty());
    }

    let mut rest = url;
    for scheme in SCHEMES {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }
    if let Some((_, after_userinfo)) = rest.split_once('@') {
        rest = after_userinfo;
    }

    rest.split('/').nth(1).filter(|owner| !owner.is_empty())
}
