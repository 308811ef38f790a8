//! User directory bootstrap: on-disk cache first, then a full `users.list` walk.

use crate::error::{Result, SlackMcpError};
use crate::slack::{SlackApi, SlackUser};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Page size for `users.list`; Slack's documented maximum.
pub const USERS_PAGE_LIMIT: u32 = 1000;

/// How a bootstrap attempt ended
#[derive(Debug)]
pub enum BootstrapOutcome {
    CacheHit(Vec<SlackUser>),
    Fetched(Vec<SlackUser>),
    FetchFailed(SlackMcpError),
}

/// Populate the directory: a readable cache wins; anything else falls through
/// to a live fetch, which rewrites the cache when one is configured.
pub async fn bootstrap(api: &dyn SlackApi, cache_path: Option<&Path>) -> BootstrapOutcome {
    if let Some(path) = cache_path
        && let Some(users) = read_cache(path).await
    {
        return BootstrapOutcome::CacheHit(users);
    }

    tracing::info!("Fetching users from Slack API");
    match fetch_all_users(api).await {
        Ok(users) => {
            if let Some(path) = cache_path {
                write_cache(path, &users).await;
            }
            BootstrapOutcome::Fetched(users)
        }
        Err(e) => BootstrapOutcome::FetchFailed(e),
    }
}

/// Walk every `users.list` page until the cursor runs out
pub async fn fetch_all_users(api: &dyn SlackApi) -> Result<Vec<SlackUser>> {
    let mut users = Vec::new();
    let mut seen_cursors = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = api
            .list_users_page(USERS_PAGE_LIMIT, cursor.as_deref())
            .await?;
        tracing::debug!(page_size = page.users.len(), "Fetched users page");
        users.extend(page.users);

        if page.next_cursor.is_empty() {
            break;
        }
        if !seen_cursors.insert(page.next_cursor.clone()) {
            tracing::warn!(cursor = %page.next_cursor, "Slack repeated a users cursor, stopping");
            break;
        }
        cursor = Some(page.next_cursor);
    }

    Ok(users)
}

/// Read the cache file. Any failure is logged and reported as a miss.
pub async fn read_cache(path: &Path) -> Option<Vec<SlackUser>> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Users cache not found");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read users cache, will refetch");
            return None;
        }
    };

    match serde_json::from_slice::<Vec<SlackUser>>(&data) {
        Ok(users) => {
            tracing::info!(count = users.len(), path = %path.display(), "Loaded users from cache");
            Some(users)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse users cache, will refetch");
            None
        }
    }
}

/// Replace the cache file with the full user set. The data lands in a sibling
/// temp file first, so readers see either the old cache or the new one.
/// Failures are logged only.
pub async fn write_cache(path: &Path, users: &[SlackUser]) {
    let data = match serde_json::to_vec_pretty(users) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize users for cache");
            return;
        }
    };

    let tmp = temp_path(path);
    let result: std::io::Result<()> = async {
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, path).await
    }
    .await;

    match result {
        Ok(()) => {
            tracing::info!(count = users.len(), path = %path.display(), "Wrote users to cache")
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp).await;
            tracing::warn!(path = %path.display(), error = %e, "Failed to write users cache")
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "users_cache".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::{FakeSlack, user};

    #[tokio::test]
    async fn test_fetch_all_users_follows_cursor() {
        let api = FakeSlack::with_user_pages(vec![
            (vec![user("U1", "ann"), user("U2", "bob")], "page2"),
            (vec![user("U3", "cid")], ""),
        ]);

        let users = fetch_all_users(&api).await.unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(api.user_calls(), 2);
        assert_eq!(
            *api.user_cursors.lock().unwrap(),
            vec![None, Some("page2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_all_users_stops_on_repeated_cursor() {
        let api = FakeSlack::with_user_pages(vec![
            (vec![user("U1", "ann")], "loop"),
            (vec![user("U2", "bob")], "loop"),
            (vec![user("U3", "cid")], ""),
        ]);

        let users = fetch_all_users(&api).await.unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        write_cache(&path, &[user("U1", "ann")]).await;

        let api = FakeSlack::with_user_pages(vec![(vec![user("U9", "zed")], "")]);
        let outcome = bootstrap(&api, Some(&path)).await;

        assert!(matches!(outcome, BootstrapOutcome::CacheHit(ref u) if u.len() == 1));
        assert_eq!(api.user_calls(), 0);
    }

    #[tokio::test]
    async fn test_refetch_replaces_cache_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"[{\"id\": \"U1\", trunc").unwrap();

        let api = FakeSlack::with_user_pages(vec![(vec![user("U1", "ann"), user("U2", "bob")], "")]);
        let outcome = bootstrap(&api, Some(&path)).await;
        assert!(matches!(outcome, BootstrapOutcome::Fetched(ref u) if u.len() == 2));

        let cached = read_cache(&path).await.unwrap();
        assert_eq!(cached.len(), 2);

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("users.json")]);
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let tmp = temp_path(Path::new("/var/cache/users.json"));
        assert_eq!(tmp.parent(), Some(Path::new("/var/cache")));

        let name = tmp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".users.json."));
        assert!(name.ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_no_cache_configured_fetches_without_writing() {
        let api = FakeSlack::with_user_pages(vec![(vec![user("U1", "ann")], "")]);
        let outcome = bootstrap(&api, None).await;

        assert!(matches!(outcome, BootstrapOutcome::Fetched(ref u) if u.len() == 1));
        assert_eq!(api.user_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_reported() {
        let api = FakeSlack::failing_users();
        let outcome = bootstrap(&api, None).await;
        assert!(matches!(outcome, BootstrapOutcome::FetchFailed(_)));
    }

    #[tokio::test]
    async fn test_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("users.json");

        let api = FakeSlack::with_user_pages(vec![(vec![user("U1", "ann")], "")]);
        let outcome = bootstrap(&api, Some(&path)).await;

        assert!(matches!(outcome, BootstrapOutcome::Fetched(_)));
        assert!(!path.exists());
        assert!(!dir.path().join("missing-dir").exists());
    }
}
