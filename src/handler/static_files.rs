//! Static file serving module
//!
//! Serves the front-end that talks to the proxy: the index file for `/` and
//! anything else below the static root.

use hyper::body::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::StaticFilesConfig;
use crate::handler::router::RequestContext;
use crate::http::{self, GatewayResponse};

/// Serve `ctx.path` from the static root
pub async fn serve(ctx: &RequestContext<'_>, cfg: &StaticFilesConfig) -> GatewayResponse {
    let Some(file_path) = resolve(&cfg.root, ctx.path, &cfg.index_file) else {
        return http::build_404_response();
    };

    let content = match fs::read(&file_path).await {
        Ok(c) => Bytes::from(c),
        Err(e) => {
            tracing::error!("Failed to read file '{}': {e}", file_path.display());
            return http::build_404_response();
        }
    };

    let etag = generate_etag(&content);
    if etag_matches(ctx.if_none_match.as_deref(), &etag) {
        return http::build_304_response(&etag);
    }

    let content_type = mime_guess::from_path(&file_path).first_or_octet_stream();
    http::build_file_response(content, content_type.essence_str(), &etag, ctx.is_head)
}

/// Map a request path to a file inside `root`
///
/// Directories resolve to their index file. Anything that escapes the root
/// after canonicalization is refused.
pub fn resolve(root: &str, request_path: &str, index_file: &str) -> Option<PathBuf> {
    let root_canonical = match Path::new(root).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Static directory not found or inaccessible '{root}': {e}");
            return None;
        }
    };

    let relative = request_path.trim_start_matches('/');
    let mut candidate = root_canonical.join(relative);
    if relative.is_empty() || candidate.is_dir() {
        candidate = candidate.join(index_file);
    }

    // File not found is common (404), no need to log at warning level
    let canonical = candidate.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        tracing::warn!(
            "Path traversal attempt blocked: {request_path} -> {}",
            canonical.display()
        );
        return None;
    }
    canonical.is_file().then_some(canonical)
}

/// Quoted `ETag` derived from the file content
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// `If-None-Match` check supporting lists and `*`
pub fn etag_matches(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == etag || candidate == "*")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        stdfs::create_dir_all(public.join("css")).unwrap();
        stdfs::write(public.join("index.html"), "<h1>home</h1>").unwrap();
        stdfs::write(public.join("css/site.css"), "body{}").unwrap();
        stdfs::write(dir.path().join("secret.txt"), "nope").unwrap();
        dir
    }

    fn root(dir: &tempfile::TempDir) -> String {
        dir.path().join("public").to_string_lossy().into_owned()
    }

    #[test]
    fn test_resolve_index() {
        let dir = site();
        let root = root(&dir);
        let path = resolve(&root, "/", "index.html").unwrap();
        assert!(path.ends_with("index.html"));
    }

    #[test]
    fn test_resolve_nested_file() {
        let dir = site();
        let root = root(&dir);
        let path = resolve(&root, "/css/site.css", "index.html").unwrap();
        assert!(path.ends_with("css/site.css"));
    }

    #[test]
    fn test_resolve_missing_and_traversal() {
        let dir = site();
        let root = root(&dir);
        assert!(resolve(&root, "/missing.js", "index.html").is_none());
        assert!(resolve(&root, "/../secret.txt", "index.html").is_none());
        assert!(resolve(&root, "/css", "index.html").is_none());
    }

    #[test]
    fn test_resolve_missing_root() {
        assert!(resolve("/definitely/not/here", "/", "index.html").is_none());
    }

    #[test]
    fn test_etag() {
        let a = generate_etag(b"same content");
        assert_eq!(a, generate_etag(b"same content"));
        assert_ne!(a, generate_etag(b"other content"));
        assert!(a.starts_with('"') && a.ends_with('"'));
    }

    #[test]
    fn test_etag_matches() {
        let etag = "\"abc123\"";
        assert!(etag_matches(Some("\"abc123\""), etag));
        assert!(etag_matches(Some("\"xyz\", \"abc123\""), etag));
        assert!(etag_matches(Some("*"), etag));
        assert!(!etag_matches(Some("\"different\""), etag));
        assert!(!etag_matches(None, etag));
    }
}
