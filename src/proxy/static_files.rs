//! Static file serving module
//!
//! Serves the built frontend. Paths that resolve to nothing fall back to the
//! entry document so client-side routes load the single-page app.

use hyper::body::Bytes;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::RequestContext;
use crate::config::ProxyConfig;
use crate::http::{self, cache, cache::CachePolicy, mime, HttpResponse};
use crate::logger;

/// Serve a request from the static directory
pub async fn serve(ctx: &RequestContext<'_>, config: &ProxyConfig) -> HttpResponse {
    let static_dir = Path::new(&config.static_dir);

    if let Some(file) = resolve(static_dir, ctx.path, &config.index_file).await {
        if let Some(resp) = serve_path(ctx, &file).await {
            return resp;
        }
    }

    logger::log_debug(&format!("No file for '{}', serving entry document", ctx.path));
    serve_entry_document(ctx, static_dir, &config.index_file).await
}

async fn serve_entry_document(
    ctx: &RequestContext<'_>,
    static_dir: &Path,
    index_file: &str,
) -> HttpResponse {
    match serve_path(ctx, &static_dir.join(index_file)).await {
        Some(resp) => resp,
        None => {
            logger::log_error(&format!(
                "Entry document '{index_file}' missing from '{}'",
                static_dir.display()
            ));
            http::build_404_response()
        }
    }
}

/// Map a request path to a file inside `static_dir`.
///
/// Returns `None` for anything that escapes the directory or does not name
/// an existing file (directories resolve to their index file).
pub async fn resolve(static_dir: &Path, request_path: &str, index_file: &str) -> Option<PathBuf> {
    let decoded = decode_path(request_path)?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        logger::log_warning(&format!("Path traversal attempt blocked: {request_path}"));
        return None;
    }

    let mut candidate = static_dir.join(relative);
    if fs::metadata(&candidate).await.ok()?.is_dir() {
        candidate = candidate.join(index_file);
    }

    // Symlinks must not lead outside the directory either
    let root = match fs::canonicalize(static_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                static_dir.display()
            ));
            return None;
        }
    };
    let resolved = fs::canonicalize(&candidate).await.ok()?;
    if !resolved.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            resolved.display()
        ));
        return None;
    }

    fs::metadata(&resolved)
        .await
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|_| resolved)
}

/// Percent-decode a request path. Encoded separators and NUL never name a
/// file, so they yield `None`, as does invalid UTF-8.
fn decode_path(request_path: &str) -> Option<Cow<'_, str>> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
    let separators_before = request_path.matches(['/', '\\']).count();
    if decoded.matches(['/', '\\']).count() != separators_before || decoded.contains('\0') {
        logger::log_warning(&format!("Rejected encoded separator or NUL in path: {request_path}"));
        return None;
    }
    Some(decoded)
}

/// Read a file and build its response, honouring `If-None-Match`
async fn serve_path(ctx: &RequestContext<'_>, file: &Path) -> Option<HttpResponse> {
    let content = match fs::read(file).await {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                logger::log_error(&format!("Failed to read file '{}': {e}", file.display()));
            }
            return None;
        }
    };

    let content_type = mime::get_content_type(file.extension().and_then(|e| e.to_str()));
    let policy = CachePolicy::for_content_type(content_type);
    let etag = cache::generate_etag(&content);

    if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return Some(http::build_304_response(&etag, policy));
    }

    Some(http::build_file_response(
        Bytes::from(content),
        content_type,
        &etag,
        policy,
        ctx.is_head,
    ))
}
