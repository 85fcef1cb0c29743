//! Thin HTTP translation layer in front of the cache orchestrator.
//!
//! Requests are parsed off a single read per connection and answered with a
//! redirect, a file, or a plain-text status. All cache-consistency logic
//! lives in [`PackageCache`]; this module only translates.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::{CacheOutcome, PackageCache};
use crate::models::config::RepkgConfig;
use crate::models::package::{PackageId, PackageRequest};
use crate::paths::RepkgPaths;
use crate::ports::VersionResolver;
use crate::repositories::{
    HttpTarballFetcher, RegistryMetadataClient, TarballExtractor, TokioFileSystem,
};
use crate::RepkgError;

type Cache = PackageCache<HttpTarballFetcher, TarballExtractor, TokioFileSystem>;

struct AppState {
    cache: Cache,
    resolver: RegistryMetadataClient,
}

/// Builds the component stack from `config` and serves until SIGINT/SIGTERM,
/// then drains in-flight connections within the configured grace period.
pub async fn serve(config: RepkgConfig) -> Result<(), RepkgError> {
    let paths = RepkgPaths::new(config.cache.root_dir.clone());
    let file_system = TokioFileSystem;
    paths.create_directories(&file_system).await?;

    let fetcher = HttpTarballFetcher::new(config.registry.fetch_timeout())?;
    let cache = PackageCache::new(
        fetcher,
        TarballExtractor,
        file_system,
        paths,
        config.registry.clone(),
    );
    cache.sweep_staging().await?;

    let resolver = RegistryMetadataClient::new(config.registry.clone())?;
    let state = Arc::new(AppState { cache, resolver });

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| RepkgError::config(format!("cannot bind {}: {}", config.listen_addr, e)))?;
    info!(addr = %config.listen_addr, registry = %config.registry.base_url, "listening");

    let mut connections = JoinSet::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let state = state.clone();
                        connections.spawn(async move {
                            if let Err(err) = handle_stream(stream, state).await {
                                debug!(peer = %peer, error = %err, "connection error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "accept failed"),
                }
                // reap finished tasks so the set does not grow unbounded
                while connections.try_join_next().is_some() {}
            }
            _ = &mut shutdown => break,
        }
    }

    info!("shutting down, draining connections");
    let drained = tokio::time::timeout(config.shutdown_grace(), async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            grace_secs = config.shutdown_grace_secs,
            "drain timed out, aborting remaining connections"
        );
        connections.abort_all();
    }

    info!("server exiting");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn handle_stream(mut stream: TcpStream, state: Arc<AppState>) -> std::io::Result<()> {
    let mut buf = vec![0u8; 64 * 1024];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]).to_string();
    let request_line = request.lines().next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");

    let response = route_request(method, path, &state).await;
    stream.write_all(&response.into_bytes()).await?;
    Ok(())
}

async fn route_request(method: &str, path: &str, state: &AppState) -> HttpResponse {
    match method {
        "OPTIONS" => HttpResponse::no_content(),
        "GET" => {
            if let Some(rest) = path.strip_prefix("/npm/") {
                handle_npm(rest, state).await
            } else if let Some(rest) = path.strip_prefix("/packages/") {
                serve_static(rest, state).await
            } else {
                HttpResponse::not_found()
            }
        }
        _ => HttpResponse::text("405 Method Not Allowed", "method not allowed\n"),
    }
}

async fn handle_npm(rest: &str, state: &AppState) -> HttpResponse {
    let request = match parse_npm_path(rest) {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };

    match cache_package(&request, state).await {
        Ok((id, outcome)) => {
            if tokio::fs::try_exists(&outcome.cache_dir).await.unwrap_or(false) {
                let location =
                    format!("/packages/{}/{}@{}", id.scope(), id.name(), id.version());
                HttpResponse::redirect(location)
            } else {
                HttpResponse::text("200 OK", format!("package {} is cached\n", id))
            }
        }
        Err(err) => error_response(err),
    }
}

/// Splits `{scope}/{name}[/{version}]` out of the request path. The version
/// segment is optional; anything that is not a real semantic version is
/// treated as absent and resolved upstream.
fn parse_npm_path(rest: &str) -> Result<PackageRequest, RepkgError> {
    let mut segments = rest.trim_end_matches('/').splitn(3, '/');
    let scope = segments.next().unwrap_or("");
    let name = segments.next().unwrap_or("");
    let version = segments
        .next()
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if scope.is_empty() || name.is_empty() {
        return Err(RepkgError::validation(
            "expected /npm/{scope}/{name}/{version}",
        ));
    }
    PackageRequest::new(scope, name, version)
}

async fn cache_package(
    request: &PackageRequest,
    state: &AppState,
) -> Result<(PackageId, CacheOutcome), RepkgError> {
    let version = match request.version() {
        Some(version) => version.to_string(),
        None => {
            state
                .resolver
                .resolve_latest(request.scope(), request.name())
                .await?
        }
    };

    let id = request.with_version(&version)?;
    let outcome = state.cache.ensure_cached(&id).await?;
    Ok((id, outcome))
}

async fn serve_static(rest: &str, state: &AppState) -> HttpResponse {
    let Some(relative) = sanitize_static_path(rest) else {
        return HttpResponse::text("400 Bad Request", "invalid path\n");
    };

    let full = state.cache.paths().root().join(relative);
    match tokio::fs::read(&full).await {
        Ok(body) => HttpResponse::file(content_type_for(&full), body),
        Err(_) => HttpResponse::not_found(),
    }
}

/// Normalizes a request path into a relative path that cannot escape the
/// packages root. Hidden components also get rejected so the staging area
/// stays private.
fn sanitize_static_path(rest: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().starts_with('.') {
                    return None;
                }
                out.push(part);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }

    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") | Some("mjs") => "text/javascript",
        Some("json") | Some("map") => "application/json",
        Some("css") => "text/css",
        Some("html") => "text/html",
        Some("md") => "text/markdown",
        _ => "application/octet-stream",
    }
}

fn error_response(err: RepkgError) -> HttpResponse {
    let status = if err.is_client_error() {
        "400 Bad Request"
    } else if matches!(err, RepkgError::FileSystem(_)) {
        "500 Internal Server Error"
    } else {
        // upstream trouble is not a plain not-found
        "502 Bad Gateway"
    };
    HttpResponse::text(status, format!("{}\n", err))
}

struct HttpResponse {
    status: &'static str,
    content_type: &'static str,
    location: Option<String>,
    body: Vec<u8>,
}

impl HttpResponse {
    fn text<B: Into<String>>(status: &'static str, body: B) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            location: None,
            body: body.into().into_bytes(),
        }
    }

    fn file(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: "200 OK",
            content_type,
            location: None,
            body,
        }
    }

    fn redirect(location: String) -> Self {
        Self {
            status: "302 Found",
            content_type: "text/plain; charset=utf-8",
            location: Some(location),
            body: b"redirecting\n".to_vec(),
        }
    }

    fn no_content() -> Self {
        Self {
            status: "204 No Content",
            content_type: "text/plain; charset=utf-8",
            location: None,
            body: Vec::new(),
        }
    }

    fn not_found() -> Self {
        Self::text("404 Not Found", "not found\n")
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.content_type,
            self.body.len()
        );
        head.push_str("Access-Control-Allow-Origin: *\r\n");
        head.push_str("Access-Control-Allow-Methods: GET, HEAD, OPTIONS\r\n");
        head.push_str("Access-Control-Allow-Headers: Authorization, Origin, Content-Length, Content-Type\r\n");
        if let Some(location) = &self.location {
            head.push_str(&format!("Location: {}\r\n", location));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
