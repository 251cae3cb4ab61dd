//! `serve` command: the read-only map API.
//!
//! A small hyper http1 server over the persisted aggregate. Responses are
//! read fresh from the store on every request, so a re-run of `aggregate`
//! shows up without a restart. The `through` query parameter drives the
//! spoiler-free progressive reveal: only entries first seen at or before
//! that chapter index are returned.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use colored::Colorize;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use url::form_urlencoded;

use innmap_model::{AggregatedLocation, AggregatedRelationship, Chapter};
use innmap_store::Store;

struct ServerState {
    store: Store,
    static_dir: Option<PathBuf>,
}

pub fn cmd_serve(data_dir: &Path, host: &str, port: u16, static_dir: Option<PathBuf>) -> Result<()> {
    let store = Store::open(data_dir)?;
    let state = Arc::new(ServerState { store, static_dir });

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async move { serve_async(addr, state).await })
}

async fn serve_async(addr: SocketAddr, state: Arc<ServerState>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    println!(
        "{} http://{}",
        "Serving at".green().bold(),
        listener.local_addr().unwrap_or(addr)
    );

    loop {
        let (stream, _peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("serve: accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ServerState>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    let resp = match (method, path.as_str()) {
        (Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (Method::GET, "/status") => match status_payload(&state) {
            Ok(v) => json_response(StatusCode::OK, &v),
            Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        (Method::GET, "/api/chapters") => match handle_chapters(&state, query.as_deref()) {
            Ok(v) => json_response(StatusCode::OK, &v),
            Err(e) => e,
        },
        (Method::GET, "/api/locations") => match handle_locations(&state, query.as_deref()) {
            Ok(v) => json_response(StatusCode::OK, &v),
            Err(e) => e,
        },
        (Method::GET, "/api/relationships") => {
            match handle_relationships(&state, query.as_deref()) {
                Ok(v) => json_response(StatusCode::OK, &v),
                Err(e) => e,
            }
        }
        (Method::GET, "/api/containment") => match state.store.read_aggregated() {
            Ok(data) => json_response(StatusCode::OK, &data.containment),
            Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        (Method::GET, "/api/coordinates") => match state.store.read_coordinates() {
            Ok(coords) => json_response(StatusCode::OK, &coords),
            Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        (Method::GET, _) => serve_static(&state, &path),
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(resp)
}

fn status_payload(state: &ServerState) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "chapters": state.store.chapter_count(),
        "scraped": state.store.chapter_text_count(),
        "extracted": state.store.extraction_count(),
        "locations": state.store.location_count(),
    }))
}

fn handle_chapters(
    state: &ServerState,
    query: Option<&str>,
) -> std::result::Result<Vec<Chapter>, Response<Full<Bytes>>> {
    let toc = state
        .store
        .read_toc()
        .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;

    Ok(filter_chapters(toc.chapters, query_param(query, "volume").as_deref()))
}

fn handle_locations(
    state: &ServerState,
    query: Option<&str>,
) -> std::result::Result<Vec<AggregatedLocation>, Response<Full<Bytes>>> {
    let data = state
        .store
        .read_aggregated()
        .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;

    let through = parse_through(query)
        .map_err(|msg| json_error(StatusCode::BAD_REQUEST, &msg))?;
    Ok(filter_locations(data.locations, through))
}

fn handle_relationships(
    state: &ServerState,
    query: Option<&str>,
) -> std::result::Result<Vec<AggregatedRelationship>, Response<Full<Bytes>>> {
    let data = state
        .store
        .read_aggregated()
        .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;

    let through = parse_through(query)
        .map_err(|msg| json_error(StatusCode::BAD_REQUEST, &msg))?;
    Ok(filter_relationships(data.relationships, through))
}

// ---------------------------------------------------------------------------
// Pure filter helpers
// ---------------------------------------------------------------------------

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Parse the spoiler-filter parameter. Absent is `None`; a present but
/// non-numeric value is a client error.
fn parse_through(query: Option<&str>) -> std::result::Result<Option<usize>, String> {
    match query_param(query, "through") {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| "invalid 'through' parameter".to_string()),
    }
}

fn filter_chapters(chapters: Vec<Chapter>, volume: Option<&str>) -> Vec<Chapter> {
    match volume {
        None => chapters,
        Some(v) => chapters.into_iter().filter(|ch| ch.volume == v).collect(),
    }
}

fn filter_locations(
    locations: Vec<AggregatedLocation>,
    through: Option<usize>,
) -> Vec<AggregatedLocation> {
    match through {
        None => locations,
        Some(through) => locations
            .into_iter()
            .filter(|loc| loc.first_chapter_index <= through)
            .collect(),
    }
}

fn filter_relationships(
    relationships: Vec<AggregatedRelationship>,
    through: Option<usize>,
) -> Vec<AggregatedRelationship> {
    match through {
        None => relationships,
        Some(through) => relationships
            .into_iter()
            .filter(|rel| rel.first_chapter_index <= through)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Static files
// ---------------------------------------------------------------------------

fn serve_static(state: &ServerState, path: &str) -> Response<Full<Bytes>> {
    let Some(dir) = state.static_dir.as_ref() else {
        return json_error(StatusCode::NOT_FOUND, "not found");
    };

    let rel = path.trim_start_matches('/');
    let rel = if rel.is_empty() { "index.html" } else { rel };

    // Refuse anything that could escape the static dir.
    if rel.split('/').any(|seg| seg == ".." || seg.contains('\\')) {
        return json_error(StatusCode::NOT_FOUND, "not found");
    }

    let full = dir.join(rel);
    match std::fs::read(&full) {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type_for(&full))
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error")))),
        Err(_) => json_error(StatusCode::NOT_FOUND, "not found"),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        // Wildcard CORS: this is a local development tool, not a public API.
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str) -> Response<Full<Bytes>> {
    let v = serde_json::json!({ "error": msg });
    json_response(status, &v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use innmap_model::LocationType;

    fn location(id: &str, first_chapter_index: usize) -> AggregatedLocation {
        AggregatedLocation {
            id: id.to_string(),
            name: id.to_string(),
            location_type: LocationType::City,
            aliases: Vec::new(),
            description: String::new(),
            visual_description: String::new(),
            first_chapter_index,
            mention_count: 3,
            chapter_indices: vec![first_chapter_index],
        }
    }

    #[test]
    fn through_filters_locations_by_first_chapter() {
        let locations = vec![location("a", 0), location("b", 5), location("c", 10)];

        let all = filter_locations(locations.clone(), None);
        assert_eq!(all.len(), 3);

        let early = filter_locations(locations, Some(5));
        let ids: Vec<&str> = early.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn through_parses_from_query_string() {
        assert_eq!(parse_through(Some("through=12")).unwrap(), Some(12));
        assert_eq!(parse_through(Some("volume=vol-1")).unwrap(), None);
        assert_eq!(parse_through(None).unwrap(), None);
        assert!(parse_through(Some("through=abc")).is_err());
    }

    #[test]
    fn volume_filters_chapters() {
        let chapters = vec![
            Chapter {
                index: 0,
                volume: "vol-1".to_string(),
                ..Chapter::default()
            },
            Chapter {
                index: 1,
                volume: "vol-2".to_string(),
                ..Chapter::default()
            },
        ];

        assert_eq!(filter_chapters(chapters.clone(), None).len(), 2);
        let only = filter_chapters(chapters, Some("vol-2"));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].index, 1);
    }

    #[test]
    fn static_paths_cannot_escape_the_root() {
        let state = ServerState {
            store: Store::open(tempfile::tempdir().unwrap().path()).unwrap(),
            static_dir: Some(PathBuf::from("/nonexistent")),
        };
        let resp = serve_static(&state, "/../etc/passwd");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
