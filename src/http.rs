//! HTTP signaling endpoint.
//!
//! `POST /webrtc` takes the offer envelope (form field `sdp`, or the raw
//! body) and answers with the answer envelope as plain text.

use crate::error::{GatewayError, Result};
use crate::peer::ice::TransportConfig;
use crate::peer::state::STATS;
use crate::session::Orchestrator;
use hyper::body::HttpBody;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

const MAX_BODY_SIZE: u64 = 512 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

static INDEX_TEMPLATE: &str = include_str!("index.html");

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub transport: Arc<TransportConfig>,
    pub audio_source: String,
    pub video_source: String,
}

/// Serves until ctrl-c.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let service = make_service_fn(move |_| {
        let state = Arc::clone(&state);
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| remote_handler(req, Arc::clone(&state))))
        }
    });

    let server = Server::try_bind(&addr)?.serve(service);
    info!("Listening on http://{addr}");

    server
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
        .map_err(GatewayError::from)
}

pub async fn remote_handler(
    req: Request<Body>,
    state: Arc<AppState>,
) -> std::result::Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") | (&Method::GET, "/index.html") => Ok(index(&state.transport)),

        (&Method::GET, "/healthz") => Ok(healthz()),

        (&Method::POST, "/webrtc") => start_stream(req, state).await,

        _ => Ok(text(StatusCode::NOT_FOUND, "Not Found")),
    }
}

async fn start_stream(
    req: Request<Body>,
    state: Arc<AppState>,
) -> std::result::Result<Response<Body>, hyper::Error> {
    let envelope = match extract_sdp(req).await? {
        Ok(Some(envelope)) => envelope,
        Ok(None) => return Ok(text(StatusCode::BAD_REQUEST, "missing form data 'sdp'")),
        Err(response) => return Ok(response),
    };

    let outcome = state
        .orchestrator
        .negotiate(
            &envelope,
            &state.audio_source,
            &state.video_source,
            Arc::clone(&state.transport),
        )
        .await;

    match outcome {
        Ok(answer) => Ok(text(StatusCode::OK, answer)),
        Err(err) => {
            let status = if err.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error!("negotiation failed: {err}");
            Ok(text(status, err.to_string()))
        }
    }
}

/// Pulls the offer envelope out of the request: the `sdp` form field (body
/// or query string), or the whole body when it is not a form.
async fn extract_sdp(
    req: Request<Body>,
) -> std::result::Result<std::result::Result<Option<String>, Response<Body>>, hyper::Error> {
    if let Some(sdp) = req.uri().query().and_then(|q| form_field(q.as_bytes(), "sdp")) {
        return Ok(Ok(non_empty(sdp)));
    }

    let is_form = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE));

    let body = req.into_body();
    if body.size_hint().upper().unwrap_or(body.size_hint().lower()) > MAX_BODY_SIZE {
        return Ok(Err(text(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")));
    }
    let bytes = hyper::body::to_bytes(body).await?;
    if bytes.len() as u64 > MAX_BODY_SIZE {
        return Ok(Err(text(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")));
    }

    if is_form {
        return Ok(Ok(form_field(&bytes, "sdp").and_then(non_empty)));
    }
    Ok(Ok(non_empty(String::from_utf8_lossy(&bytes).into_owned())))
}

fn form_field(input: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(input)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn index(transport: &TransportConfig) -> Response<Body> {
    let (server, user, password) = match &transport.relay {
        Some(relay) => (
            relay.address.as_str(),
            relay.username.as_str(),
            relay.credential.as_str(),
        ),
        None => ("", "", ""),
    };
    let page = INDEX_TEMPLATE
        .replace("{{TURN_SERVER}}", &js_string(server))
        .replace("{{TURN_USER}}", &js_string(user))
        .replace("{{TURN_PASSWORD}}", &js_string(password));

    let mut response = Response::new(Body::from(page));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response
}

/// Quoted JS string literal that is also safe inside a `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_owned())
        .replace('<', "\\u003c")
}

fn healthz() -> Response<Body> {
    match serde_json::to_vec(&STATS.snapshot()) {
        Ok(body) => {
            let mut response = Response::new(Body::from(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(err) => text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn text(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
