//! # Request Handlers Module
//!
//! Translates HTTP requests into record store and statistics operations.
//! Routing lives in the parent module; everything here works on already
//! routed requests and returns either a response or a [`HashServerError`]
//! for the server to render.

use super::middleware::RequestMiddleware;
use crate::error::{HashServerError, Result};
use crate::stats::StatsAccumulator;
use crate::store::RecordStore;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use percent_encoding::percent_decode;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Form field carrying the secret
pub const SECRET_FIELD: &str = "password";

/// Handler for the `/hash` and `/stats` endpoints
#[derive(Debug, Clone)]
pub struct HashHandler {
    /// Shared record store
    pub store: Arc<RecordStore>,
    /// Shared submission statistics
    pub stats: Arc<StatsAccumulator>,
    max_payload_size: usize,
}

impl HashHandler {
    /// Create a handler over shared state
    #[must_use]
    pub fn new(
        store: Arc<RecordStore>,
        stats: Arc<StatsAccumulator>,
        max_payload_size: usize,
    ) -> Self {
        Self {
            store,
            stats,
            max_payload_size,
        }
    }

    /// Handle `POST /hash`
    ///
    /// Reads the `password` form field (body first, then query string),
    /// stores it and answers with the new id as plain text. The whole
    /// handling time is recorded in the statistics once the response is
    /// built; rejected submissions are not recorded.
    ///
    /// ## Errors
    /// - `PayloadTooLarge` if the body exceeds the configured limit
    /// - `EmptyInput` if no non-empty `password` is present
    #[instrument(level = "debug", name = "submit_handler", skip(self, request))]
    pub async fn submit<B>(
        &self,
        request: Request<B>,
        remote_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let timer = RequestMiddleware::started();
        let (parts, body) = request.into_parts();

        let body = Limited::new(body, self.max_payload_size)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    warn!("Payload too large from {}", remote_addr);
                    HashServerError::payload_too_large(self.max_payload_size)
                } else {
                    HashServerError::request_error(format!("Failed to read request body: {e}"))
                }
            })?
            .to_bytes();

        let secret = extract_secret(parts.uri.query(), &body).ok_or_else(|| {
            debug!("Submission from {} carried no {}", remote_addr, SECRET_FIELD);
            HashServerError::empty_input()
        })?;

        let id = self.store.submit(&secret)?;
        let response = text_response(StatusCode::OK, id.to_string())?;

        self.stats.record(timer.elapsed());
        info!(id, "Accepted secret from {}", remote_addr);

        Ok(response)
    }

    /// Handle `GET /hash/{id}`
    ///
    /// ## Errors
    /// - `RequestError` if `id_segment` is not an unsigned integer
    /// - `NotFound` / `NotReady` from the store
    #[instrument(level = "debug", name = "retrieve_handler", skip(self))]
    pub fn retrieve(&self, id_segment: &str) -> Result<Response<Full<Bytes>>> {
        let id: u64 = id_segment.parse().map_err(|e| {
            HashServerError::request_error(format!("Invalid id '{id_segment}': {e}"))
        })?;

        let digest = self.store.retrieve(id)?;
        debug!(id, digest = %digest, "Reporting digest");

        text_response(StatusCode::OK, digest)
    }

    /// Handle `GET /stats`
    ///
    /// 200 with `{"total":N,"average":micros}`, or 204 before the first
    /// accepted submission.
    pub fn stats(&self) -> Result<Response<Full<Bytes>>> {
        let Some(snapshot) = self.stats.snapshot() else {
            debug!("No submissions recorded yet");
            return Ok(Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header("cache-control", "no-cache")
                .body(Full::new(Bytes::new()))?);
        };

        let body = serde_json::to_string(&snapshot)?;
        debug!("Stats: {}", body);

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .header("cache-control", "no-cache")
            .body(Full::new(Bytes::from(body)))?)
    }
}

/// Find a non-empty secret in a form-encoded body, falling back to the query
///
/// The value is returned as raw bytes; percent-escapes that do not form valid
/// UTF-8 are kept as-is.
fn extract_secret(query: Option<&str>, body: &[u8]) -> Option<Vec<u8>> {
    form_value(body, SECRET_FIELD)
        .or_else(|| query.and_then(|q| form_value(q.as_bytes(), SECRET_FIELD)))
}

/// First non-empty value of `field` in `application/x-www-form-urlencoded` input
fn form_value(input: &[u8], field: &str) -> Option<Vec<u8>> {
    input
        .split(|&b| b == b'&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (key, value) = match pair.iter().position(|&b| b == b'=') {
                Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                None => (pair, &[][..]),
            };
            if decode_component(key) != field.as_bytes() {
                return None;
            }

            let value = decode_component(value);
            (!value.is_empty()).then_some(value)
        })
}

/// Decode `+` as space, then percent-escapes, without UTF-8 validation
fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    percent_decode(&spaced).collect()
}

fn text_response(status: StatusCode, body: String) -> Result<Response<Full<Bytes>>> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .header("cache-control", "no-cache, no-store, must-revalidate")
        .body(Full::new(Bytes::from(body)))?)
}
