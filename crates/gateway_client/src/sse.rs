//! Server-sent event client for a fixture's offer stream.
//!
//! Opens `GET {base}{stream_path}` with `Accept: text/event-stream` and
//! decodes the chunked body into [`StreamEvent`]s in arrival order.
//! Dropping the returned stream closes the connection.

use std::collections::VecDeque;

use common::config::GatewayConfig;
use common::{Error, FixtureSummary, Offer, StreamEvent, StreamSummary};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::rate_limit::RateLimiter;
use crate::{format_error_chain, join_url, normalize_base_url};

/// One dispatched SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field; `message` when absent.
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence;
/// only complete lines are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.handle_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush a trailing frame when the body ends without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.handle_line(line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry are not used by the offer stream.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".into()),
            data,
        })
    }
}

// ── Event payloads ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataPayload {
    #[serde(default)]
    total_chunks: u32,
}

#[derive(Debug, Deserialize)]
struct OffersBatchPayload {
    #[serde(default)]
    offers: Vec<Offer>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OfferPayload {
    offer: Offer,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    fatal: bool,
}

/// Decode one frame. Unknown event names yield `None`.
pub fn decode_frame(frame: &SseFrame) -> Option<Result<StreamEvent, Error>> {
    let parsed = match frame.event.as_str() {
        "metadata" => serde_json::from_str::<MetadataPayload>(&frame.data).map(|m| {
            StreamEvent::Metadata {
                total_chunks: m.total_chunks,
            }
        }),
        "fixture" => serde_json::from_str::<FixtureSummary>(&frame.data).map(StreamEvent::Fixture),
        "offers-batch" => serde_json::from_str::<OffersBatchPayload>(&frame.data).map(|b| {
            let count = b.count.unwrap_or(b.offers.len());
            StreamEvent::OffersBatch {
                offers: b.offers,
                count,
                source: b.source,
            }
        }),
        "offer" => serde_json::from_str::<OfferPayload>(&frame.data).map(|o| StreamEvent::Offer {
            offer: o.offer,
            source: o.source,
        }),
        "error" => serde_json::from_str::<ErrorPayload>(&frame.data).map(|e| StreamEvent::Error {
            message: e.message,
            fatal: e.fatal,
        }),
        "complete" => serde_json::from_str::<StreamSummary>(&frame.data).map(StreamEvent::Complete),
        other => {
            debug!("Offer stream event '{}' (ignored)", other);
            return None;
        }
    };

    Some(parsed.map_err(|e| {
        warn!(
            "Failed to parse '{}' event: {}; raw: {}",
            frame.event,
            e,
            frame.data.chars().take(200).collect::<String>()
        );
        Error::Json(e)
    }))
}

/// Queue a decoded frame. Payloads that fail to parse were already
/// logged by [`decode_frame`] and are skipped; the stream carries on.
fn queue_frame(pending: &mut VecDeque<Result<StreamEvent, Error>>, frame: &SseFrame) {
    match decode_frame(frame) {
        Some(Ok(event)) => pending.push_back(Ok(event)),
        Some(Err(_)) | None => {}
    }
}

/// Turn any byte stream into an ordered event stream.
///
/// Only transport failures surface as `Err` items, and they end the
/// stream. A malformed frame is dropped without affecting its neighbours.
pub fn decode_byte_stream<S, B, E>(bytes: S) -> BoxStream<'static, Result<StreamEvent, Error>>
where
    S: futures_util::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + 'static,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<Result<StreamEvent, Error>>,
        done: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.push(chunk.as_ref()) {
                        queue_frame(&mut state.pending, &frame);
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(Error::Stream(format_error_chain(&e))));
                }
                None => {
                    state.done = true;
                    if let Some(frame) = state.decoder.finish() {
                        queue_frame(&mut state.pending, &frame);
                    }
                }
            }
        }
    })
    .boxed()
}

/// Opens offer streams against the gateway.
#[derive(Debug, Clone)]
pub struct OfferStreamClient {
    client: reqwest::Client,
    base_url: String,
    stream_path: String,
    limiter: RateLimiter,
}

impl OfferStreamClient {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, Error> {
        // No overall timeout: the stream stays open until `complete`.
        let client = reqwest::Client::builder()
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(format_error_chain(&e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&cfg.base_url),
            stream_path: cfg.stream_path.clone(),
            limiter: RateLimiter::per_second(cfg.requests_per_sec),
        })
    }

    fn stream_url(&self, fixture_id: &str) -> Result<String, Error> {
        let segments: Vec<String> = self
            .stream_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.replace("{id}", fixture_id))
            .collect();
        let url = join_url(&self.base_url, segments.iter().map(String::as_str))?;
        Ok(url.to_string())
    }

    /// Open the stream for one fixture.
    pub async fn connect(
        &self,
        fixture_id: &str,
    ) -> Result<BoxStream<'static, Result<StreamEvent, Error>>, Error> {
        let url = self.stream_url(fixture_id)?;
        self.limiter.wait().await;

        info!("Opening offer stream: {}", url);

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Error::Stream(format_error_chain(&e)))?;

        let status_code = resp.status().as_u16();
        if status_code != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status_code,
                message: body,
            });
        }

        Ok(decode_byte_stream(resp.bytes_stream()))
    }

    /// Like [`connect`](Self::connect) but folds the connect error into the stream.
    pub fn open(&self, fixture_id: &str) -> BoxStream<'static, Result<StreamEvent, Error>> {
        let client = self.clone();
        let fixture_id = fixture_id.to_string();
        stream::once(async move { client.connect(&fixture_id).await })
            .flat_map(|opened| match opened {
                Ok(events) => events,
                Err(e) => stream::iter([Err(e)]).boxed(),
            })
            .boxed()
    }
}
