//! Remote data gateway client library.
//!
//! Provides paginated REST reads and the per-fixture offer stream.

pub mod envelope;
pub mod rate_limit;
pub mod rest;
pub mod sse;

pub use envelope::{ApiResponse, FixtureList, Page, Pagination};
pub use rate_limit::RateLimiter;
pub use rest::GatewayRestClient;
pub use sse::{OfferStreamClient, SseDecoder, SseFrame};

use std::error::Error as StdError;

use common::Error;

/// Flatten an error and its sources into one line.
pub(crate) fn format_error_chain(err: &dyn StdError) -> String {
    // Keep chained causes so network failures (DNS/TLS/socket) are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Append `segments` to the base URL's path, percent-encoding each one.
pub(crate) fn join_url<'a>(
    base_url: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<url::Url, Error> {
    let mut url = url::Url::parse(base_url)
        .map_err(|e| Error::Config(format!("invalid gateway URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("gateway URL {} cannot take a path", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
