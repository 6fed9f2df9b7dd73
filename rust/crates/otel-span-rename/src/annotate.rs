//! The decision procedure that renames and tags the active request span.

use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;

/// Response header written by the Souin caching layer.
pub const CACHE_STATUS_HEADER: &str = "Cache-Status";

/// Boolean span attribute recording whether the response came from cache.
pub const CACHE_HIT_ATTRIBUTE: &str = "cache.hit";

// Souin reports a hit as `Souin; hit; <details>`; anything else under
// `Cache-Status` counts as a miss. Anchored and case-sensitive.
static CACHE_HIT: Lazy<Regex> =
    Lazy::new(|| Regex::new("^Souin; hit;(.*)").expect("cache status pattern"));

/// The mutation surface of the span active for the current request.
///
/// Production code wraps the request's `tracing::Span`
/// ([`crate::middleware::OtelSpan`]); tests substitute a recording fake.
pub trait ActiveSpan {
    /// Whether an active sampled/propagated span exists at all. When this
    /// is false the annotator leaves the span completely untouched.
    fn is_valid(&self) -> bool;

    /// Overwrites the span's display name.
    fn set_name(&self, name: &str);

    /// Attaches a boolean attribute to the span.
    fn set_bool(&self, key: &'static str, value: bool);
}

/// Renames `span` from the response headers and tags its cache status.
///
/// Runs after the downstream service has produced `headers`. If the span
/// context is invalid or the configured header is empty, nothing is
/// mutated; this path is silent apart from a diagnostic event. A non-empty
/// header value becomes the span name verbatim, and a non-empty
/// `Cache-Status` header then sets `cache.hit` to the outcome of the hit
/// pattern. Never fails.
pub fn annotate_span<S: ActiveSpan>(span: &S, headers: &HeaderMap, config: &Config) {
    if !span.is_valid() {
        tracing::debug!("span context invalid");
        return;
    }

    let name = header_str(headers, config.header());
    tracing::debug!(header = config.header(), name, "setting span name");

    if name.is_empty() {
        return;
    }
    span.set_name(name);

    let cache_status = header_str(headers, CACHE_STATUS_HEADER);
    if !cache_status.is_empty() {
        span.set_bool(CACHE_HIT_ATTRIBUTE, is_cache_hit(cache_status));
    }
}

/// Whether a non-empty `Cache-Status` value reports a Souin cache hit.
pub fn is_cache_hit(cache_status: &str) -> bool {
    CACHE_HIT.is_match(cache_status)
}

// Missing headers and values that are not valid UTF-8 both read as "".
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
