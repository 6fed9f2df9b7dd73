use std::sync::Mutex;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use otel_span_rename::annotate::{annotate_span, is_cache_hit, ActiveSpan, CACHE_HIT_ATTRIBUTE};
use otel_span_rename::Config;

/// Records mutations instead of touching a real span.
#[derive(Default)]
struct FakeSpan {
    valid: bool,
    name: Mutex<Option<String>>,
    bools: Mutex<Vec<(&'static str, bool)>>,
}

impl FakeSpan {
    fn valid() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    fn name(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }

    fn bools(&self) -> Vec<(&'static str, bool)> {
        self.bools.lock().unwrap().clone()
    }
}

impl ActiveSpan for FakeSpan {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn set_name(&self, name: &str) {
        *self.name.lock().unwrap() = Some(name.to_owned());
    }

    fn set_bool(&self, key: &'static str, value: bool) {
        self.bools.lock().unwrap().push((key, value));
    }
}

fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

#[test]
fn invalid_span_is_never_touched() {
    let span = FakeSpan::default();
    annotate_span(
        &span,
        &headers(&[
            ("x-span-name", "GET /users/:id"),
            ("Cache-Status", "Souin; hit; ttl=30"),
        ]),
        &Config::default(),
    );
    assert_eq!(span.name(), None);
    assert!(span.bools().is_empty());
}

#[test]
fn renames_span_to_header_value() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[("x-span-name", "GET /users/:id")]),
        &Config::default(),
    );
    assert_eq!(span.name().as_deref(), Some("GET /users/:id"));
    // No Cache-Status header, so no cache attribute either.
    assert!(span.bools().is_empty());
}

#[test]
fn name_is_taken_verbatim() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[("x-span-name", "  padded name  ")]),
        &Config::default(),
    );
    assert_eq!(span.name().as_deref(), Some("  padded name  "));
}

#[test]
fn missing_header_leaves_name_alone() {
    let span = FakeSpan::valid();
    annotate_span(&span, &headers(&[]), &Config::default());
    assert_eq!(span.name(), None);
}

#[test]
fn empty_header_leaves_name_alone() {
    let span = FakeSpan::valid();
    annotate_span(&span, &headers(&[("x-span-name", "")]), &Config::default());
    assert_eq!(span.name(), None);
}

#[test]
fn cache_hit_sets_true() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[
            ("x-span-name", "GET /users/:id"),
            ("Cache-Status", "Souin; hit; ttl=30"),
        ]),
        &Config::default(),
    );
    assert_eq!(span.name().as_deref(), Some("GET /users/:id"));
    assert_eq!(span.bools(), vec![(CACHE_HIT_ATTRIBUTE, true)]);
}

#[test]
fn cache_miss_sets_false() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[
            ("x-span-name", "GET /users/:id"),
            ("Cache-Status", "Souin; miss"),
        ]),
        &Config::default(),
    );
    assert_eq!(span.bools(), vec![(CACHE_HIT_ATTRIBUTE, false)]);
}

#[test]
fn empty_cache_status_sets_nothing() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[("x-span-name", "GET /users/:id"), ("Cache-Status", "")]),
        &Config::default(),
    );
    assert_eq!(span.name().as_deref(), Some("GET /users/:id"));
    assert!(span.bools().is_empty());
}

#[test]
fn cache_status_is_ignored_without_a_rename() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[("Cache-Status", "Souin; hit; ttl=30")]),
        &Config::default(),
    );
    assert_eq!(span.name(), None);
    assert!(span.bools().is_empty());
}

#[test]
fn configured_header_is_consulted() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[
            ("x-span-name", "ignored"),
            ("x-route", "POST /orders"),
        ]),
        &Config::new("x-route"),
    );
    assert_eq!(span.name().as_deref(), Some("POST /orders"));
}

#[test]
fn header_lookup_is_case_insensitive() {
    let span = FakeSpan::valid();
    annotate_span(
        &span,
        &headers(&[("X-Span-Name", "GET /users/:id")]),
        &Config::default(),
    );
    assert_eq!(span.name().as_deref(), Some("GET /users/:id"));
}

#[test]
fn hit_pattern_edge_cases() {
    assert!(is_cache_hit("Souin; hit; ttl=10"));
    assert!(is_cache_hit("Souin; hit;"));
    // The pattern requires the second semicolon.
    assert!(!is_cache_hit("Souin; hit"));
    // Case-sensitive and anchored at the start.
    assert!(!is_cache_hit("souin; hit; ttl=10"));
    assert!(!is_cache_hit("proxy, Souin; hit; ttl=10"));
    assert!(!is_cache_hit("Souin; miss"));
}
