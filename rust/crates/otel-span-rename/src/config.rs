//! Middleware configuration.

/// Response header consulted for the span name when none is configured.
pub const DEFAULT_HEADER: &str = "x-span-name";

/// The single durable setting of the rename stage: which response header
/// carries the desired span name.
///
/// Established once at startup and shared read-only across in-flight
/// requests; the header name is never empty after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    header: String,
}

impl Config {
    /// Uses `header` as the name-source header. Surrounding whitespace is
    /// trimmed; a blank value falls back to [`DEFAULT_HEADER`].
    pub fn new(header: impl AsRef<str>) -> Self {
        let header = header.as_ref().trim();
        if header.is_empty() {
            Self::default()
        } else {
            Self {
                header: header.to_owned(),
            }
        }
    }

    /// Builds a configuration from a directive-style argument list.
    ///
    /// An empty list yields the default. Each non-blank token (trimmed)
    /// replaces the header name, so with repeated tokens the last one wins.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            let value = arg.as_ref().trim();
            if !value.is_empty() {
                config.header = value.to_owned();
            }
        }
        config
    }

    /// The header name to consult for the span name.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_owned(),
        }
    }
}
