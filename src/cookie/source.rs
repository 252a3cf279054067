//! The [`CookieSource`] abstraction and its standard implementations.
//!
//! The cookie jar is process-wide mutable state that can change between any
//! two reads (the external ERP origin sets cookies out-of-band), so callers
//! re-read and re-validate on every use instead of trusting a snapshot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument};

use super::netscape::{CookieFileError, cookie_map_from_rows, parse_netscape_cookies};

/// A readable (and, for the degraded fallback path, writable) cookie jar.
///
/// `read_all` is a pure read with no failure mode: a source with no cookies
/// returns an empty map.
pub trait CookieSource: Send + Sync {
    /// Returns all visible cookies as a name → value map.
    fn read_all(&self) -> HashMap<String, String>;

    /// Sets a cookie on the local jar.
    ///
    /// Only the degraded compatibility shim writes cookies; normal detection
    /// is read-only.
    fn write(&self, name: &str, value: &str);

    /// Removes a single cookie, if present.
    fn remove(&self, name: &str);

    /// Removes every cookie from the jar.
    fn clear(&self);
}

/// Parses a `name=value; name2=value2` cookie header string into a map.
///
/// Splits on `;`, trims whitespace, splits each pair on the first `=`, and
/// percent-decodes values (falling back to the raw value when decoding
/// fails). Entries without an `=` are skipped.
#[must_use]
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for entry in header.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((name, value)) = entry.split_once('=') else {
            debug!(entry = %entry, "skipping cookie entry without '='");
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let decoded = urlencoding::decode(value)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|_| value.to_string());
        cookies.insert(name.to_string(), decoded);
    }

    cookies
}

/// Shared in-memory cookie jar.
///
/// Clones share the same underlying map, so a test (or an embedding host)
/// can hold one handle while the detector reads through another.
#[derive(Clone, Default)]
pub struct MemoryCookieSource {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCookieSource {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar pre-populated from a cookie header string.
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(parse_cookie_header(header))),
        }
    }
}

impl CookieSource for MemoryCookieSource {
    fn read_all(&self) -> HashMap<String, String> {
        self.inner.lock().map(|map| map.clone()).unwrap_or_default()
    }

    fn write(&self, name: &str, value: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(name.to_string(), value.to_string());
        }
    }

    fn remove(&self, name: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(name);
        }
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.lock() {
            map.clear();
        }
    }
}

/// Cookie source backed by a Netscape-format cookie-file export.
///
/// The file is parsed once at construction; the source is a snapshot of the
/// export, so writes only affect the in-memory view.
#[derive(Clone)]
pub struct FileCookieSource {
    inner: MemoryCookieSource,
}

impl FileCookieSource {
    /// Loads cookies from a Netscape-format file, optionally keeping only
    /// cookies whose domain matches `domain` (subdomain-aware for
    /// tail-matched entries).
    ///
    /// # Errors
    ///
    /// Returns [`CookieFileError`] when the file cannot be read or yields no
    /// valid cookies.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, domain: Option<&str>) -> Result<Self, CookieFileError> {
        let file = std::fs::File::open(path.as_ref())?;
        let parsed = parse_netscape_cookies(std::io::BufReader::new(file))?;
        for (line, reason) in &parsed.warnings {
            tracing::warn!(line, reason = %reason, "skipped malformed cookie line");
        }
        let map = cookie_map_from_rows(&parsed.rows, domain);
        debug!(cookies = map.len(), "loaded cookie file");
        Ok(Self {
            inner: MemoryCookieSource {
                inner: Arc::new(Mutex::new(map)),
            },
        })
    }
}

impl CookieSource for FileCookieSource {
    fn read_all(&self) -> HashMap<String, String> {
        self.inner.read_all()
    }

    fn write(&self, name: &str, value: &str) {
        self.inner.write(name, value);
    }

    fn remove(&self, name: &str) {
        self.inner.remove(name);
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header_basic_pairs() {
        let map = parse_cookie_header("user_id=a%40b.com; full_name=A B; sid=xyz");
        assert_eq!(map.len(), 3);
        assert_eq!(map["user_id"], "a@b.com");
        assert_eq!(map["full_name"], "A B");
        assert_eq!(map["sid"], "xyz");
    }

    #[test]
    fn test_parse_cookie_header_empty_string() {
        assert!(parse_cookie_header("").is_empty());
    }

    #[test]
    fn test_parse_cookie_header_skips_entries_without_equals() {
        let map = parse_cookie_header("malformed; sid=xyz; alsobad");
        assert_eq!(map.len(), 1);
        assert_eq!(map["sid"], "xyz");
    }

    #[test]
    fn test_parse_cookie_header_splits_on_first_equals_only() {
        let map = parse_cookie_header("token=a=b=c");
        assert_eq!(map["token"], "a=b=c");
    }

    #[test]
    fn test_parse_cookie_header_invalid_percent_escape_kept_raw() {
        // %zz is not a valid escape; the raw value must survive
        let map = parse_cookie_header("name=bad%zzvalue");
        assert_eq!(map["name"], "bad%zzvalue");
    }

    #[test]
    fn test_memory_source_clones_share_state() {
        let source = MemoryCookieSource::new();
        let handle = source.clone();
        handle.write("sid", "abc");
        assert_eq!(source.read_all()["sid"], "abc");
        handle.remove("sid");
        assert!(source.read_all().is_empty());
    }

    #[test]
    fn test_memory_source_clear_empties_jar() {
        let source = MemoryCookieSource::from_header("a=1; b=2");
        assert_eq!(source.read_all().len(), 2);
        source.clear();
        assert!(source.read_all().is_empty());
    }
}
