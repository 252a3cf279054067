//! Netscape cookie-file parsing (7 TAB-separated fields per line).
//!
//! Browser extensions export cookies in this format; the CLI feeds such an
//! export into the detector in place of a live document cookie string.

use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

/// One parsed row from a Netscape-format cookie file.
///
/// The value field is redacted in Debug output so session identifiers never
/// end up in logs.
#[derive(Clone)]
pub struct CookieRow {
    /// The domain the cookie belongs to (e.g., `.erp.example.com`).
    pub domain: String,
    /// Whether subdomains should match.
    pub host_wide: bool,
    /// URL path scope.
    pub path: String,
    /// HTTPS-only flag.
    pub secure: bool,
    /// Unix timestamp for expiry (0 = session cookie).
    pub expires: u64,
    /// Cookie name.
    pub name: String,
    /// Cookie value (sensitive, never log).
    value: String,
}

impl CookieRow {
    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this row's domain matches `domain`, honoring tail-matching
    /// for host-wide entries.
    #[must_use]
    pub fn matches_domain(&self, domain: &str) -> bool {
        let own = self.domain.trim_start_matches('.');
        if self.host_wide {
            domain == own || domain.ends_with(&format!(".{own}"))
        } else {
            domain == own
        }
    }
}

impl fmt::Debug for CookieRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRow")
            .field("domain", &self.domain)
            .field("host_wide", &self.host_wide)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors that can occur while parsing a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieFileError {
    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Result of parsing a cookie file: valid rows plus per-line warnings.
#[derive(Debug)]
pub struct CookieFileParse {
    /// Successfully parsed rows.
    pub rows: Vec<CookieRow>,
    /// Warnings for malformed lines (line number and reason).
    pub warnings: Vec<(usize, String)>,
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Each non-comment, non-blank line must contain exactly 7 TAB-separated
/// fields: `domain`, `tailmatch`, `path`, `secure`, `expires`, `name`,
/// `value`. Lines starting with `#` and blank lines are skipped.
///
/// # Errors
///
/// Returns [`CookieFileError::Io`] on read failure, or
/// [`CookieFileError::NoCookiesFound`] when a non-empty file yields zero
/// valid rows. Individual malformed lines are collected as warnings.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<CookieFileParse, CookieFileError> {
    let mut rows = Vec::new();
    let mut warnings = Vec::new();
    let mut non_blank_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        // Handle CRLF: strip trailing \r
        let line = line.trim_end();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        non_blank_lines += 1;

        match parse_row(line) {
            Ok(row) => {
                debug!(line = line_number, domain = %row.domain, name = %row.name, "parsed cookie");
                rows.push(row);
            }
            Err(reason) => {
                warn!(line = line_number, reason = %reason, "skipping malformed cookie line");
                warnings.push((line_number, reason));
            }
        }
    }

    if rows.is_empty() && non_blank_lines > 0 {
        return Err(CookieFileError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(CookieFileParse { rows, warnings })
}

/// Flattens parsed rows into a name → value map, dropping expired rows and,
/// when `domain` is given, rows that do not match it.
///
/// Later rows win on name collisions, mirroring how a browser would present
/// the most specific cookie last.
#[must_use]
pub fn cookie_map_from_rows(rows: &[CookieRow], domain: Option<&str>) -> HashMap<String, String> {
    let now = unix_now();
    let mut map = HashMap::new();
    for row in rows {
        if row.expires > 0 && row.expires <= now {
            continue;
        }
        if let Some(domain) = domain
            && !row.matches_domain(domain)
        {
            continue;
        }
        map.insert(row.name.clone(), row.value.clone());
    }
    map
}

fn parse_row(line: &str) -> Result<CookieRow, String> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() != 7 {
        return Err(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        ));
    }

    let domain = fields[0].to_string();
    if domain.is_empty() {
        return Err("domain field is empty".to_string());
    }

    let host_wide = parse_bool_field(fields[1], "tailmatch")?;
    let path = fields[2].to_string();
    let secure = parse_bool_field(fields[3], "secure")?;

    let expires = fields[4].parse::<u64>().map_err(|_| {
        format!(
            "expires field must be a non-negative integer, got '{}'",
            fields[4]
        )
    })?;

    let name = fields[5].to_string();
    if name.is_empty() {
        return Err("cookie name field is empty".to_string());
    }

    Ok(CookieRow {
        domain,
        host_wide,
        path,
        secure,
        expires,
        name,
        value: fields[6].to_string(),
    })
}

fn parse_bool_field(value: &str, field_name: &str) -> Result<bool, String> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(format!(
            "{field_name} field must be TRUE or FALSE, got '{value}'"
        )),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor(s: &str) -> Cursor<&[u8]> {
        Cursor::new(s.as_bytes())
    }

    #[test]
    fn test_parse_netscape_cookies_valid_file() {
        let input = "\
# Netscape HTTP Cookie File
.erp.example.com\tTRUE\t/\tFALSE\t0\tuser_id\ta@b.com
.erp.example.com\tTRUE\t/\tTRUE\t4102444800\tsid\txyz789
";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.warnings.is_empty());

        assert_eq!(result.rows[0].domain, ".erp.example.com");
        assert!(result.rows[0].host_wide);
        assert_eq!(result.rows[0].name, "user_id");
        assert_eq!(result.rows[0].value(), "a@b.com");
        assert_eq!(result.rows[1].expires, 4_102_444_800);
        assert!(result.rows[1].secure);
    }

    #[test]
    fn test_parse_netscape_cookies_malformed_lines_collected_as_warnings() {
        let input = "\
.good.com\tTRUE\t/\tFALSE\t0\tuser_id\tme
not a cookie line
.good.com\tTRUE\t/\tFALSE\t0\tsid\tval
";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].0, 2, "warning should name line 2");
        assert!(result.warnings[0].1.contains("7 TAB-separated fields"));
    }

    #[test]
    fn test_parse_netscape_cookies_empty_file_yields_nothing() {
        let result = parse_netscape_cookies(cursor("")).unwrap();
        assert!(result.rows.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_parse_netscape_cookies_all_malformed_is_error() {
        let result = parse_netscape_cookies(cursor("bad\nworse\n"));
        assert!(matches!(
            result,
            Err(CookieFileError::NoCookiesFound { malformed_count: 2 })
        ));
    }

    #[test]
    fn test_parse_netscape_cookies_crlf_line_endings() {
        let input = ".erp.com\tTRUE\t/\tFALSE\t0\tsid\tvalue\r\n";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        assert_eq!(result.rows[0].value(), "value");
    }

    #[test]
    fn test_cookie_row_debug_redacts_value() {
        let input = ".erp.com\tTRUE\t/\tFALSE\t0\tsid\tsuper_secret\n";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        let debug_str = format!("{:?}", result.rows[0]);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super_secret"));
    }

    #[test]
    fn test_cookie_map_from_rows_filters_expired() {
        let input = "\
.erp.com\tTRUE\t/\tFALSE\t1\tstale\told
.erp.com\tTRUE\t/\tFALSE\t0\tsid\tlive
";
        let result = parse_netscape_cookies(cursor(input)).unwrap();
        let map = cookie_map_from_rows(&result.rows, None);
        assert_eq!(map.len(), 1);
        assert_eq!(map["sid"], "live");
    }

    #[test]
    fn test_cookie_map_from_rows_domain_filter() {
        let input = "\
.erp.com\tTRUE\t/\tFALSE\t0\tsid\terp
other.com\tFALSE\t/\tFALSE\t0\tsid\tother
";
        let result = parse_netscape_cookies(cursor(input)).unwrap();

        let map = cookie_map_from_rows(&result.rows, Some("portal.erp.com"));
        assert_eq!(map["sid"], "erp", "tail-matched subdomain should win");

        let map = cookie_map_from_rows(&result.rows, Some("other.com"));
        assert_eq!(map["sid"], "other");

        let map = cookie_map_from_rows(&result.rows, Some("sub.other.com"));
        assert!(
            map.is_empty(),
            "host-only cookie must not match a subdomain"
        );
    }

    #[test]
    fn test_matches_domain_exact_and_tail() {
        let input = ".erp.com\tTRUE\t/\tFALSE\t0\tsid\tv\n";
        let row = &parse_netscape_cookies(cursor(input)).unwrap().rows[0];
        assert!(row.matches_domain("erp.com"));
        assert!(row.matches_domain("portal.erp.com"));
        assert!(!row.matches_domain("noterp.com"));
    }
}
