//! Cookie sources: where authentication evidence is read from.
//!
//! The detector never assumes a particular cookie backend. Everything goes
//! through the [`CookieSource`] trait, with implementations for an in-memory
//! shared jar (embedding, tests), a `name=value; ...` header string, and
//! Netscape-format cookie-file exports (CLI use).

mod netscape;
mod source;

pub use netscape::{
    CookieFileError, CookieFileParse, CookieRow, cookie_map_from_rows, parse_netscape_cookies,
};
pub use source::{CookieSource, FileCookieSource, MemoryCookieSource, parse_cookie_header};
