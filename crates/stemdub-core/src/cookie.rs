//! Browser cookies and their Netscape cookie-jar rendering.
//!
//! Callers send cookies as JSON objects in the shape browser extensions
//! export them (`expirationDate` in epoch seconds, possibly fractional). The
//! downloader consumes them as a Netscape/Mozilla `cookies.txt` table.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Header lines written at the top of every cookie jar.
pub const NETSCAPE_HEADER: [&str; 3] = [
    "# Netscape HTTP Cookie File",
    "# This file was generated automatically.",
    "# Format: domain\tflag\tpath\tsecure\texpiration\tname\tvalue",
];

/// A single HTTP cookie forwarded to the downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(rename = "expirationDate", default)]
    pub expiration_date: f64,
}

fn default_path() -> String {
    "/".into()
}

impl Cookie {
    /// Create a session cookie with default path, no secure flag and no expiry.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            secure: false,
            expiration_date: 0.0,
        }
    }

    /// Check the invariants the cookie-jar format relies on.
    ///
    /// Name and domain must be non-empty, and no field may contain a tab or a
    /// line break since either would corrupt the table.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation("cookie name must not be empty".into()));
        }
        if self.domain.is_empty() {
            return Err(Error::Validation(format!(
                "cookie '{}' has an empty domain",
                self.name
            )));
        }
        for (field, text) in [
            ("name", &self.name),
            ("value", &self.value),
            ("domain", &self.domain),
            ("path", &self.path),
        ] {
            if text.contains(['\t', '\n', '\r']) {
                return Err(Error::Validation(format!(
                    "cookie '{}' {field} contains a tab or line break",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Whether the cookie applies to subdomains (domain starts with `.`).
    pub fn include_subdomains(&self) -> bool {
        self.domain.starts_with('.')
    }

    /// Expiration as whole epoch seconds (fractional part truncated).
    pub fn expires_at(&self) -> i64 {
        self.expiration_date as i64
    }

    /// Render the seven tab-separated cookie-jar fields, without a newline.
    pub fn netscape_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            netscape_bool(self.include_subdomains()),
            self.path,
            netscape_bool(self.secure),
            self.expires_at(),
            self.name,
            self.value,
        )
    }
}

fn netscape_bool(flag: bool) -> &'static str {
    if flag {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Write a complete Netscape cookie jar: header lines, then one line per cookie.
pub fn write_netscape<W: Write>(mut writer: W, cookies: &[Cookie]) -> io::Result<()> {
    for line in NETSCAPE_HEADER {
        writeln!(writer, "{line}")?;
    }
    for cookie in cookies {
        writeln!(writer, "{}", cookie.netscape_line())?;
    }
    writer.flush()
}

/// Render a cookie jar into a string.
pub fn to_netscape_string(cookies: &[Cookie]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_netscape(&mut buf, cookies);
    String::from_utf8_lossy(&buf).into_owned()
}
