//! Indicator-of-compromise normalization.
//!
//! Indicators arrive as raw strings from feeds and files. They are
//! canonicalized once at ingestion into a tagged [`Indicator`]; from then on
//! the protocol only sees [`Indicator::as_str`], an opaque hashable key. Two
//! parties that normalize the same observable the same way end up setting the
//! same Bloom-filter bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Indicator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("Unknown indicator type: {0}")]
    UnknownKind(String),

    #[error("Indicator is empty after normalization")]
    Empty,
}

/// Indicator types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Ip,
    Domain,
    Url,
    FileHash,
}

impl IndicatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Domain => "domain",
            Self::Url => "url",
            Self::FileHash => "hash",
        }
    }

    /// Guess the type of a raw value.
    ///
    /// Order matters: a 32/40/64-char hex string is a hash even though it
    /// would also pass as a domain label.
    pub fn detect(raw: &str) -> Self {
        let value = raw.trim();
        if is_hash_like(value) {
            Self::FileHash
        } else if is_dotted_quad(value) {
            Self::Ip
        } else if has_http_scheme(value) || value.contains('/') {
            Self::Url
        } else {
            Self::Domain
        }
    }

    /// Canonical form of `raw` for this type.
    pub fn normalize(&self, raw: &str) -> String {
        match self {
            Self::Ip => raw.trim().to_string(),
            Self::Domain => normalize_domain(raw),
            Self::Url => normalize_url(raw),
            Self::FileHash => raw
                .trim()
                .to_ascii_lowercase()
                .chars()
                .filter(|c| c.is_ascii_hexdigit())
                .collect(),
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorKind {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" | "ip_address" => Ok(Self::Ip),
            "domain" => Ok(Self::Domain),
            "url" => Ok(Self::Url),
            "hash" | "file_hash" => Ok(Self::FileHash),
            other => Err(IndicatorError::UnknownKind(other.to_string())),
        }
    }
}

/// A normalized indicator.
///
/// Equality and hashing use the normalized value and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Indicator {
    kind: IndicatorKind,
    value: String,
}

impl Indicator {
    /// Normalize `raw` as `kind`, or auto-detect the kind when `None`.
    pub fn parse(raw: &str, kind: Option<IndicatorKind>) -> Result<Self, IndicatorError> {
        let kind = kind.unwrap_or_else(|| IndicatorKind::detect(raw));
        let value = kind.normalize(raw);
        if value.is_empty() {
            return Err(IndicatorError::Empty);
        }
        Ok(Self { kind, value })
    }

    pub fn kind(&self) -> IndicatorKind {
        self.kind
    }

    /// Normalized key fed to the Bloom encoder.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Indicator {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

fn is_hash_like(value: &str) -> bool {
    matches!(value.len(), 32 | 40 | 64) && value.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_dotted_quad(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| (1..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_digit()))
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Split `value` into an alphabetic scheme (with `://`) and the remainder.
fn split_scheme(value: &str) -> Option<(&str, &str)> {
    let pos = value.find("://")?;
    let scheme = &value[..pos];
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((&value[..pos + 3], &value[pos + 3..]))
}

fn normalize_domain(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"))
        .unwrap_or(&lower);
    let host = without_scheme.split('/').next().unwrap_or(without_scheme);
    host.strip_suffix('.').unwrap_or(host).to_string()
}

fn normalize_url(raw: &str) -> String {
    let value = raw.trim();
    let (scheme, rest) = match split_scheme(value) {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("http://".to_string(), value),
    };

    // Host runs up to the first '/', the path is kept verbatim.
    let (host, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };
    if host.is_empty() {
        return format!("{}{}", scheme, rest).to_ascii_lowercase();
    }
    format!("{}{}{}", scheme, host.to_ascii_lowercase(), path)
}
