//! Object-storage key-space convention.
//!
//! Every image object lives under one of three prefixes that encode its
//! lifecycle stage:
//!
//! - Staging: `tmp/<domain>/<yyyy>/<mm>/<uuid>-<sanitized filename>`
//! - Promoted: the same relative path with `tmp/` replaced by `inline/`
//! - Trashed: the promoted path prefixed with `trash/`
//!
//! Derivatives of a promoted original are stored next to it in a directory
//! named after the original's file stem:
//! `<directory of original>/<stem of original>/<variant filename>`.
//! No rows are persisted for derivatives; this convention is the index.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

pub const STAGING_PREFIX: &str = "tmp/";
pub const INLINE_PREFIX: &str = "inline/";
pub const TRASH_PREFIX: &str = "trash/";

/// Maximum length of the sanitized filename component of a staging key.
const MAX_FILENAME_LEN: usize = 100;

/// Domain entity kinds that own images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetDomain {
    Artist,
    Group,
    Event,
    Review,
    User,
}

impl AssetDomain {
    pub const ALL: [AssetDomain; 5] = [
        AssetDomain::Artist,
        AssetDomain::Group,
        AssetDomain::Event,
        AssetDomain::Review,
        AssetDomain::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Group => "group",
            Self::Event => "event",
            Self::Review => "review",
            Self::User => "user",
        }
    }
}

impl FromStr for AssetDomain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::UnknownDomain(s.to_string()))
    }
}

impl fmt::Display for AssetDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `key` is a non-blank key under the staging prefix.
pub fn is_staging_key(key: &str) -> bool {
    key.len() > STAGING_PREFIX.len() && key.starts_with(STAGING_PREFIX)
}

/// Reduce a client-supplied filename to a safe key component.
pub fn sanitize_filename(name: &str) -> String {
    // Only the final path component of whatever the client sent.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut out: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let leading_dots = out.len() - out.trim_start_matches('.').len();
    out.drain(..leading_dots);
    out.truncate(MAX_FILENAME_LEN);
    if out.is_empty() {
        out.push_str("file");
    }
    out
}

/// Build a fresh staging key for an upload.
pub fn staging_key(domain: AssetDomain, at: OffsetDateTime, id: Uuid, filename: &str) -> String {
    format!(
        "{STAGING_PREFIX}{}/{:04}/{:02}/{}-{}",
        domain,
        at.year(),
        u8::from(at.month()),
        id,
        sanitize_filename(filename)
    )
}

/// Compute the promoted key by swapping the staging prefix for the inline prefix.
pub fn promoted_key(staging: &str) -> Result<String> {
    match staging.strip_prefix(STAGING_PREFIX) {
        Some(rest) if !rest.is_empty() => Ok(format!("{INLINE_PREFIX}{rest}")),
        _ => Err(Error::InvalidKey(format!(
            "not a staging key: '{staging}'"
        ))),
    }
}

/// Compute the trash location of a key. Already-trashed keys are returned unchanged.
pub fn trash_key(key: &str) -> String {
    if key.starts_with(TRASH_PREFIX) {
        key.to_string()
    } else {
        format!("{TRASH_PREFIX}{key}")
    }
}

/// Split a key into its directory (without trailing slash) and file name.
pub fn split_key(key: &str) -> (&str, &str) {
    key.rsplit_once('/').unwrap_or(("", key))
}

/// File name without its final extension.
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Directory prefix (with trailing slash) holding the derivatives of `original`.
pub fn derivative_prefix(original: &str) -> String {
    let (dir, name) = split_key(original);
    let stem = file_stem(name);
    if dir.is_empty() {
        format!("{stem}/")
    } else {
        format!("{dir}/{stem}/")
    }
}

/// Key of a single derivative of `original`.
pub fn derivative_key(original: &str, variant_filename: &str) -> String {
    format!("{}{}", derivative_prefix(original), variant_filename)
}
