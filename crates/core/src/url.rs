//! Public URL construction for stored objects.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters escaped inside a single path segment: everything except RFC 3986 unreserved.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const KEY_PLACEHOLDER: &str = "{key}";

/// Turns object keys into absolute URLs using a configurable template.
///
/// The template must contain `{key}`; if it does not, `/{key}` is appended.
/// Each `/`-separated segment of the key is percent-encoded on its own, so
/// the slashes of the key survive as path separators.
#[derive(Clone, Debug)]
pub struct PublicUrlBuilder {
    template: String,
}

impl PublicUrlBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains(KEY_PLACEHOLDER) {
            let trimmed = template.trim_end_matches('/').len();
            template.truncate(trimmed);
            template.push('/');
            template.push_str(KEY_PLACEHOLDER);
        }
        Self { template }
    }

    pub fn url_for(&self, key: &str) -> String {
        let encoded = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        self.template.replace(KEY_PLACEHOLDER, &encoded)
    }
}
