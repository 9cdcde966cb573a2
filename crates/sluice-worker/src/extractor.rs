//! Identifier extraction from inbound request files
//!
//! The first line is a header and is always discarded. Every other non-blank
//! line contributes its first comma-separated field, in file order.

use std::borrow::Cow;

use tracing::warn;

/// Extract identifiers from the lines of an inbound file
pub fn extract_identifiers<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once(',') {
            Some((identifier, _)) => identifier.to_string(),
            None => line.to_string(),
        })
        .collect()
}

/// Extract identifiers from raw file contents
///
/// Invalid UTF-8 is replaced with U+FFFD and reported; `\r\n` line endings are accepted.
pub fn extract_from_bytes(contents: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(contents);
    if let Cow::Owned(_) = text {
        warn!("Inbound file is not valid UTF-8, invalid bytes were replaced");
    }
    extract_identifiers(text.lines())
}
