//! Filesystem-safe filenames and recovery of mis-encoded attachment names.
//!
//! Korean agency servers are wildly inconsistent about how they encode
//! filenames in `Content-Disposition`: some use RFC 5987, some send raw
//! EUC-KR bytes, some percent-encode UTF-8 into the plain `filename`
//! parameter. Recovery is best-effort and must never abort a download.

use encoding_rs::{EUC_KR, Encoding, UTF_8};
use percent_encoding::percent_decode;

/// Maximum length of a sanitized filename, in characters.
pub const MAX_FILENAME_LEN: usize = 200;

const FALLBACK_NAME: &str = "unnamed_file";

/// Characters rejected by at least one common filesystem.
fn is_illegal(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

/// Sanitize with the default length limit.
pub fn sanitize_filename(name: &str) -> String {
    sanitize_with_limit(name, MAX_FILENAME_LEN)
}

/// Turn an arbitrary string into a safe filename of at most `max_len`
/// characters, preserving the extension when one is present. Never returns
/// an empty string.
pub fn sanitize_with_limit(name: &str, max_len: usize) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if is_illegal(c) { '_' } else { c })
        .collect();

    // Collapse runs of whitespace, underscores and dots left behind by the
    // replacement pass.
    let mut cleaned = String::with_capacity(replaced.len());
    let mut last: Option<char> = None;
    for c in replaced.split_whitespace().collect::<Vec<_>>().join(" ").chars() {
        let repeated = matches!((last, c), (Some('_'), '_') | (Some('.'), '.'));
        if !repeated {
            cleaned.push(c);
        }
        last = Some(c);
    }

    let trimmed = cleaned.trim_matches(|c: char| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    truncate_keeping_extension(trimmed, max_len)
}

fn truncate_keeping_extension(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        // Only treat short suffixes as extensions; "회사소개.2024년도" is not one.
        Some((stem, ext)) if !stem.is_empty() && ext.chars().count() <= 8 => (stem, Some(ext)),
        _ => (name, None),
    };

    match ext {
        Some(ext) => {
            let keep = max_len.saturating_sub(ext.chars().count() + 1).max(1);
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{}", stem.trim_end_matches(['.', ' ']), ext)
        }
        None => name.chars().take(max_len).collect(),
    }
}

/// Parse a `Content-Disposition` header value into a display filename.
///
/// Attempt order:
/// 1. `filename*=<charset>''<pct-encoded>` (RFC 5987), decoded with the
///    declared charset.
/// 2. plain `filename=`, re-decoding the raw bytes as UTF-8 then EUC-KR
///    (the windows-949 superset, which also covers CP949), taking the first
///    decode without replacement characters. Percent-encoded values are
///    unescaped first.
///
/// Works on raw header bytes because mojibake names are, by definition, not
/// valid UTF-8.
pub fn filename_from_content_disposition(value: &[u8]) -> Option<String> {
    let mut plain: Option<&[u8]> = None;

    for part in value.split(|&b| b == b';') {
        let part = trim_ascii(part);
        if let Some(rest) = strip_prefix_ignore_case(part, b"filename*=") {
            if let Some(name) = decode_rfc5987(rest) {
                return Some(name);
            }
        } else if let Some(rest) = strip_prefix_ignore_case(part, b"filename=") {
            plain = Some(strip_quotes(rest));
        }
    }

    let raw = plain?;
    let unescaped = if raw.contains(&b'%') {
        percent_decode(raw).collect::<Vec<u8>>()
    } else {
        raw.to_vec()
    };
    decode_candidates(&unescaped)
}

/// `<charset>'<lang>'<pct-encoded>`
fn decode_rfc5987(raw: &[u8]) -> Option<String> {
    let raw = strip_quotes(raw);
    let mut fields = raw.splitn(3, |&b| b == b'\'');
    let charset = fields.next()?;
    let _lang = fields.next()?;
    let encoded = fields.next()?;

    let bytes = percent_decode(encoded).collect::<Vec<u8>>();
    let encoding = Encoding::for_label(charset).unwrap_or(UTF_8);
    let (decoded, _, had_errors) = encoding.decode(&bytes);
    let decoded = decoded.trim();
    (!had_errors && !decoded.is_empty()).then(|| decoded.to_string())
}

/// Ordered decode attempts over legacy Korean web encodings. EUC_KR in
/// encoding_rs is windows-949, so the CP949 extension set is covered.
fn decode_candidates(bytes: &[u8]) -> Option<String> {
    const CANDIDATES: [&Encoding; 2] = [UTF_8, EUC_KR];

    for encoding in CANDIDATES {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        let decoded = decoded.trim();
        if !had_errors && !decoded.is_empty() && !decoded.contains('\u{FFFD}') {
            return Some(decoded.to_string());
        }
    }

    // Total failure: hand back whatever we have rather than nothing.
    let garbled = String::from_utf8_lossy(bytes).trim().to_string();
    (!garbled.is_empty()).then_some(garbled)
}

/// Resolve the authoritative filename for a downloaded attachment, falling
/// back to the basename of `default_path` when the header is missing or
/// unusable.
pub fn filename_from_response(response: &reqwest::Response, default_path: &str) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| filename_from_content_disposition(v.as_bytes()))
        .unwrap_or_else(|| basename(default_path).to_string())
}

pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .split(['?', '#'])
        .next()
        .unwrap_or("");
    if name.is_empty() { FALLBACK_NAME } else { name }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(s), Some(e)) => &bytes[s..=e],
        _ => &[],
    }
}

fn strip_prefix_ignore_case<'a>(bytes: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&bytes[prefix.len()..])
    } else {
        None
    }
}

fn strip_quotes(bytes: &[u8]) -> &[u8] {
    if bytes.len() >= 2 && bytes.first() == Some(&b'"') && bytes.last() == Some(&b'"') {
        &bytes[1..bytes.len() - 1]
    } else {
        bytes
    }
}
