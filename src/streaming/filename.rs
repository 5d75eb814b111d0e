//! Output filename recovery from `Content-Disposition`.

use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use uuid::Uuid;

/// Reads a filename from the response headers, if the server suggested one.
pub fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    filename_from_content_disposition(value)
}

/// Parses a `Content-Disposition` value.
///
/// `filename*=UTF-8''...` wins over `filename="..."` when both are present.
/// The result is reduced to its final path component.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    let mut extended: Option<String> = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = raw.trim();

        match key.as_str() {
            "filename*" => extended = decode_extended(raw),
            "filename" => plain = Some(raw.trim_matches('"').to_string()),
            _ => {}
        }
    }

    extended
        .and_then(|name| sanitize_filename(&name))
        .or_else(|| plain.and_then(|name| sanitize_filename(&name)))
}

/// Builds `output-<uuid>.<extension>` for responses without a suggested name.
pub fn synthesize_filename(extension: &str) -> String {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        format!("output-{}", Uuid::new_v4())
    } else {
        format!("output-{}.{}", Uuid::new_v4(), extension)
    }
}

/// Keeps only the final path component so a server-supplied name cannot
/// point outside the output directory.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Decodes an RFC 5987 `charset'language'value`.
fn decode_extended(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }

    String::from_utf8(percent_decode(encoded.as_bytes())?).ok()
}

fn percent_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    Some(out)
}
