//! Download naming and `Content-Disposition` rendering.

use crate::streamer::ArchiveFormat;
use time::OffsetDateTime;
use time::macros::format_description;

/// Suggested filename for a download of the given entries.
///
/// A single entry is named after its basename; anything else becomes a
/// timestamped bundle.
pub fn download_name(paths: &[String], format: ArchiveFormat) -> String {
    let extension = format.extension();
    if let [only] = paths {
        let base = only.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        if !base.is_empty() {
            return format!("{base}.{extension}");
        }
    }
    let stamp = OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        // unwrap is safe: the description is static and the UTC offset always formats
        .unwrap();
    format!("bundle-{stamp}.{extension}")
}

/// `Content-Disposition` value carrying both an ASCII fallback and the
/// RFC 5987 UTF-8 form, so non-ASCII names survive every client.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
