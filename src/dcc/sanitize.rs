//! Filename sanitization for incoming offers.
//!
//! An offered filename comes straight from a remote user and must never be
//! used as a path as is.

use crate::util::truncate_utf8_safe;

/// Longest filename produced, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Reduce an offered filename to a safe single path component.
///
/// ```
/// use slirc_client::dcc::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename("C:\\Users\\me\\holiday photo.jpg"), "holiday_photo.jpg");
/// assert_eq!(sanitize_filename(".."), "_");
/// assert_eq!(sanitize_filename(""), "file");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut clean: String = last.chars().filter(|&c| c != '\0').collect();
    clean = clean.replace("..", "_");
    clean = clean.replace(['/', '\\', ' '], "_");

    if clean.is_empty() || clean == "." {
        return "file".to_owned();
    }
    if clean.len() <= MAX_FILENAME_LEN {
        return clean;
    }

    match clean.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < clean.len() && clean.len() - dot - 1 < MAX_FILENAME_LEN => {
            let ext = &clean[dot + 1..];
            let base = truncate_utf8_safe(&clean[..dot], MAX_FILENAME_LEN - ext.len() - 1);
            format!("{base}.{ext}")
        }
        _ => truncate_utf8_safe(&clean, MAX_FILENAME_LEN).to_owned(),
    }
}
