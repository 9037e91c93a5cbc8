//! Preview, edit, and image gating.
//!
//! Extension allowlists plus hard size caps. The dispatch layer stats the
//! entry first and asks here before streaming anything back.

use crate::error::{ErrorKind, Result};

/// Previews refuse anything past 200 KiB.
pub const PREVIEW_MAX_BYTES: u64 = 200 * 1024;
/// The editor refuses anything past 1 MiB.
pub const EDIT_MAX_BYTES: u64 = 1024 * 1024;

/// Text-like extensions servable as previews and editable in place.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "json", "js", "mjs", "ts", "tsx", "jsx", "css", "scss", "html",
    "htm", "xml", "svg", "yaml", "yml", "toml", "ini", "conf", "env", "csv", "tsv", "log", "sh",
    "bash", "py", "rb", "rs", "go", "c", "h", "cpp", "hpp", "java", "sql", "php", "pl",
];

/// Extensions served through the image endpoint.
const IMAGE_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "webp", "bmp", "ico", "avif", "svg"];

fn extension_of(path: &str) -> Option<String> {
    let leaf = path.rsplit('/').next()?;
    let (stem, extension) = leaf.rsplit_once('.')?;
    if stem.is_empty() {
        // Dotfiles like `.env` have no stem; treat the whole tail as the
        // extension so they stay previewable.
        return Some(leaf.trim_start_matches('.').to_lowercase());
    }
    Some(extension.to_lowercase())
}

fn is_text(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_image(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Gate a text preview: extension first, then the size cap.
pub fn check_preview(path: &str, size: u64) -> Result<()> {
    if !is_text(path) {
        exn::bail!(ErrorKind::InvalidRequest(format!(
            "not previewable: {path}"
        )));
    }
    if size > PREVIEW_MAX_BYTES {
        exn::bail!(ErrorKind::PayloadTooLarge(PREVIEW_MAX_BYTES));
    }
    Ok(())
}

/// Gate an in-place edit: same extensions, a larger cap.
pub fn check_edit(path: &str, size: u64) -> Result<()> {
    if !is_text(path) {
        exn::bail!(ErrorKind::InvalidRequest(format!("not editable: {path}")));
    }
    if size > EDIT_MAX_BYTES {
        exn::bail!(ErrorKind::PayloadTooLarge(EDIT_MAX_BYTES));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_gates_on_extension_and_size() {
        assert!(check_preview("/docs/readme.md", 1024).is_ok());
        assert!(check_preview("/docs/README.MD", 1024).is_ok());
        assert!(check_preview("/bin/app.exe", 10).is_err());
        assert!(check_preview("/noextension", 10).is_err());

        assert!(check_preview("/big.txt", PREVIEW_MAX_BYTES).is_ok());
        let err = check_preview("/big.txt", PREVIEW_MAX_BYTES + 1).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PayloadTooLarge(_)));
    }

    #[test]
    fn edit_allows_up_to_one_mebibyte() {
        assert!(check_edit("/notes.txt", EDIT_MAX_BYTES).is_ok());
        let err = check_edit("/notes.txt", EDIT_MAX_BYTES + 1).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PayloadTooLarge(_)));
    }

    #[test]
    fn image_extensions_are_their_own_gate() {
        assert!(is_image("/photos/cat.JPG"));
        assert!(is_image("/icon.svg"));
        assert!(!is_image("/notes.txt"));
        assert!(!is_image("/archive"));
    }

    #[test]
    fn dotfiles_count_their_tail_as_the_extension() {
        assert!(check_preview("/.env", 10).is_ok());
    }
}
