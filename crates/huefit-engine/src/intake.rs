use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use huefit_contracts::images::{mime_for_extension, sniff_mime, EncodedImage};

/// Reads a user-selected file into an `EncodedImage`. Only JPEG and PNG are
/// accepted; missing, empty, or unrecognized files are rejected upward
/// without touching session state. When the extension and the magic bytes
/// disagree, the bytes win.
pub fn load_image(path: &Path) -> Result<EncodedImage> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }

    let sniffed = sniff_mime(&bytes);
    let from_extension = path
        .extension()
        .and_then(|value| value.to_str())
        .and_then(mime_for_extension);
    let Some(mime_type) = sniffed.or(from_extension) else {
        bail!("{} is not a JPEG or PNG image", path.display());
    };

    let source_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("image")
        .to_string();
    Ok(EncodedImage::from_bytes(&bytes, mime_type, source_name))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn loads_png_and_round_trips_bytes() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("portrait.png");
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        fs::write(&path, &bytes)?;

        let image = load_image(&path)?;
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.source_name, "portrait.png");
        assert_eq!(image.decode()?, bytes);
        Ok(())
    }

    #[test]
    fn magic_bytes_override_a_lying_extension() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("actually-jpeg.png");
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])?;
        assert_eq!(load_image(&path)?.mime_type, "image/jpeg");
        Ok(())
    }

    #[test]
    fn rejects_zero_byte_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("empty.jpg");
        fs::write(&path, [])?;
        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
        Ok(())
    }

    #[test]
    fn rejects_missing_and_unsupported_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(load_image(&temp.path().join("nope.jpg")).is_err());

        let path = temp.path().join("anim.gif");
        fs::write(&path, b"GIF89a trailing")?;
        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("not a JPEG or PNG"));
        Ok(())
    }
}
