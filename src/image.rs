//! Decoded images and the decoder seam used by icon resolution.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use iced::widget::image as iced_image;

use crate::error::{Result, TrayError};

/// A decoded RGBA8 image.
///
/// Pixel data is shared, so cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Largest pixel count accepted for a single image.
pub const MAX_PIXELS: usize = 1024 * 1024;

/// Byte length of a `width` x `height` image with 4 bytes per pixel, or
/// `None` when it is empty or larger than [`MAX_PIXELS`].
pub fn byte_len(width: u32, height: u32) -> Option<usize> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    if pixels == 0 || pixels > MAX_PIXELS {
        return None;
    }
    pixels.checked_mul(4)
}

impl Image {
    /// Wrap RGBA8 data. Returns `None` when the size is out of range or
    /// `pixels` is too short for it. Extra bytes are dropped.
    pub fn from_rgba(width: u32, height: u32, mut pixels: Vec<u8>) -> Option<Self> {
        let len = byte_len(width, height)?;
        if pixels.len() < len {
            return None;
        }
        pixels.truncate(len);
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Convert ARGB32 data in network byte order (as sent by SNI items).
    pub fn from_argb32(width: u32, height: u32, argb: &[u8]) -> Option<Self> {
        let len = byte_len(width, height)?;
        let argb = argb.get(..len)?;
        Self::from_rgba(width, height, argb32_to_rgba(argb))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Handle for iced's image widget.
    pub fn to_handle(&self) -> iced_image::Handle {
        iced_image::Handle::from_rgba(self.width, self.height, self.pixels.to_vec())
    }
}

/// Decodes image files. Failures are expected and reported as
/// [`TrayError::Decode`].
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<Image>;
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<Image> {
        let decoded = ::image::open(path).map_err(|e| TrayError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Image::from_rgba(width, height, rgba.into_raw()).ok_or_else(|| TrayError::Decode {
            path: path.to_path_buf(),
            reason: format!("{width}x{height} exceeds {MAX_PIXELS} pixels"),
        })
    }
}

/// Convert ARGB32 (big-endian/network byte order) to RGBA.
///
/// SNI icons use `[A, R, G, B]`; iced expects `[R, G, B, A]`.
fn argb32_to_rgba(argb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(argb.len());
    for chunk in argb.chunks_exact(4) {
        rgba.extend_from_slice(&[chunk[1], chunk[2], chunk[3], chunk[0]]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_is_reordered_to_rgba() {
        let image = Image::from_argb32(1, 1, &[0x80, 0x10, 0x20, 0x30]).unwrap();
        assert_eq!(image.pixels(), &[0x10, 0x20, 0x30, 0x80]);
    }

    #[test]
    fn pixmaps_must_match_their_declared_size() {
        assert!(Image::from_argb32(2, 2, &[0xff; 4]).is_none());
        assert!(Image::from_argb32(0, 2, &[]).is_none());
        assert!(Image::from_argb32(2_000_000, 2_000_000, &[0xff; 16]).is_none());
        assert!(Image::from_argb32(u32::MAX, u32::MAX, &[0xff; 16]).is_none());
        assert!(Image::from_rgba(2_000_000, 2_000_000, vec![0; 16]).is_none());

        let image = Image::from_argb32(1, 1, &[0xff; 8]).unwrap();
        assert_eq!(image.pixels().len(), 4);
        assert_eq!(byte_len(1024, 1024), Some(MAX_PIXELS * 4));
        assert_eq!(byte_len(1025, 1024), None);
    }

    #[test]
    fn file_decoder_reads_png_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("dot.png");
        ::image::RgbaImage::from_pixel(3, 2, ::image::Rgba([1, 2, 3, 4]))
            .save(&good)
            .unwrap();
        let decoded = FileDecoder.decode(&good).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(&decoded.pixels()[..4], &[1, 2, 3, 4]);

        let bad = dir.path().join("broken.png");
        std::fs::write(&bad, b"not a png").unwrap();
        assert!(matches!(
            FileDecoder.decode(&bad),
            Err(TrayError::Decode { .. })
        ));
        assert!(FileDecoder.decode(&dir.path().join("missing.png")).is_err());
    }
}
