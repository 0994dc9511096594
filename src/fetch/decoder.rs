//! Decoder Module
//!
//! Decoder collaborator: raw bytes to a decoded asset, plus the size
//! function the memory tier accounts with.

use image::DynamicImage;

use crate::error::FetchError;

// == Decoder Trait ==
/// Capability the caches are generic over.
pub trait Decoder: Send + Sync + 'static {
    type Asset: Send + Sync + 'static;

    /// Decodes `bytes`. `target_size` is the side of the square the asset
    /// is displayed in; `None` keeps the natural size.
    fn decode(&self, bytes: &[u8], target_size: Option<u32>) -> Result<Self::Asset, FetchError>;

    /// Bytes the decoded asset occupies in memory.
    fn size_of(&self, asset: &Self::Asset) -> usize;
}

// == Image Decoder ==
/// Decodes any format the `image` crate recognizes and downsizes it to fit
/// the target square, preserving aspect ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    type Asset = DynamicImage;

    fn decode(&self, bytes: &[u8], target_size: Option<u32>) -> Result<DynamicImage, FetchError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        match target_size {
            Some(side) if side > 0 && (image.width() > side || image.height() > side) => {
                Ok(image.thumbnail(side, side))
            }
            _ => Ok(image),
        }
    }

    fn size_of(&self, asset: &DynamicImage) -> usize {
        asset.as_bytes().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_natural_size() {
        let decoded = ImageDecoder.decode(&png(8, 4), None).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
        assert_eq!(ImageDecoder.size_of(&decoded), 8 * 4 * 4);
    }

    #[test]
    fn test_decode_fits_target_square() {
        let decoded = ImageDecoder.decode(&png(64, 32), Some(16)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let decoded = ImageDecoder.decode(&png(4, 4), Some(16)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn test_corrupt_bytes_are_decode_error() {
        let result = ImageDecoder.decode(b"definitely not an image", None);
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }
}
