//! Clipboard image payloads.
//!
//! An image arrives either as a raw RGBA bitmap (read from the local
//! clipboard) or as a PNG data URL (received from a peer). The wire form is
//! PNG; comparisons work on decoded RGBA pixels.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use std::io::Cursor;

use crate::ImageError;

/// Prefix of a base64 PNG data URL.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A raw RGBA8 bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 pixel data (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Bitmap {
    /// Create a bitmap, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ImageError::DimensionMismatch {
                width,
                height,
                len: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Encode this bitmap as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .ok_or(ImageError::DimensionMismatch {
                width: self.width,
                height: self.height,
                len: self.rgba.len(),
            })?;
        let mut png = Vec::new();
        buffer.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
        Ok(png)
    }

    /// Decode a PNG into a bitmap.
    pub fn decode_png(png: &[u8]) -> Result<Self, ImageError> {
        let decoded = image::load_from_memory_with_format(png, image::ImageFormat::Png)?;
        let rgba = decoded.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgba", &format!("[{} bytes]", self.rgba.len()))
            .finish()
    }
}

/// An image as carried by a [`crate::ClipboardMessage::Image`].
#[derive(Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Raw bitmap read from the clipboard.
    Bitmap(Bitmap),
    /// Encoded PNG data URL (`data:image/png;base64,...`).
    Encoded(String),
}

impl ImagePayload {
    /// True if there is no image (zero-sized bitmap or empty data URL).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bitmap(bitmap) => bitmap.rgba.is_empty() || bitmap.width == 0 || bitmap.height == 0,
            Self::Encoded(url) => url.is_empty(),
        }
    }

    /// The raw buffer used for sampled comparison.
    ///
    /// Bitmaps expose their pixel data, encoded images their data URL.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            Self::Bitmap(bitmap) => &bitmap.rgba,
            Self::Encoded(url) => url.as_bytes(),
        }
    }

    /// The portable wire form: a PNG data URL.
    ///
    /// Already-encoded payloads are passed through untouched.
    pub fn to_data_url(&self) -> Result<String, ImageError> {
        match self {
            Self::Bitmap(bitmap) => {
                let png = bitmap.encode_png()?;
                Ok(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png)))
            }
            Self::Encoded(url) => Ok(url.clone()),
        }
    }

    /// Decode into a bitmap suitable for writing to the clipboard.
    pub fn to_bitmap(&self) -> Result<Bitmap, ImageError> {
        match self {
            Self::Bitmap(bitmap) => Ok(bitmap.clone()),
            Self::Encoded(url) => Bitmap::decode_png(&decode_data_url(url)?),
        }
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitmap(bitmap) => f.debug_tuple("Bitmap").field(bitmap).finish(),
            Self::Encoded(url) => f
                .debug_tuple("Encoded")
                .field(&format!("[{} chars]", url.len()))
                .finish(),
        }
    }
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, ImageError> {
    let data = url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or(ImageError::NotPngDataUrl)?;
    Ok(STANDARD.decode(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> Bitmap {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for i in 0..width * height {
            let v = if i % 2 == 0 { 0xFF } else { 0x00 };
            rgba.extend_from_slice(&[v, v, v, 0xFF]);
        }
        Bitmap::new(width, height, rgba).unwrap()
    }

    #[test]
    fn bitmap_rejects_wrong_buffer_length() {
        let result = Bitmap::new(2, 2, vec![0u8; 15]);
        assert!(matches!(
            result,
            Err(ImageError::DimensionMismatch { len: 15, .. })
        ));
    }

    #[test]
    fn data_url_has_png_prefix_and_decodes_back() {
        let bitmap = checker(3, 2);
        let url = ImagePayload::Bitmap(bitmap.clone()).to_data_url().unwrap();
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));

        let decoded = ImagePayload::Encoded(url).to_bitmap().unwrap();
        assert_eq!(decoded, bitmap);
    }

    #[test]
    fn encoded_payload_passes_through() {
        let url = format!("{}AAAA", PNG_DATA_URL_PREFIX);
        let payload = ImagePayload::Encoded(url.clone());
        assert_eq!(payload.to_data_url().unwrap(), url);
    }

    #[test]
    fn non_png_data_url_is_rejected() {
        let payload = ImagePayload::Encoded("data:image/jpeg;base64,AAAA".into());
        assert!(matches!(payload.to_bitmap(), Err(ImageError::NotPngDataUrl)));
    }

    #[test]
    fn empty_payloads() {
        assert!(ImagePayload::Encoded(String::new()).is_empty());
        assert!(ImagePayload::Bitmap(Bitmap::new(0, 0, vec![]).unwrap()).is_empty());
        assert!(!ImagePayload::Bitmap(checker(1, 1)).is_empty());
    }

    #[test]
    fn debug_does_not_dump_pixels() {
        let debug = format!("{:?}", ImagePayload::Bitmap(checker(4, 4)));
        assert!(debug.contains("[64 bytes]"), "got: {}", debug);
    }
}
