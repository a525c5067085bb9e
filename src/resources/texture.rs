//! Image sources for texture resources

use crate::error::{RendererError, RendererResult};
use image::GenericImageView;

/// CPU-side pixel data handed to the resource factory
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Encoded bytes in any format the `image` crate can decode (PNG, JPEG, ...)
    Encoded(Vec<u8>),
    /// Tightly packed 8-bit RGBA texels
    Rgba8 {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    /// Tightly packed texels already in the destination texture format
    Raw {
        width: u32,
        height: u32,
        bytes: Vec<u8>,
    },
}

/// A decoded image ready to be copied into one texture layer
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
    /// True when the bytes are 8-bit RGBA rather than raw destination texels
    pub rgba8: bool,
}

impl ImageSource {
    /// Create a solid color image
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self::Rgba8 {
            width: 1,
            height: 1,
            pixels: color.to_vec(),
        }
    }

    /// Create a default white image
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255])
    }

    /// Create a flat tangent-space normal map texel
    pub fn default_normal() -> Self {
        Self::solid_color([128, 128, 255, 255])
    }

    /// Create a checkerboard image
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                pixels.extend_from_slice(if is_even { &color1 } else { &color2 });
            }
        }

        Self::Rgba8 {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Decode into tightly packed texels. `name` is the logical resource the
    /// image is destined for and only feeds error messages.
    pub fn decode(&self, name: &str) -> RendererResult<DecodedImage> {
        match self {
            ImageSource::Encoded(bytes) => {
                let img = image::load_from_memory(bytes).map_err(|e| RendererError::ImageDecode {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
                let (width, height) = img.dimensions();
                Ok(DecodedImage {
                    width,
                    height,
                    bytes: img.to_rgba8().into_raw(),
                    rgba8: true,
                })
            }
            ImageSource::Rgba8 {
                width,
                height,
                pixels,
            } => {
                let expected = (*width as usize) * (*height as usize) * 4;
                if pixels.len() != expected {
                    return Err(RendererError::ImageDecode {
                        name: name.to_string(),
                        message: format!("expected {} RGBA bytes, got {}", expected, pixels.len()),
                    });
                }
                Ok(DecodedImage {
                    width: *width,
                    height: *height,
                    bytes: pixels.clone(),
                    rgba8: true,
                })
            }
            ImageSource::Raw {
                width,
                height,
                bytes,
            } => Ok(DecodedImage {
                width: *width,
                height: *height,
                bytes: bytes.clone(),
                rgba8: false,
            }),
        }
    }
}
