//! Rectified rasters

use coastcam_common::config::OutputFormat;
use image::{DynamicImage, ImageFormat, ImageResult};
use std::io::Cursor;

/// An image on the target grid
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: DynamicImage,
}

impl Raster {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Decode any format the `image` crate recognizes
    pub fn decode(bytes: &[u8]) -> ImageResult<Self> {
        image::load_from_memory(bytes).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Mirror rows so row 0 becomes the last row
    pub fn flipped_vertically(&self) -> Self {
        Self::new(self.image.flipv())
    }

    /// Encode for persistence; JPEG drops any alpha channel
    pub fn encode(&self, format: OutputFormat) -> ImageResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        match format {
            OutputFormat::Jpg => {
                DynamicImage::ImageRgb8(self.image.to_rgb8())
                    .write_to(&mut buffer, ImageFormat::Jpeg)?;
            }
            OutputFormat::Png => {
                self.image.write_to(&mut buffer, ImageFormat::Png)?;
            }
        }
        Ok(buffer.into_inner())
    }
}
