//! Thumbnail formats and RGB565 rendering

use crate::codec::Endian;
use crate::error::Result;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use lofty::file::TaggedFileExt;
use lofty::picture::PictureType;
use lofty::probe::Probe;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One on-device thumbnail format: a fixed-size RGB565 bitmap stored in
/// `F<id>_1.ithmb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailFormat {
    pub format_id: u32,
    pub width: u16,
    pub height: u16,
}

impl ThumbnailFormat {
    pub const fn new(format_id: u32, width: u16, height: u16) -> Self {
        Self {
            format_id,
            width,
            height,
        }
    }

    /// Bytes per thumbnail: two per pixel
    pub fn byte_size(&self) -> u32 {
        self.width as u32 * self.height as u32 * 2
    }

    pub fn file_name(&self) -> String {
        format!("F{}_1.ithmb", self.format_id)
    }
}

/// Pixels for one format plus the placement recorded in the image name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedThumbnail {
    pub data: Vec<u8>,
    /// Size of the scaled picture inside the padded bitmap
    pub width: u16,
    pub height: u16,
    pub horizontal_padding: i16,
    pub vertical_padding: i16,
}

/// Decode `source` and render it for `format`, scaled to fit and centred on
/// a black background
pub fn render(source: &DynamicImage, format: &ThumbnailFormat, endian: Endian) -> RenderedThumbnail {
    let (frame_w, frame_h) = (format.width as u32, format.height as u32);
    let scaled = source.resize(frame_w, frame_h, FilterType::Lanczos3);
    let (w, h) = scaled.dimensions();
    let left = (frame_w - w.min(frame_w)) / 2;
    let top = (frame_h - h.min(frame_h)) / 2;
    let rgb = scaled.to_rgb8();

    let mut data = Vec::with_capacity(format.byte_size() as usize);
    for y in 0..frame_h {
        for x in 0..frame_w {
            let pixel = if x >= left && x < left + w && y >= top && y < top + h {
                let p = rgb.get_pixel(x - left, y - top);
                rgb565(p[0], p[1], p[2])
            } else {
                0
            };
            match endian {
                Endian::Little => data.extend_from_slice(&pixel.to_le_bytes()),
                Endian::Big => data.extend_from_slice(&pixel.to_be_bytes()),
            }
        }
    }

    RenderedThumbnail {
        data,
        width: w as u16,
        height: h as u16,
        horizontal_padding: left as i16,
        vertical_padding: top as i16,
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Embedded cover art of an audio file, front cover preferred
pub fn extract_embedded_artwork(path: &Path) -> Result<Option<Vec<u8>>> {
    let tagged_file = Probe::open(path)?.read()?;

    for tag in tagged_file.tags() {
        if let Some(picture) = tag
            .pictures()
            .iter()
            .find(|p| p.pic_type() == PictureType::CoverFront)
            .or_else(|| tag.pictures().first())
        {
            return Ok(Some(picture.data().to_vec()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_byte_size() {
        assert_eq!(ThumbnailFormat::new(1028, 100, 100).byte_size(), 20000);
        assert_eq!(ThumbnailFormat::new(1028, 100, 100).file_name(), "F1028_1.ithmb");
    }

    #[test]
    fn test_rgb565_packing() {
        assert_eq!(rgb565(255, 255, 255), 0xffff);
        assert_eq!(rgb565(255, 0, 0), 0xf800);
        assert_eq!(rgb565(0, 255, 0), 0x07e0);
        assert_eq!(rgb565(0, 0, 255), 0x001f);
    }

    #[test]
    fn test_render_pads_wide_image() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 0, 0])));
        let format = ThumbnailFormat::new(1, 10, 10);
        let thumb = render(&source, &format, Endian::Little);

        assert_eq!(thumb.data.len(), 200);
        assert_eq!((thumb.width, thumb.height), (10, 5));
        assert_eq!(thumb.vertical_padding, 2);
        assert_eq!(thumb.horizontal_padding, 0);
        // first row is padding, third row is picture
        assert_eq!(&thumb.data[0..2], &[0, 0]);
        assert_eq!(&thumb.data[40..42], &0xf800u16.to_le_bytes());
    }

    #[test]
    fn test_render_byte_order() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])));
        let format = ThumbnailFormat::new(1, 4, 4);
        let thumb = render(&source, &format, Endian::Big);
        assert_eq!(&thumb.data[0..2], &[0x00, 0x1f]);
    }
}
