//! Uncompressed TGA and PNG files for simple pixel formats.
//!
//! These are easier to preview than DDS but only support a few formats.
//! Rows are read using the row pitch from the capture, which may include padding.
use std::{io::Cursor, path::Path};

use binrw::{BinWrite, binrw};
use image::{
    ExtendedColorType, ImageEncoder,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};

use crate::error::SaveImageError;

/// The 18 byte header for an uncompressed true color TGA.
#[binrw]
#[derive(Debug, PartialEq, Eq, Clone)]
#[brw(little)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    /// `2` for uncompressed true color.
    pub image_type: u8,
    pub color_map: [u8; 5],
    pub x_origin: u16,
    pub y_origin: u16,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u8,
    /// `0x20` for rows stored top to bottom.
    pub descriptor: u8,
}

impl TgaHeader {
    pub fn bgra8(width: u16, height: u16) -> Self {
        Self {
            id_length: 0,
            color_map_type: 0,
            image_type: 2,
            color_map: [0; 5],
            x_origin: 0,
            y_origin: 0,
            width,
            height,
            bits_per_pixel: 32,
            descriptor: 0x20,
        }
    }
}

/// Encode 4 byte pixels as a 32-bit TGA.
///
/// `R8G8B8A8` formats are converted to BGRA.
/// Other formats are assumed to already be BGRA.
pub fn encode_tga(
    data: &[u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: &str,
) -> Result<Vec<u8>, SaveImageError> {
    let (tga_width, tga_height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(SaveImageError::InvalidDimensions { width, height }),
    };

    let mut writer = Cursor::new(Vec::new());
    TgaHeader::bgra8(tga_width, tga_height).write(&mut writer)?;
    let mut bytes = writer.into_inner();

    let swap_red_blue = format.contains("R8G8B8A8");
    for y in 0..height as usize {
        let mut row = padded_row(data, y * row_pitch, width as usize * 4);
        if swap_red_blue {
            for pixel in row.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }
        bytes.extend_from_slice(&row);
    }
    Ok(bytes)
}

pub fn save_tga<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: &str,
) -> Result<(), SaveImageError> {
    let bytes = encode_tga(data, width, height, row_pitch, format)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// The conversion from the capture format to a PNG color type.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PngLayout {
    Rgba8,
    Bgra8,
    Rgb8,
    Luma8,
    /// 16-bit unsigned channels truncated to 8-bit.
    Rgba16,
    /// Float channels clamped to 8-bit.
    Rgba32Float,
}

impl PngLayout {
    /// Select a layout by checking for channel tokens in `format` in a fixed order.
    pub fn from_format(format: &str) -> Option<Self> {
        if format.contains("R8G8B8A8") {
            Some(Self::Rgba8)
        } else if format.contains("B8G8R8A8") {
            Some(Self::Bgra8)
        } else if format.contains("R8G8B8") && !format.contains("A8") {
            Some(Self::Rgb8)
        } else if format.contains("R8") || format.contains("A8") || format.contains("L8") {
            Some(Self::Luma8)
        } else if format.contains("R16G16B16A16") {
            Some(Self::Rgba16)
        } else if format.contains("R32G32B32A32") && format.contains("FLOAT") {
            Some(Self::Rgba32Float)
        } else {
            None
        }
    }

    /// The size of a pixel in the capture data.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Rgb8 => 3,
            Self::Luma8 => 1,
            Self::Rgba16 => 8,
            Self::Rgba32Float => 16,
        }
    }

    fn color_type(&self) -> ExtendedColorType {
        match self {
            Self::Rgb8 => ExtendedColorType::Rgb8,
            Self::Luma8 => ExtendedColorType::L8,
            Self::Rgba8 | Self::Bgra8 | Self::Rgba16 | Self::Rgba32Float => {
                ExtendedColorType::Rgba8
            }
        }
    }

    fn convert_row(&self, row: &[u8]) -> Vec<u8> {
        match self {
            Self::Rgba8 | Self::Rgb8 | Self::Luma8 => row.to_vec(),
            Self::Bgra8 => row
                .chunks_exact(4)
                .flat_map(|p| [p[2], p[1], p[0], p[3]])
                .collect(),
            // Keep the high byte of each little endian channel.
            Self::Rgba16 => row.chunks_exact(2).map(|c| c[1]).collect(),
            Self::Rgba32Float => row
                .chunks_exact(4)
                .map(|c| {
                    let value = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                    (value * 255.0).clamp(0.0, 255.0) as u8
                })
                .collect(),
        }
    }
}

/// Convert the rows in `data` to tightly packed 8-bit channels for `layout`.
/// Missing bytes are filled with zeros.
pub fn png_pixels(
    data: &[u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    layout: PngLayout,
) -> Vec<u8> {
    let row_size = width as usize * layout.bytes_per_pixel();
    (0..height as usize)
        .flat_map(|y| layout.convert_row(&padded_row(data, y * row_pitch, row_size)))
        .collect()
}

pub fn encode_png(
    data: &[u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: &str,
) -> Result<Vec<u8>, SaveImageError> {
    let layout = PngLayout::from_format(format)
        .ok_or_else(|| SaveImageError::UnsupportedFormat(format.to_string()))?;
    if width == 0 || height == 0 {
        return Err(SaveImageError::InvalidDimensions { width, height });
    }

    let pixels = png_pixels(data, width, height, row_pitch, layout);

    let mut bytes = Vec::new();
    PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::NoFilter)
        .write_image(&pixels, width, height, layout.color_type())?;
    Ok(bytes)
}

pub fn save_png<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: &str,
) -> Result<(), SaveImageError> {
    let bytes = encode_png(data, width, height, row_pitch, format)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn padded_row(data: &[u8], start: usize, size: usize) -> Vec<u8> {
    let mut row = vec![0u8; size];
    if start < data.len() {
        let end = (start + size).min(data.len());
        row[..end - start].copy_from_slice(&data[start..end]);
    }
    row
}
