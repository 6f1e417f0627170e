//! Single surface Direct Draw Surface (DDS) files with the DX10 header extension.
//!
//! Captured textures are saved as a single 2D surface without mipmaps or array layers.
//! The DX10 header stores the DXGI_FORMAT directly, so no legacy pixel format masks are needed.
//!
//! # File Layout
//! | offset | size | data |
//! | --- | --- | --- |
//! | 0 | 4 | magic `"DDS "` |
//! | 4 | 124 | header |
//! | 128 | 20 | DX10 header |
//! | 148 | | surface data |
use std::{
    io::{BufWriter, Write},
    path::Path,
};

use ddsfile::{AlphaMode, D3D10ResourceDimension, Dds, DxgiFormat};
use log::error;

use crate::{
    error::{CreateDdsError, SaveDdsError},
    format::{FormatSpec, dxgi_format},
};

/// Creates a 2D surface for the image `data` without modifying the bytes.
///
/// The pitch or linear size is calculated from the dimensions and `format` even if
/// `data` has a different length.
pub fn create_dds(
    width: u32,
    height: u32,
    format: &str,
    data: Vec<u8>,
) -> Result<Dds, CreateDdsError> {
    if width == 0 || height == 0 {
        return Err(CreateDdsError::EmptySurface { width, height });
    }

    let code = dxgi_format(format);
    let format =
        DxgiFormat::try_from(code).map_err(|_| CreateDdsError::UnsupportedFormat { code })?;

    let mut dds = Dds::new_dxgi(ddsfile::NewDxgiParams {
        height,
        width,
        depth: Some(1),
        format,
        mipmap_levels: Some(1),
        array_layers: None,
        caps2: None,
        is_cubemap: false,
        resource_dimension: D3D10ResourceDimension::Texture2D,
        alpha_mode: AlphaMode::Unknown,
    })?;
    dds.data = data;

    Ok(dds)
}

/// Saves `data` as a DDS file and logs any errors.
pub fn save_dds<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    width: u32,
    height: u32,
    format: &str,
) -> Result<(), SaveDdsError> {
    write_dds(path.as_ref(), data, width, height, format)
        .inspect_err(|e| error!("Error saving DDS {:?}: {e}", path.as_ref()))
}

fn write_dds(
    path: &Path,
    data: &[u8],
    width: u32,
    height: u32,
    format: &str,
) -> Result<(), SaveDdsError> {
    let dds = create_dds(width, height, format, data.to_vec())?;
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    dds.write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Reverses the order of pixel rows or block rows for `format`.
///
/// The output has the same length as `data`.
/// Rows that do not fit in `data` are left as zeros.
pub fn flip_vertical(data: &[u8], width: u32, height: u32, format: &str) -> Vec<u8> {
    let spec = FormatSpec::from_name(format);
    let row_size = spec.row_pitch(width);
    let rows = spec.row_count(height);

    let mut flipped = vec![0u8; data.len()];
    if row_size == 0 {
        return flipped;
    }

    for y in 0..rows {
        let src = y * row_size;
        let dst = (rows - 1 - y) * row_size;
        if src + row_size <= data.len() && dst + row_size <= data.len() {
            flipped[dst..dst + row_size].copy_from_slice(&data[src..src + row_size]);
        }
    }
    flipped
}
