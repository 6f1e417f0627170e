//! Texture export with names from shader reflection.
use std::path::{Path, PathBuf};

use gpa_lib::{
    dds::{flip_vertical, save_dds},
    format::FormatSpec,
    image::{save_png, save_tga},
};
use log::{debug, warn};

use crate::{
    capture::{CaptureHost, Readback, ResourceHandle},
    descriptor::TextureDescriptor,
    error::SkipReason,
};

/// The file format for exported textures.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum TextureFileFormat {
    /// Keep the data unmodified in a DDS container.
    #[default]
    Dds,
    /// Convert simple uncompressed formats to PNG.
    Png,
    /// Convert 4 byte formats to TGA.
    Tga,
}

impl TextureFileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Dds => "dds",
            Self::Png => "png",
            Self::Tga => "tga",
        }
    }
}

/// Keep only the characters in `name` that are safe for file names.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// `t_<name>_<HEXID>` for textures with a shader name and `tex_<HEXID>` otherwise.
pub fn texture_file_stem(resource_id: u64, shader_name: Option<&str>) -> String {
    match shader_name {
        Some(name) => format!("t_{}_{resource_id:X}", sanitize_name(name)),
        None => format!("tex_{resource_id:X}"),
    }
}

/// Read back the first surface of a texture view and save it to `folder`.
///
/// If the selected format can't be written, the data is saved as DDS.
/// If DDS also fails, the unmodified bytes are saved to a `.raw` file
/// with the dimensions and format in the name.
pub fn export_texture<H: CaptureHost>(
    readback: &Readback<H>,
    resource: ResourceHandle,
    texture: &TextureDescriptor,
    shader_name: Option<&str>,
    folder: &Path,
    file_format: TextureFileFormat,
    flip: bool,
) -> Result<PathBuf, SkipReason> {
    let base = texture.mips.first().ok_or(SkipReason::NoMips)?;
    let (width, height) = texture.dimensions().ok_or(SkipReason::EmptyTexture {
        width: base.width,
        height: base.height,
    })?;

    let data = readback.image(resource, texture.first_mip, texture.first_slice)?;

    let spec = FormatSpec::from_name(&texture.format);
    let (data, row_pitch) = if flip {
        // Flipped rows are always tightly packed.
        (
            flip_vertical(&data, width, height, &texture.format),
            spec.row_pitch(width),
        )
    } else {
        let row_pitch = texture.row_pitch.unwrap_or_else(|| spec.row_pitch(width));
        (data, row_pitch)
    };

    let stem = texture_file_stem(texture.resource_id, shader_name);

    let path = folder.join(format!("{stem}.{}", file_format.extension()));
    let saved = match file_format {
        TextureFileFormat::Dds => save_dds(&path, &data, width, height, &texture.format)
            .inspect_err(|e| debug!("Saving {path:?} as raw data instead: {e}"))
            .is_ok(),
        TextureFileFormat::Png => save_png(&path, &data, width, height, row_pitch, &texture.format)
            .inspect_err(|e| debug!("Saving {path:?} as DDS instead: {e}"))
            .is_ok(),
        TextureFileFormat::Tga => save_tga(&path, &data, width, height, row_pitch, &texture.format)
            .inspect_err(|e| debug!("Saving {path:?} as DDS instead: {e}"))
            .is_ok(),
    };
    if saved {
        return Ok(path);
    }

    if file_format != TextureFileFormat::Dds {
        let path = folder.join(format!("{stem}.dds"));
        if save_dds(&path, &data, width, height, &texture.format)
            .inspect_err(|e| debug!("Saving {path:?} as raw data instead: {e}"))
            .is_ok()
        {
            return Ok(path);
        }
    }

    let path = folder.join(format!("{stem}_{width}x{height}_{}.raw", texture.format));
    warn!("Saving unconverted texture data to {path:?}");
    std::fs::write(&path, &data)?;
    Ok(path)
}
