use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreateDdsError {
    #[error("surface dimensions {width}x{height} must be non zero")]
    EmptySurface { width: u32, height: u32 },

    #[error("DXGI format {code} is not supported")]
    UnsupportedFormat { code: u32 },

    #[error("error creating DDS: {0}")]
    Dds(#[from] ddsfile::Error),
}

#[derive(Debug, Error)]
pub enum SaveDdsError {
    #[error("error creating DDS: {0}")]
    Create(#[from] CreateDdsError),

    #[error("error writing DDS: {0}")]
    Dds(#[from] ddsfile::Error),

    #[error("error writing file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SaveImageError {
    #[error("image format {0:?} is not supported")]
    UnsupportedFormat(String),

    #[error("image dimensions {width}x{height} are not supported")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("error encoding PNG: {0}")]
    Png(#[from] image::ImageError),

    #[error("error writing TGA header: {0}")]
    Binrw(#[from] binrw::Error),

    #[error("error writing file: {0}")]
    Io(#[from] std::io::Error),
}
