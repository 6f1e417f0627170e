//! Lookup tables for texture format identifiers.
//!
//! Capture tools report formats as strings that may carry driver specific prefixes or suffixes.
//! Lookups try an exact match before falling back to substring matching,
//! so every table is an ordered slice and the first matching entry wins.

/// The DXGI_FORMAT used when a format identifier is not recognized (`R8G8B8A8_UNORM`).
pub const DEFAULT_DXGI_FORMAT: u32 = 28;

/// The uncompressed size used when a format identifier is not recognized.
pub const DEFAULT_BYTES_PER_PIXEL: usize = 4;

/// Format identifiers and their DXGI_FORMAT values in lookup order.
pub const DXGI_FORMATS: &[(&str, u32)] = &[
    ("R8G8B8A8_UNORM", 28),
    ("R8G8B8A8_UNORM_SRGB", 29),
    ("R8G8B8A8", 28),
    ("B8G8R8A8_UNORM", 87),
    ("B8G8R8A8_UNORM_SRGB", 91),
    ("B8G8R8A8", 87),
    ("B8G8R8X8_UNORM", 88),
    ("R16G16B16A16_FLOAT", 10),
    ("R32G32B32A32_FLOAT", 2),
    ("R10G10B10A2_UNORM", 24),
    ("R11G11B10_FLOAT", 26),
    ("BC1_UNORM", 71),
    ("BC1_UNORM_SRGB", 72),
    ("BC1", 71),
    ("BC2_UNORM", 74),
    ("BC2_UNORM_SRGB", 75),
    ("BC2", 74),
    ("BC3_UNORM", 77),
    ("BC3_UNORM_SRGB", 78),
    ("BC3", 77),
    ("BC4_UNORM", 80),
    ("BC4_SNORM", 81),
    ("BC4", 80),
    ("BC5_UNORM", 83),
    ("BC5_SNORM", 84),
    ("BC5", 83),
    ("BC6H_UF16", 95),
    ("BC6H_SF16", 96),
    ("BC6H", 95),
    ("BC7_UNORM", 98),
    ("BC7_UNORM_SRGB", 99),
    ("BC7", 98),
    ("R8_UNORM", 61),
    ("R8G8_UNORM", 49),
    ("R16_FLOAT", 54),
    ("R16_UNORM", 56),
    ("R32_FLOAT", 41),
    ("D24_UNORM_S8_UINT", 45),
    ("D32_FLOAT", 40),
];

// Most specific tokens first since "R32" also matches "R32G32B32A32".
const BYTES_PER_PIXEL: &[(&str, usize)] = &[
    ("R32G32B32A32", 16),
    ("R16G16B16A16", 8),
    ("R32G32", 8),
    ("R10G10B10A2", 4),
    ("R11G11B10", 4),
    ("R8G8B8A8", 4),
    ("B8G8R8A8", 4),
    ("B8G8R8X8", 4),
    ("R32", 4),
    ("D32", 4),
    ("D24", 4),
    ("R16G16", 4),
    ("R8G8", 2),
    ("R16", 2),
    ("R8", 1),
];

const BLOCK_SIZES: &[(&str, usize)] = &[
    ("BC1", 8),
    ("BC4", 8),
    ("BC2", 16),
    ("BC3", 16),
    ("BC5", 16),
    ("BC6H", 16),
    ("BC7", 16),
];

/// The DXGI_FORMAT value for `format` or [DEFAULT_DXGI_FORMAT] if there is no match.
pub fn dxgi_format(format: &str) -> u32 {
    DXGI_FORMATS
        .iter()
        .find(|(name, _)| *name == format)
        .or_else(|| DXGI_FORMATS.iter().find(|(name, _)| format.contains(name)))
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_DXGI_FORMAT)
}

/// The size of a single pixel for uncompressed formats.
pub fn bytes_per_pixel(format: &str) -> usize {
    BYTES_PER_PIXEL
        .iter()
        .find(|(token, _)| format.contains(token))
        .map(|(_, size)| *size)
        .unwrap_or(DEFAULT_BYTES_PER_PIXEL)
}

/// The size of a 4x4 block or `0` if `format` is not block compressed.
pub fn block_size(format: &str) -> usize {
    BLOCK_SIZES
        .iter()
        .find(|(token, _)| format.contains(token))
        .map(|(_, size)| *size)
        .unwrap_or(0)
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PixelLayout {
    Uncompressed { bytes_per_pixel: usize },
    /// 4x4 pixel blocks with a fixed size in bytes.
    BlockCompressed { block_size: usize },
}

/// The memory layout and DDS format code for a format identifier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FormatSpec {
    pub dxgi_format: u32,
    pub layout: PixelLayout,
}

impl FormatSpec {
    pub fn from_name(format: &str) -> Self {
        let layout = match block_size(format) {
            0 => PixelLayout::Uncompressed {
                bytes_per_pixel: bytes_per_pixel(format),
            },
            block_size => PixelLayout::BlockCompressed { block_size },
        };
        Self {
            dxgi_format: dxgi_format(format),
            layout,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.layout, PixelLayout::BlockCompressed { .. })
    }

    /// The size in bytes of one row of pixels or one row of blocks.
    pub fn row_pitch(&self, width: u32) -> usize {
        match self.layout {
            PixelLayout::Uncompressed { bytes_per_pixel } => width as usize * bytes_per_pixel,
            PixelLayout::BlockCompressed { block_size } => width.div_ceil(4) as usize * block_size,
        }
    }

    /// The number of pixel rows or block rows.
    pub fn row_count(&self, height: u32) -> usize {
        match self.layout {
            PixelLayout::Uncompressed { .. } => height as usize,
            PixelLayout::BlockCompressed { .. } => height.div_ceil(4) as usize,
        }
    }

    /// The size in bytes of a single mipmap.
    pub fn surface_size(&self, width: u32, height: u32) -> usize {
        self.row_pitch(width) * self.row_count(height)
    }
}
