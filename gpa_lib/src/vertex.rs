//! Utilities for decoding interleaved vertex buffers.
//!
//! Captures only provide the stride of a vertex buffer and not the input layout.
//! The attribute offsets are inferred from the stride using the layouts in [VertexLayout].
//! Decoded values are stored separately for each attribute in [Vertices],
//! which is often called a "struct of arrays" layout.
use std::io::{Cursor, Seek, SeekFrom};

use binrw::{BinReaderExt, BinResult};
use glam::{Vec2, Vec3};

/// Texture coordinates larger than this are assumed to be some other attribute.
const MAX_FALLBACK_UV: f32 = 100.0;

/// The per vertex values for a decoded vertex buffer.
///
/// Normals and texture coordinates are either empty or have the same length as positions.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Vertices {
    pub positions: Vec<Vec3>,
    /// Unsigned bytes in the range `0.0` to `255.0`.
    pub normals: Vec<Vec3>,
    /// Texture coordinates with the origin in the bottom left.
    pub uvs: Vec<Vec2>,
}

impl Vertices {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }
}

/// Attribute offsets for a vertex buffer stride.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VertexLayout {
    /// Only the position at offset 0.
    Position,
    /// Position, normal at 12, and UV at 16.
    PositionNormalUv,
    /// Position, color at 12, normal at 16, and UV at 20.
    PositionColorNormalUv,
    /// Position, normal at 12, and two UVs at 16 and 24.
    PositionNormalUv2,
    /// Position, color at 12, normal at 16, and two UVs at 20 and 28.
    PositionColorNormalUv2,
    /// An unknown stride read like [VertexLayout::PositionNormalUv]
    /// with UVs outside a plausible range replaced by zero.
    Unknown,
}

impl VertexLayout {
    pub fn from_stride(stride: usize) -> Self {
        match stride {
            24 => Self::PositionNormalUv,
            28 => Self::PositionColorNormalUv,
            32 => Self::PositionNormalUv2,
            36 => Self::PositionColorNormalUv2,
            s if s >= 24 => Self::Unknown,
            _ => Self::Position,
        }
    }

    pub fn normal_offset(&self) -> Option<u64> {
        match self {
            Self::Position => None,
            Self::PositionNormalUv | Self::PositionNormalUv2 | Self::Unknown => Some(12),
            Self::PositionColorNormalUv | Self::PositionColorNormalUv2 => Some(16),
        }
    }

    pub fn uv_offset(&self) -> Option<u64> {
        match self {
            Self::Position => None,
            Self::PositionNormalUv | Self::PositionNormalUv2 | Self::Unknown => Some(16),
            Self::PositionColorNormalUv | Self::PositionColorNormalUv2 => Some(20),
        }
    }
}

/// Decode up to `count` vertices from `buffer` based on the `stride`.
///
/// Decoding stops at the first vertex that extends past the end of the buffer.
pub fn read_vertices(buffer: &[u8], stride: usize, count: usize) -> BinResult<Vertices> {
    let layout = VertexLayout::from_stride(stride);

    // Strides smaller than a position still need room for the position.
    let record_size = stride.max(12);

    let mut reader = Cursor::new(buffer);
    let mut vertices = Vertices::default();
    for i in 0..count {
        let offset = i * stride;
        if stride == 0 || offset + record_size > buffer.len() {
            break;
        }
        let offset = offset as u64;

        reader.seek(SeekFrom::Start(offset))?;
        vertices.positions.push(read_f32x3(&mut reader)?);

        if let Some(normal_offset) = layout.normal_offset() {
            reader.seek(SeekFrom::Start(offset + normal_offset))?;
            vertices.normals.push(read_unorm8x3(&mut reader)?);
        }

        if let Some(uv_offset) = layout.uv_offset() {
            reader.seek(SeekFrom::Start(offset + uv_offset))?;
            let uv = read_f32x2(&mut reader)?;
            if layout == VertexLayout::Unknown
                && (uv.x.abs() >= MAX_FALLBACK_UV || uv.y.abs() >= MAX_FALLBACK_UV)
            {
                vertices.uvs.push(Vec2::ZERO);
            } else {
                vertices.uvs.push(Vec2::new(uv.x, 1.0 - uv.y));
            }
        }
    }
    Ok(vertices)
}

/// The number of complete records in `buffer`.
pub fn vertex_count(buffer: &[u8], stride: usize) -> usize {
    if stride == 0 { 0 } else { buffer.len() / stride }
}

/// Convert normals stored as unsigned bytes to the range `-1.0` to `1.0`.
pub fn unpack_normal(normal: Vec3) -> Vec3 {
    normal / 255.0 * 2.0 - 1.0
}

/// Convert normals in the range `-1.0` to `1.0` to unsigned bytes.
pub fn pack_normal(normal: Vec3) -> Vec3 {
    (normal + 1.0) * 0.5 * 255.0
}

fn read_f32x3(reader: &mut Cursor<&[u8]>) -> BinResult<Vec3> {
    let value: [f32; 3] = reader.read_le()?;
    Ok(value.into())
}

fn read_f32x2(reader: &mut Cursor<&[u8]>) -> BinResult<Vec2> {
    let value: [f32; 2] = reader.read_le()?;
    Ok(value.into())
}

fn read_unorm8x3(reader: &mut Cursor<&[u8]>) -> BinResult<Vec3> {
    // The fourth byte is padding or a handedness sign.
    let value: [u8; 4] = reader.read_le()?;
    Ok(Vec3::new(value[0] as f32, value[1] as f32, value[2] as f32))
}
