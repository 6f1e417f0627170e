//! Index buffer decoding and draw call windowing.
//!
//! An indexed draw only uses part of the bound index buffer.
//! The indices in the buffer are relative to `BaseVertexLocation`
//! and the draw starts at `StartIndexLocation` for `IndexCount` indices.
//!
//! The vertices referenced by a draw are typically a small subset of the vertex buffer.
//! [IndexRemap] assigns the referenced vertices new consecutive indices
//! so exported meshes only contain the vertices the draw actually uses.
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use binrw::{BinReaderExt, BinResult};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// Index buffers with a stride other than 4 are assumed to use 16-bit indices.
    pub fn from_stride(stride: usize) -> Self {
        match stride {
            4 => Self::Uint32,
            _ => Self::Uint16,
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Decode all complete indices in `buffer`.
pub fn read_indices(buffer: &[u8], format: IndexFormat) -> BinResult<Vec<u32>> {
    let count = buffer.len() / format.size_in_bytes();
    let mut reader = Cursor::new(buffer);

    let mut indices = Vec::with_capacity(count);
    for _ in 0..count {
        let index = match format {
            IndexFormat::Uint16 => reader.read_le::<u16>()? as u32,
            IndexFormat::Uint32 => reader.read_le::<u32>()?,
        };
        indices.push(index);
    }
    Ok(indices)
}

/// The index range and vertex offset for a draw call.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct DrawParams {
    /// The number of indices or `0` to use the whole buffer.
    pub index_count: usize,
    pub start_index_location: usize,
    pub base_vertex_location: i64,
}

impl DrawParams {
    /// Find the draw parameters from the arguments of a draw call.
    ///
    /// Names are compared case insensitively.
    /// The vertex count of a non indexed draw is only used if there is no index count.
    pub fn from_arguments<I, S>(arguments: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut params = Self::default();
        for (name, value) in arguments {
            match name.as_ref().to_lowercase().as_str() {
                "indexcount" | "index_count" => params.index_count = value.max(0) as usize,
                "startindexlocation" | "start_index_location" => {
                    params.start_index_location = value.max(0) as usize
                }
                "basevertexlocation" | "base_vertex_location" => {
                    params.base_vertex_location = value
                }
                "vertexcount" | "vertex_count" if params.index_count == 0 => {
                    params.index_count = value.max(0) as usize
                }
                _ => (),
            }
        }
        params
    }

    /// The indices used by the draw before applying the base vertex.
    ///
    /// The range is clamped to the length of `indices`.
    pub fn window<'a>(&self, indices: &'a [u32]) -> &'a [u32] {
        if self.index_count > 0 {
            let start = self.start_index_location.min(indices.len());
            let end = self
                .start_index_location
                .saturating_add(self.index_count)
                .min(indices.len());
            &indices[start..end]
        } else {
            indices
        }
    }

    /// The vertex buffer indices for the `window` of this draw.
    pub fn vertex_indices(&self, indices: &[u32]) -> Vec<i64> {
        self.window(indices)
            .iter()
            .map(|i| *i as i64 + self.base_vertex_location)
            .collect()
    }
}

/// A mapping from vertex buffer indices to consecutive indices starting from 0.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct IndexRemap {
    /// The vertex buffer index for each new index in ascending order.
    pub vertex_indices: Vec<usize>,
    new_indices: BTreeMap<usize, u32>,
}

impl IndexRemap {
    /// Remap the distinct values of `indices` that refer to one of the `vertex_count` vertices.
    pub fn new(indices: &[i64], vertex_count: usize) -> Self {
        let unique: BTreeSet<_> = indices
            .iter()
            .filter_map(|i| usize::try_from(*i).ok())
            .filter(|i| *i < vertex_count)
            .collect();

        let vertex_indices: Vec<_> = unique.into_iter().collect();
        let new_indices = vertex_indices
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, new as u32))
            .collect();

        Self {
            vertex_indices,
            new_indices,
        }
    }

    pub fn get(&self, index: i64) -> Option<u32> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.new_indices.get(&i).copied())
    }

    pub fn len(&self) -> usize {
        self.vertex_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_indices.is_empty()
    }

    /// Remapped triangle lists for `indices`.
    /// Triangles that reference a vertex without a new index are skipped.
    pub fn triangles(&self, indices: &[i64]) -> Vec<[u32; 3]> {
        indices
            .chunks_exact(3)
            .filter_map(|t| Some([self.get(t[0])?, self.get(t[1])?, self.get(t[2])?]))
            .collect()
    }
}

/// Triangle lists for vertices in buffer order with no index buffer.
pub fn sequential_triangles(vertex_count: usize) -> Vec<[u32; 3]> {
    (0..vertex_count / 3)
        .map(|i| {
            let i = i as u32 * 3;
            [i, i + 1, i + 2]
        })
        .collect()
}
