//! Reconstruct the triangles of a draw as an OBJ file.
//!
//! Meshes are first built from the index and vertex buffer views bound to the draw.
//! This also supports replaying the bone blending of skinned vertex shaders.
//! If that fails, the input assembler state from the draw metadata is used instead.
use std::path::{Path, PathBuf};

use glam::Vec3;
use gpa_lib::{
    index::{DrawParams, IndexFormat, IndexRemap, read_indices, sequential_triangles},
    obj::ObjMesh,
    skinning::{SkinnedVertices, SkinningOptions, apply_skinning, read_bone_influences},
    vertex::{Vertices, read_vertices, unpack_normal, vertex_count},
};
use log::{debug, warn};

use crate::{
    buffer::{SKELETON_BUFFER_SIZE, read_skeleton},
    capture::{CaptureHost, Readback, ResourceHandle},
    descriptor::{BufferDescriptor, GeometryInfo, as_u64},
    error::SkipReason,
};

/// Vertex buffers with this stride store 4 bone weights and 4 bone indices.
pub const BONE_BUFFER_STRIDE: usize = 8;

/// The smallest stride that includes normals and texture coordinates.
pub const MIN_FULL_VERTEX_STRIDE: usize = 24;

/// Normals facing +Z for vertices without a decoded normal.
const DEFAULT_PACKED_NORMAL: Vec3 = Vec3::new(127.5, 127.5, 255.0);

/// A buffer view bound to a draw.
#[derive(Debug, PartialEq, Clone)]
pub struct BoundBuffer {
    pub resource: ResourceHandle,
    pub descriptor: BufferDescriptor,
}

/// The buffer views of a draw used for reconstructing the mesh.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct DrawBuffers {
    pub index: Option<BoundBuffer>,
    pub vertex: Vec<BoundBuffer>,
    pub constant: Vec<BoundBuffer>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MeshExport {
    pub path: PathBuf,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub skinning_applied: bool,
    /// The intermediate skinning values if enabled in the [SkinningOptions].
    pub bone_debug: Option<PathBuf>,
}

pub fn mesh_file_name(event_index: usize) -> String {
    format!("g_{event_index}.obj")
}

/// The vertex buffer with the largest stride of at least [MIN_FULL_VERTEX_STRIDE]
/// or the first buffer that does not store bone influences.
pub fn select_vertex_buffer(buffers: &[BoundBuffer]) -> Option<&BoundBuffer> {
    let mut selected: Option<&BoundBuffer> = None;
    for buffer in buffers {
        let stride = buffer.descriptor.stride;
        if stride != BONE_BUFFER_STRIDE
            && stride >= MIN_FULL_VERTEX_STRIDE
            && selected.is_none_or(|s| stride > s.descriptor.stride)
        {
            selected = Some(buffer);
        }
    }

    selected.or_else(|| {
        buffers
            .iter()
            .find(|b| b.descriptor.stride != BONE_BUFFER_STRIDE)
    })
}

/// The last vertex buffer with bone weights and indices.
pub fn select_bone_buffer(buffers: &[BoundBuffer]) -> Option<&BoundBuffer> {
    buffers
        .iter()
        .rev()
        .find(|b| b.descriptor.stride == BONE_BUFFER_STRIDE)
}

/// Export the mesh for a draw using the bound index and vertex buffer views.
#[tracing::instrument(skip_all)]
pub fn export_mesh_from_buffers<H: CaptureHost>(
    readback: &mut Readback<H>,
    buffers: &DrawBuffers,
    draw: &DrawParams,
    event_index: usize,
    skinning: Option<&SkinningOptions>,
    folder: &Path,
) -> Result<MeshExport, SkipReason> {
    let index_buffer = buffers.index.as_ref().ok_or(SkipReason::NoIndices)?;
    let vertex_buffer = select_vertex_buffer(&buffers.vertex).ok_or(SkipReason::NoVertexBuffer)?;

    let index_data = readback.buffer(index_buffer.resource)?;
    let indices = read_indices(
        &index_data,
        IndexFormat::from_stride(index_buffer.descriptor.stride),
    )?;
    let used_indices = draw.window(&indices);
    let max_index = *used_indices.iter().max().ok_or(SkipReason::NoIndices)?;
    let vertex_indices = draw.vertex_indices(&indices);

    // Only decode the vertices up to the largest index.
    let required_count = (max_index as i64 + draw.base_vertex_location + 1).max(0) as usize;
    let stride = vertex_buffer.descriptor.stride;
    let vertex_data = readback.buffer(vertex_buffer.resource)?;
    let count = required_count.min(vertex_count(&vertex_data, stride));
    debug!(
        "Decoding {count} vertices with stride {stride} ({required_count} required, {} in buffer)",
        vertex_count(&vertex_data, stride)
    );

    let mut vertices = read_vertices(&vertex_data, stride, count)?;
    if vertices.is_empty() {
        return Err(SkipReason::NoVertices);
    }

    let mut skeleton_row_count = None;
    let mut bone_debug = None;
    if let Some(options) = skinning
        && let Some((skinned, row_count)) = skin_vertices(readback, buffers, &vertices, options)
    {
        debug!("Skinned {} vertices", skinned.positions.len());
        vertices.positions = skinned.positions;
        vertices.normals = skinned.normals;
        skeleton_row_count = Some(row_count);

        if let Some(debug) = skinned.debug {
            let path = folder.join("bone.json");
            match serde_json::to_string_pretty(&debug)
                .map_err(SkipReason::from)
                .and_then(|json| std::fs::write(&path, json).map_err(SkipReason::from))
            {
                Ok(()) => bone_debug = Some(path),
                Err(e) => warn!("Error writing skinning debug file {path:?}: {e}"),
            }
        }
    }

    let mut mesh = remapped_mesh(&vertices, &vertex_indices).ok_or(SkipReason::NoVertices)?;
    mesh.comments = vec![
        "Exported from GPU frame capture (IBV/VBV)".to_string(),
        format!("Event Index: {event_index}"),
        format!("Stride: {stride}"),
        draw_comment(draw),
        format!(
            "VertexCount: {required_count} (max_index={max_index} + base={} + 1)",
            draw.base_vertex_location
        ),
        format!(
            "Exported Vertices: {}, Triangles: {}",
            mesh.positions.len(),
            mesh.triangles.len()
        ),
        format!(
            "Has Normals: {}, Has UVs: {}",
            vertices.has_normals(),
            vertices.has_uvs()
        ),
        format!("Skinning Applied: {}", skeleton_row_count.is_some()),
    ];
    if let Some(row_count) = skeleton_row_count {
        mesh.comments.push(format!("Skeleton Data: {row_count} float4s"));
    }

    let path = folder.join(mesh_file_name(event_index));
    mesh.save(&path)?;

    Ok(MeshExport {
        path,
        vertex_count: mesh.positions.len(),
        triangle_count: mesh.triangles.len(),
        skinning_applied: skeleton_row_count.is_some(),
        bone_debug,
    })
}

/// Export the mesh for a draw using the vertex and index buffers from the draw metadata.
/// Draws without an index buffer use consecutive vertices for each triangle.
#[tracing::instrument(skip_all)]
pub fn export_mesh_from_geometry<H: CaptureHost>(
    readback: &mut Readback<H>,
    geometry: &GeometryInfo,
    draw: &DrawParams,
    event_index: usize,
    folder: &Path,
) -> Result<MeshExport, SkipReason> {
    let host = readback.host();

    let buffers: Vec<_> = geometry
        .vertex_buffers
        .iter()
        .filter_map(|b| {
            let resource = host.memory_resource(b.buffer)?;
            Some((resource, b, description_stride(host, resource)))
        })
        .collect();

    let mut selected: Option<(ResourceHandle, usize)> = None;
    for (resource, _, stride) in &buffers {
        let stride = stride.unwrap_or_default();
        if stride >= MIN_FULL_VERTEX_STRIDE && selected.is_none_or(|(_, s)| stride > s) {
            selected = Some((*resource, stride));
        }
    }
    let (vertex_resource, stride) = selected
        .or_else(|| {
            buffers
                .iter()
                .find(|(_, b, _)| b.layout_name.to_uppercase().contains("POSITION"))
                .map(|(resource, _, stride)| (*resource, stride.unwrap_or(12)))
        })
        .ok_or(SkipReason::NoVertexBuffer)?;

    let vertex_data = readback.buffer(vertex_resource)?;
    let vertices = read_vertices(&vertex_data, stride, vertex_count(&vertex_data, stride))?;
    if vertices.is_empty() {
        return Err(SkipReason::NoVertices);
    }

    let indices = geometry
        .index_buffer
        .and_then(|id| {
            let resource = host.memory_resource(id)?;
            let format = IndexFormat::from_stride(description_stride(host, resource).unwrap_or(2));
            let data = readback
                .buffer(resource)
                .inspect_err(|e| debug!("Index buffer {id} not available: {e}"))
                .ok()?;
            read_indices(&data, format)
                .inspect_err(|e| debug!("Error reading index buffer {id}: {e}"))
                .ok()
        })
        .unwrap_or_default();

    let mut mesh = if draw.window(&indices).is_empty() {
        ObjMesh {
            comments: Vec::new(),
            positions: vertices.positions.clone(),
            uvs: vertices.uvs.clone(),
            normals: vertices.normals.iter().map(|n| unpack_normal(*n)).collect(),
            triangles: sequential_triangles(vertices.len()),
        }
    } else {
        remapped_mesh(&vertices, &draw.vertex_indices(&indices)).ok_or(SkipReason::NoVertices)?
    };

    mesh.comments = vec![
        "Exported from GPU frame capture".to_string(),
        format!("Event Index: {event_index}"),
        format!("Stride: {stride}"),
        draw_comment(draw),
        format!(
            "Vertices: {}, Triangles: {}",
            mesh.positions.len(),
            mesh.triangles.len()
        ),
        format!(
            "Has Normals: {}, Has UVs: {}",
            vertices.has_normals(),
            vertices.has_uvs()
        ),
    ];

    let path = folder.join(mesh_file_name(event_index));
    mesh.save(&path)?;

    Ok(MeshExport {
        path,
        vertex_count: mesh.positions.len(),
        triangle_count: mesh.triangles.len(),
        skinning_applied: false,
        bone_debug: None,
    })
}

/// Skin using the first skeleton constant buffer and the bone influence vertex buffer.
/// Returns the skinned vertices and the number of skeleton rows.
fn skin_vertices<H: CaptureHost>(
    readback: &mut Readback<H>,
    buffers: &DrawBuffers,
    vertices: &Vertices,
    options: &SkinningOptions,
) -> Option<(SkinnedVertices, usize)> {
    let skeleton = buffers
        .constant
        .iter()
        .filter(|b| b.descriptor.size == SKELETON_BUFFER_SIZE)
        .find_map(|b| {
            read_skeleton(readback, b.resource)
                .inspect_err(|e| debug!("Error reading skeleton: {e}"))
                .ok()
        })
        .filter(|s| !s.rows.is_empty())?;

    let bone_buffer = select_bone_buffer(&buffers.vertex)?;
    let bone_data = readback
        .buffer(bone_buffer.resource)
        .inspect_err(|e| debug!("Error reading bone influences: {e}"))
        .ok()?;
    let influences = read_bone_influences(&bone_data, vertices.len());
    if influences.is_empty() {
        return None;
    }

    let skinned = apply_skinning(
        &vertices.positions,
        &vertices.normals,
        &influences,
        &skeleton,
        options,
    );
    Some((skinned, skeleton.rows.len()))
}

/// Select the vertices used by `vertex_indices` and remap the triangles to the selected vertices.
/// Indices outside the vertex buffer are excluded along with their triangles.
pub fn remapped_mesh(vertices: &Vertices, vertex_indices: &[i64]) -> Option<ObjMesh> {
    let remap = IndexRemap::new(vertex_indices, vertices.len());
    if remap.is_empty() {
        return None;
    }

    let normals = if vertices.has_normals() {
        remap
            .vertex_indices
            .iter()
            .map(|i| {
                let normal = vertices.normals.get(*i).copied();
                unpack_normal(normal.unwrap_or(DEFAULT_PACKED_NORMAL))
            })
            .collect()
    } else {
        Vec::new()
    };

    let uvs = if vertices.has_uvs() {
        remap
            .vertex_indices
            .iter()
            .map(|i| vertices.uvs.get(*i).copied().unwrap_or_default())
            .collect()
    } else {
        Vec::new()
    };

    Some(ObjMesh {
        comments: Vec::new(),
        positions: remap
            .vertex_indices
            .iter()
            .map(|i| vertices.positions[*i])
            .collect(),
        uvs,
        normals,
        triangles: remap.triangles(vertex_indices),
    })
}

fn draw_comment(draw: &DrawParams) -> String {
    format!(
        "IndexCount: {}, StartIndexLocation: {}, BaseVertexLocation: {}",
        draw.index_count, draw.start_index_location, draw.base_vertex_location
    )
}

fn description_stride<H: CaptureHost>(host: &H, resource: ResourceHandle) -> Option<usize> {
    let description = host.resource_description(resource).ok()?;
    as_u64(description.get("stride")?).map(|s| s as usize)
}
