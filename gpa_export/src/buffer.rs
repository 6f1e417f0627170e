//! JSON descriptions for bound buffers.
//!
//! Buffer contents are not saved except for constant buffers that hold a skeleton.
use std::path::{Path, PathBuf};

use gpa_lib::skinning::SkeletonMatrixTable;
use log::debug;
use serde::Serialize;

use crate::{
    capture::{CaptureHost, Readback, ResourceHandle},
    descriptor::{BufferDescriptor, ViewType},
    error::SkipReason,
};

/// The size of a constant buffer with 16 bones of 3 float4 rows.
pub const SKELETON_BUFFER_SIZE: u64 = 768;

/// The file name without extension based on the view type and stride.
pub fn buffer_file_stem(buffer: &BufferDescriptor) -> String {
    let id = buffer.resource_id;
    match buffer.view_type {
        ViewType::Vbv => match buffer.stride {
            8 => format!("vbv_bone_{id:X}"),
            16 => format!("vbv_tangent_{id:X}"),
            stride if stride >= 24 => format!("vbv_vertex_{id:X}"),
            _ => format!("vbv_{id:X}"),
        },
        ViewType::Ibv => format!("ibv_{id:X}"),
        ViewType::Cbv => format!("cbv_{id:X}"),
        _ => format!("buf_{id:X}_{}", buffer.view_type.name()),
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct BufferInfo {
    pub resource_id: u64,
    pub resource_id_hex: String,
    pub size: u64,
    pub stride: usize,
    pub offset: u64,
    pub view_type: String,
    /// The description from the host.
    pub description: serde_json::Value,
    #[serde(flatten)]
    pub skeleton: Option<SkeletonInfo>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SkeletonInfo {
    Rows {
        is_skeleton_data: bool,
        skeleton_float4_count: usize,
        skeleton_data: Vec<[f32; 4]>,
    },
    Error {
        skeleton_parse_error: String,
    },
}

/// Read a skeleton from a constant buffer with [SKELETON_BUFFER_SIZE] bytes.
pub fn read_skeleton<H: CaptureHost>(
    readback: &mut Readback<H>,
    resource: ResourceHandle,
) -> Result<SkeletonMatrixTable, SkipReason> {
    let data = readback.buffer(resource)?;
    let skeleton = SkeletonMatrixTable::from_bytes(&data);
    debug!("Read {} skeleton rows", skeleton.rows.len());
    Ok(skeleton)
}

/// Write the description of a buffer to a JSON file in `folder`.
pub fn export_buffer_info<H: CaptureHost>(
    readback: &mut Readback<H>,
    resource: ResourceHandle,
    buffer: &BufferDescriptor,
    description: serde_json::Value,
    folder: &Path,
) -> Result<PathBuf, SkipReason> {
    let skeleton = (buffer.size == SKELETON_BUFFER_SIZE).then(|| {
        match read_skeleton(readback, resource) {
            Ok(skeleton) => SkeletonInfo::Rows {
                is_skeleton_data: true,
                skeleton_float4_count: skeleton.rows.len(),
                skeleton_data: skeleton.rows.iter().map(|r| r.to_array()).collect(),
            },
            Err(e) => SkeletonInfo::Error {
                skeleton_parse_error: e.to_string(),
            },
        }
    });

    let info = BufferInfo {
        resource_id: buffer.resource_id,
        resource_id_hex: format!("{:X}", buffer.resource_id),
        size: buffer.size,
        stride: buffer.stride,
        offset: buffer.offset,
        view_type: buffer.view_type.name().to_string(),
        description,
        skeleton,
    };

    let path = folder.join(format!("{}.json", buffer_file_stem(buffer)));
    std::fs::write(&path, serde_json::to_string_pretty(&info)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn buffer(view_type: ViewType, stride: usize) -> BufferDescriptor {
        BufferDescriptor {
            resource_id: 0xA1,
            view_type,
            view_id: -1,
            size: 64,
            stride,
            offset: 0,
        }
    }

    #[test]
    fn vertex_buffer_stems() {
        assert_eq!("vbv_bone_A1", buffer_file_stem(&buffer(ViewType::Vbv, 8)));
        assert_eq!("vbv_tangent_A1", buffer_file_stem(&buffer(ViewType::Vbv, 16)));
        assert_eq!("vbv_vertex_A1", buffer_file_stem(&buffer(ViewType::Vbv, 24)));
        assert_eq!("vbv_vertex_A1", buffer_file_stem(&buffer(ViewType::Vbv, 40)));
        assert_eq!("vbv_A1", buffer_file_stem(&buffer(ViewType::Vbv, 12)));
    }

    #[test]
    fn other_buffer_stems() {
        assert_eq!("ibv_A1", buffer_file_stem(&buffer(ViewType::Ibv, 2)));
        assert_eq!("cbv_A1", buffer_file_stem(&buffer(ViewType::Cbv, 0)));
        assert_eq!("buf_A1_UAV", buffer_file_stem(&buffer(ViewType::Uav, 4)));
        assert_eq!(
            "buf_A1_unknown",
            buffer_file_stem(&buffer(ViewType::Other("unknown".to_string()), 0))
        );
    }

    #[test]
    fn skeleton_info_json() {
        let info = BufferInfo {
            resource_id: 10,
            resource_id_hex: "A".to_string(),
            size: 768,
            stride: 0,
            offset: 0,
            view_type: "CBV".to_string(),
            description: json!({}),
            skeleton: Some(SkeletonInfo::Rows {
                is_skeleton_data: true,
                skeleton_float4_count: 1,
                skeleton_data: vec![[1.0, 0.0, 0.0, 0.5]],
            }),
        };
        assert_eq!(
            json!({
                "resource_id": 10,
                "resource_id_hex": "A",
                "size": 768,
                "stride": 0,
                "offset": 0,
                "view_type": "CBV",
                "description": {},
                "is_skeleton_data": true,
                "skeleton_float4_count": 1,
                "skeleton_data": [[1.0, 0.0, 0.0, 0.5]]
            }),
            serde_json::to_value(&info).unwrap()
        );
    }

    #[test]
    fn buffer_info_json_without_skeleton() {
        let info = BufferInfo {
            resource_id: 10,
            resource_id_hex: "A".to_string(),
            size: 32,
            stride: 16,
            offset: 4,
            view_type: "VBV".to_string(),
            description: json!({"size": 32}),
            skeleton: None,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(None, value.get("is_skeleton_data"));
        assert_eq!(Some(&json!(4)), value.get("offset"));
    }
}
