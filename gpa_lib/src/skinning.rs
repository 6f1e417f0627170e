//! Linear blend skinning with up to 4 bone influences per vertex.
//!
//! Vertex shaders for skinned meshes store the bone transforms in a constant buffer
//! as an array of float4 rows with 3 rows for each bone.
//! Captured vertex buffers contain the unskinned bind pose,
//! so the vertex shader math is applied here to recover the posed vertices.
//!
//! The blended 4x3 matrix can be interpreted as row major or column major.
//! These use separate formulas in [skin_position] and [skin_normal]
//! to match the arithmetic used by the shader code.
use glam::{Vec3, Vec4};

use crate::vertex::{pack_normal, unpack_normal};

/// The number of vertices with detailed values in [SkinningDebug].
pub const DEBUG_VERTEX_COUNT: usize = 10;

/// The number of skeleton rows included in [SkinningDebug].
pub const DEBUG_SKELETON_ROWS: usize = 48;

/// The 4 bone indices and normalized weights for a vertex.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BoneInfluence {
    pub indices: [u8; 4],
    /// Weights that sum to 1.0.
    pub weights: Vec4,
}

impl BoneInfluence {
    /// Normalize unsigned byte weights by their sum.
    /// Zero weights assign the full weight to the first bone.
    pub fn new(indices: [u8; 4], weights: [u8; 4]) -> Self {
        let total: u32 = weights.iter().map(|w| *w as u32).sum();
        let weights = if total > 0 {
            Vec4::from_array(weights.map(|w| w as f32)) / total as f32
        } else {
            Vec4::X
        };
        Self { indices, weights }
    }
}

/// Decode influences from a buffer with 4 weight bytes followed by 4 index bytes for each vertex.
pub fn read_bone_influences(buffer: &[u8], vertex_count: usize) -> Vec<BoneInfluence> {
    buffer
        .chunks_exact(8)
        .take(vertex_count)
        .map(|v| {
            BoneInfluence::new(
                [v[4], v[5], v[6], v[7]],
                [v[0], v[1], v[2], v[3]],
            )
        })
        .collect()
}

/// Flattened bone transforms with 3 float4 rows for each bone.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct SkeletonMatrixTable {
    pub rows: Vec<Vec4>,
}

impl SkeletonMatrixTable {
    /// Decode all complete float4 rows from a constant buffer.
    pub fn from_bytes(buffer: &[u8]) -> Self {
        let rows = buffer
            .chunks_exact(16)
            .map(|row| {
                let mut values = [0.0; 4];
                for (value, bytes) in values.iter_mut().zip(row.chunks_exact(4)) {
                    *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
                Vec4::from_array(values)
            })
            .collect();
        Self { rows }
    }

    /// The row at `index` or zero if out of range.
    pub fn row(&self, index: usize) -> Vec4 {
        self.rows.get(index).copied().unwrap_or(Vec4::ZERO)
    }

    pub fn bone_count(&self) -> usize {
        self.rows.len() / 3
    }

    /// The 3 rows of the transform for `bone`.
    pub fn bone(&self, bone: usize) -> BoneMatrix {
        BoneMatrix {
            rows: [
                self.row(bone * 3),
                self.row(bone * 3 + 1),
                self.row(bone * 3 + 2),
            ],
        }
    }
}

/// A 4x3 affine transform stored as 3 float4 rows.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BoneMatrix {
    pub rows: [Vec4; 3],
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum MatrixLayout {
    /// Each row contains the rotation and scale for one axis with translation in w.
    #[default]
    RowMajor,
    /// Each row contains one column of the rotation with translation in w.
    ColumnMajor,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct SkinningOptions {
    pub matrix_layout: MatrixLayout,
    /// Record intermediate values in [SkinnedVertices::debug].
    pub debug_output: bool,
}

/// Weighted sum of the transforms for the influencing bones.
pub fn blend_bone_matrices(influence: &BoneInfluence, skeleton: &SkeletonMatrixTable) -> BoneMatrix {
    let w = influence.weights;
    let bones = influence.indices.map(|i| i as usize * 3);
    let blend_row = |r: usize| {
        skeleton.row(bones[0] + r) * w.x
            + skeleton.row(bones[1] + r) * w.y
            + skeleton.row(bones[2] + r) * w.z
            + skeleton.row(bones[3] + r) * w.w
    };
    BoneMatrix {
        rows: [blend_row(0), blend_row(1), blend_row(2)],
    }
}

/// Transform `position` including the translation.
pub fn skin_position(position: Vec3, matrix: &BoneMatrix, layout: MatrixLayout) -> Vec3 {
    let [m0, m1, m2] = matrix.rows;
    let p = position;
    match layout {
        MatrixLayout::RowMajor => Vec3::new(
            m0.x * p.x + m0.y * p.y + m0.z * p.z + m0.w,
            m1.x * p.x + m1.y * p.y + m1.z * p.z + m1.w,
            m2.x * p.x + m2.y * p.y + m2.z * p.z + m2.w,
        ),
        MatrixLayout::ColumnMajor => Vec3::new(
            m0.x * p.x + m1.x * p.y + m2.x * p.z + m0.w,
            m0.y * p.x + m1.y * p.y + m2.y * p.z + m1.w,
            m0.z * p.x + m1.z * p.y + m2.z * p.z + m2.w,
        ),
    }
}

/// Rotate a `normal` stored as unsigned bytes and return the result as unsigned bytes.
pub fn skin_normal(normal: Vec3, matrix: &BoneMatrix, layout: MatrixLayout) -> Vec3 {
    let [m0, m1, m2] = matrix.rows;
    let n = unpack_normal(normal);
    let transformed = match layout {
        MatrixLayout::RowMajor => Vec3::new(
            m0.x * n.x + m0.y * n.y + m0.z * n.z,
            m1.x * n.x + m1.y * n.y + m1.z * n.z,
            m2.x * n.x + m2.y * n.y + m2.z * n.z,
        ),
        MatrixLayout::ColumnMajor => Vec3::new(
            m0.x * n.x + m1.x * n.y + m2.x * n.z,
            m0.y * n.x + m1.y * n.y + m2.y * n.z,
            m0.z * n.x + m1.z * n.y + m2.z * n.z,
        ),
    };

    // Avoid dividing by values close to zero.
    let length = transformed.length();
    let transformed = if length > 0.0001 {
        transformed / length
    } else {
        transformed
    };
    pack_normal(transformed)
}

#[derive(Debug, PartialEq, Clone)]
pub struct SkinnedVertices {
    pub positions: Vec<Vec3>,
    /// Unsigned bytes in the range `0.0` to `255.0`.
    pub normals: Vec<Vec3>,
    pub debug: Option<SkinningDebug>,
}

/// Skin vertices that have an influence.
/// The remaining vertices are returned unmodified.
pub fn apply_skinning(
    positions: &[Vec3],
    normals: &[Vec3],
    influences: &[BoneInfluence],
    skeleton: &SkeletonMatrixTable,
    options: &SkinningOptions,
) -> SkinnedVertices {
    let layout = options.matrix_layout;
    let skinned_count = positions.len().min(influences.len());

    let mut debug = options.debug_output.then(|| SkinningDebug {
        row_major: layout == MatrixLayout::RowMajor,
        skeleton_data_count: skeleton.rows.len(),
        skeleton_data: skeleton
            .rows
            .iter()
            .take(DEBUG_SKELETON_ROWS)
            .map(|r| r.to_array())
            .collect(),
        vertices: Vec::new(),
    });

    let mut skinned_positions = positions.to_vec();
    let mut skinned_normals = normals.to_vec();

    for i in 0..skinned_count {
        let influence = &influences[i];
        let matrix = blend_bone_matrices(influence, skeleton);

        skinned_positions[i] = skin_position(positions[i], &matrix, layout);
        if let Some(normal) = normals.get(i) {
            skinned_normals[i] = skin_normal(*normal, &matrix, layout);
        }

        if let Some(debug) = debug.as_mut().filter(|_| i < DEBUG_VERTEX_COUNT) {
            debug.vertices.push(VertexSkinningDebug {
                vertex_index: i,
                original_position: positions[i].to_array(),
                skinned_position: skinned_positions[i].to_array(),
                original_normal: normals.get(i).map(|n| n.to_array()),
                skinned_normal: skinned_normals.get(i).map(|n| n.to_array()),
                weights: influence.weights.to_array(),
                indices: influence.indices,
                bone_rows: influence.indices.map(|b| {
                    skeleton.bone(b as usize).rows.map(|r| r.to_array())
                }),
                blended_matrix: matrix.rows.map(|r| r.to_array()),
            });
        }
    }

    SkinnedVertices {
        positions: skinned_positions,
        normals: skinned_normals,
        debug,
    }
}

/// Intermediate skinning values for checking the matrix layout and bone indexing.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct SkinningDebug {
    pub row_major: bool,
    pub skeleton_data_count: usize,
    pub skeleton_data: Vec<[f32; 4]>,
    pub vertices: Vec<VertexSkinningDebug>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct VertexSkinningDebug {
    pub vertex_index: usize,
    pub original_position: [f32; 3],
    pub skinned_position: [f32; 3],
    pub original_normal: Option<[f32; 3]>,
    pub skinned_normal: Option<[f32; 3]>,
    pub weights: [f32; 4],
    pub indices: [u8; 4],
    /// The 3 skeleton rows for each influencing bone.
    pub bone_rows: [[[f32; 4]; 3]; 4],
    pub blended_matrix: [[f32; 4]; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::relative_eq;
    use hexlit::hex;
    use pretty_assertions::assert_eq;

    macro_rules! assert_vec3_relative_eq {
        ($a:expr, $b:expr) => {
            assert!(
                $a.to_array()
                    .iter()
                    .zip($b.to_array().iter())
                    .all(|(a, b)| relative_eq!(a, b, epsilon = 0.0001f32)),
                "Vectors not equal to within 0.0001.\nleft = {:?}\nright = {:?}",
                $a,
                $b
            )
        };
    }

    fn identity_skeleton(bone_count: usize) -> SkeletonMatrixTable {
        SkeletonMatrixTable {
            rows: (0..bone_count)
                .flat_map(|_| [Vec4::X, Vec4::Y, Vec4::Z])
                .collect(),
        }
    }

    fn translation_skeleton() -> SkeletonMatrixTable {
        // bone 0 translates by (1, 2, 3), bone 1 by (-1, 0, 5)
        SkeletonMatrixTable {
            rows: vec![
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 1.0, 0.0, 2.0),
                Vec4::new(0.0, 0.0, 1.0, 3.0),
                Vec4::new(1.0, 0.0, 0.0, -1.0),
                Vec4::new(0.0, 1.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 1.0, 5.0),
            ],
        }
    }

    #[test]
    fn normalize_weights() {
        let influence = BoneInfluence::new([0, 1, 2, 3], [255, 0, 0, 0]);
        assert_eq!(Vec4::X, influence.weights);

        let influence = BoneInfluence::new([0, 1, 2, 3], [128, 64, 32, 32]);
        assert_eq!(Vec4::new(0.5, 0.25, 0.125, 0.125), influence.weights);

        for weights in [[1, 2, 3, 4], [255, 255, 255, 255], [7, 0, 13, 200]] {
            let influence = BoneInfluence::new([0; 4], weights);
            assert!(relative_eq!(
                1.0,
                influence.weights.element_sum(),
                epsilon = 0.0001
            ));
        }
    }

    #[test]
    fn normalize_zero_weights() {
        let influence = BoneInfluence::new([5, 6, 7, 8], [0, 0, 0, 0]);
        assert_eq!(Vec4::new(1.0, 0.0, 0.0, 0.0), influence.weights);
        assert_eq!([5, 6, 7, 8], influence.indices);
    }

    #[test]
    fn read_influences() {
        let data = hex!(
            // weights, indices
            0x80404000 0x00010203
            0x00000000 0x04000000
            // partial vertex
            0xff00
        );
        assert_eq!(
            vec![
                BoneInfluence {
                    indices: [0, 1, 2, 3],
                    weights: Vec4::new(0.5, 0.25, 0.25, 0.0)
                },
                BoneInfluence {
                    indices: [4, 0, 0, 0],
                    weights: Vec4::X
                }
            ],
            read_bone_influences(&data, 3)
        );
        assert_eq!(1, read_bone_influences(&data, 1).len());
    }

    #[test]
    fn skeleton_from_bytes() {
        let data = hex!(
            0x0000803f 0x00000000 0x00000000 0x00000040
            0x00000000 0x0000803f
        );
        let skeleton = SkeletonMatrixTable::from_bytes(&data);
        assert_eq!(vec![Vec4::new(1.0, 0.0, 0.0, 2.0)], skeleton.rows);
        assert_eq!(Vec4::ZERO, skeleton.row(1));
        assert_eq!(0, skeleton.bone_count());
    }

    #[test]
    fn skeleton_768_bytes() {
        let skeleton = SkeletonMatrixTable::from_bytes(&[0u8; 768]);
        assert_eq!(48, skeleton.rows.len());
        assert_eq!(16, skeleton.bone_count());
    }

    #[test]
    fn blend_out_of_range_bones() {
        let skeleton = identity_skeleton(1);
        let influence = BoneInfluence::new([0, 200, 0, 0], [1, 1, 0, 0]);
        assert_eq!(
            BoneMatrix {
                rows: [
                    Vec4::new(0.5, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, 0.5, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, 0.5, 0.0)
                ]
            },
            blend_bone_matrices(&influence, &skeleton)
        );
    }

    #[test]
    fn identity_single_bone() {
        let skeleton = identity_skeleton(4);
        let influence = BoneInfluence::new([2, 0, 0, 0], [255, 0, 0, 0]);
        let matrix = blend_bone_matrices(&influence, &skeleton);

        let position = Vec3::new(1.5, -2.25, 8.0);
        assert_eq!(position, skin_position(position, &matrix, MatrixLayout::RowMajor));
        assert_eq!(
            position,
            skin_position(position, &matrix, MatrixLayout::ColumnMajor)
        );
    }

    #[test]
    fn blend_translations() {
        let skeleton = translation_skeleton();
        let influence = BoneInfluence::new([0, 1, 0, 0], [1, 1, 0, 0]);
        let matrix = blend_bone_matrices(&influence, &skeleton);
        assert_vec3_relative_eq!(
            Vec3::new(0.0, 1.0, 4.0),
            skin_position(Vec3::ZERO, &matrix, MatrixLayout::RowMajor)
        );
    }

    #[test]
    fn skin_position_row_major() {
        // Rotate 90 degrees around Z and translate.
        let matrix = BoneMatrix {
            rows: [
                Vec4::new(0.0, -1.0, 0.0, 10.0),
                Vec4::new(1.0, 0.0, 0.0, 20.0),
                Vec4::new(0.0, 0.0, 1.0, 30.0),
            ],
        };
        assert_eq!(
            Vec3::new(8.0, 21.0, 33.0),
            skin_position(Vec3::new(1.0, 2.0, 3.0), &matrix, MatrixLayout::RowMajor)
        );
    }

    #[test]
    fn skin_position_column_major() {
        let matrix = BoneMatrix {
            rows: [
                Vec4::new(0.0, -1.0, 0.0, 10.0),
                Vec4::new(1.0, 0.0, 0.0, 20.0),
                Vec4::new(0.0, 0.0, 1.0, 30.0),
            ],
        };
        // The rotation is transposed but the translation is the same.
        assert_eq!(
            Vec3::new(12.0, 19.0, 33.0),
            skin_position(Vec3::new(1.0, 2.0, 3.0), &matrix, MatrixLayout::ColumnMajor)
        );
    }

    #[test]
    fn skin_normal_identity() {
        let matrix = identity_skeleton(1).bone(0);
        // (255, 127.5, 127.5) is (1, 0, 0).
        let normal = Vec3::new(255.0, 127.5, 127.5);
        assert_vec3_relative_eq!(normal, skin_normal(normal, &matrix, MatrixLayout::RowMajor));
        assert_vec3_relative_eq!(
            normal,
            skin_normal(normal, &matrix, MatrixLayout::ColumnMajor)
        );
    }

    #[test]
    fn skin_normal_ignores_translation() {
        let matrix = translation_skeleton().bone(1);
        let normal = Vec3::new(127.5, 255.0, 127.5);
        assert_vec3_relative_eq!(normal, skin_normal(normal, &matrix, MatrixLayout::RowMajor));
    }

    #[test]
    fn skin_normal_layouts() {
        let matrix = BoneMatrix {
            rows: [
                Vec4::new(0.0, -1.0, 0.0, 0.0),
                Vec4::new(1.0, 0.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 1.0, 0.0),
            ],
        };
        // +X rotates to +Y for row major and -Y for column major.
        let normal = Vec3::new(255.0, 127.5, 127.5);
        assert_vec3_relative_eq!(
            Vec3::new(127.5, 255.0, 127.5),
            skin_normal(normal, &matrix, MatrixLayout::RowMajor)
        );
        assert_vec3_relative_eq!(
            Vec3::new(127.5, 0.0, 127.5),
            skin_normal(normal, &matrix, MatrixLayout::ColumnMajor)
        );
    }

    #[test]
    fn skin_normal_renormalized() {
        let matrix = BoneMatrix {
            rows: [
                Vec4::new(2.0, 0.0, 0.0, 0.0),
                Vec4::new(0.0, 2.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 2.0, 0.0),
            ],
        };
        let normal = Vec3::new(127.5, 127.5, 255.0);
        assert_vec3_relative_eq!(normal, skin_normal(normal, &matrix, MatrixLayout::RowMajor));
    }

    #[test]
    fn skin_normal_zero_matrix() {
        // Short normals are not normalized.
        let matrix = BoneMatrix {
            rows: [Vec4::ZERO; 3],
        };
        assert_vec3_relative_eq!(
            Vec3::splat(127.5),
            skin_normal(Vec3::new(255.0, 0.0, 255.0), &matrix, MatrixLayout::RowMajor)
        );
    }

    #[test]
    fn apply_skinning_partial_influences() {
        let skeleton = translation_skeleton();
        let positions = [Vec3::ZERO, Vec3::ONE, Vec3::ONE];
        let normals = [Vec3::new(127.5, 255.0, 127.5)];
        let influences = [
            BoneInfluence::new([0, 0, 0, 0], [1, 0, 0, 0]),
            BoneInfluence::new([1, 0, 0, 0], [1, 0, 0, 0]),
        ];

        let skinned = apply_skinning(
            &positions,
            &normals,
            &influences,
            &skeleton,
            &SkinningOptions::default(),
        );
        assert_eq!(
            vec![
                Vec3::new(1.0, 2.0, 3.0),
                Vec3::new(0.0, 1.0, 6.0),
                Vec3::ONE
            ],
            skinned.positions
        );
        assert_eq!(1, skinned.normals.len());
        assert_vec3_relative_eq!(normals[0], skinned.normals[0]);
        assert_eq!(None, skinned.debug);
    }

    #[test]
    fn apply_skinning_debug() {
        let skeleton = identity_skeleton(16);
        let positions = vec![Vec3::ONE; 12];
        let influences = vec![BoneInfluence::new([3, 0, 0, 0], [1, 0, 0, 0]); 12];

        let skinned = apply_skinning(
            &positions,
            &[],
            &influences,
            &skeleton,
            &SkinningOptions {
                matrix_layout: MatrixLayout::ColumnMajor,
                debug_output: true,
            },
        );

        let debug = skinned.debug.unwrap();
        assert!(!debug.row_major);
        assert_eq!(48, debug.skeleton_data_count);
        assert_eq!(48, debug.skeleton_data.len());
        assert_eq!(DEBUG_VERTEX_COUNT, debug.vertices.len());

        let vertex = &debug.vertices[0];
        assert_eq!([3, 0, 0, 0], vertex.indices);
        assert_eq!([1.0, 0.0, 0.0, 0.0], vertex.bone_rows[0][0]);
        assert_eq!([0.0, 0.0, 1.0, 0.0], vertex.blended_matrix[2]);
        assert_eq!([1.0; 3], vertex.skinned_position);
        assert_eq!(None, vertex.skinned_normal);
    }
}
