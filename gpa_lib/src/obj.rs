//! Wavefront OBJ text for triangle meshes.
//!
//! Faces use 1-based indices and reference the texture coordinates and normals
//! with the same index as the position when those attributes are present.
use std::io::Write;

use glam::{Vec2, Vec3};

/// Attributes for a single OBJ object.
/// Texture coordinates and normals are either empty or one per position.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ObjMesh {
    /// Lines written as `# ...` comments at the start of the file.
    pub comments: Vec<String>,
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Normals in the range `-1.0` to `1.0`.
    pub normals: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl ObjMesh {
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for comment in &self.comments {
            writeln!(writer, "# {comment}")?;
        }
        writeln!(writer)?;

        for v in &self.positions {
            writeln!(writer, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
        }
        writeln!(writer)?;

        if !self.uvs.is_empty() {
            for vt in &self.uvs {
                writeln!(writer, "vt {:.6} {:.6}", vt.x, vt.y)?;
            }
            writeln!(writer)?;
        }

        if !self.normals.is_empty() {
            for vn in &self.normals {
                writeln!(writer, "vn {:.6} {:.6} {:.6}", vn.x, vn.y, vn.z)?;
            }
            writeln!(writer)?;
        }

        let has_uvs = !self.uvs.is_empty();
        let has_normals = !self.normals.is_empty();
        for [i0, i1, i2] in &self.triangles {
            let [a, b, c] = [i0 + 1, i1 + 1, i2 + 1];
            match (has_uvs, has_normals) {
                (true, true) => writeln!(writer, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?,
                (true, false) => writeln!(writer, "f {a}/{a} {b}/{b} {c}/{c}")?,
                (false, true) => writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?,
                (false, false) => writeln!(writer, "f {a} {b} {c}")?,
            }
        }

        Ok(())
    }

    pub fn to_text(&self) -> std::io::Result<String> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()
    }
}
