//! Typed views of the JSON descriptions returned by a [CaptureHost](crate::capture::CaptureHost).
//!
//! Numeric fields may be given as JSON numbers or as numeric strings.
//! Optional fields use the same defaults as the debugger when missing.
use std::collections::BTreeMap;

use gpa_lib::index::DrawParams;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{capture::ShaderBlob, error::DescriptorError};

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ViewType {
    Srv,
    Rtv,
    Dsv,
    Uav,
    Vbv,
    Ibv,
    Cbv,
    Other(String),
}

impl ViewType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "SRV" => Self::Srv,
            "RTV" => Self::Rtv,
            "DSV" => Self::Dsv,
            "UAV" => Self::Uav,
            "VBV" => Self::Vbv,
            "IBV" => Self::Ibv,
            "CBV" => Self::Cbv,
            _ => Self::Other(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Srv => "SRV",
            Self::Rtv => "RTV",
            Self::Dsv => "DSV",
            Self::Uav => "UAV",
            Self::Vbv => "VBV",
            Self::Ibv => "IBV",
            Self::Cbv => "CBV",
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TextureDescriptor {
    pub resource_id: u64,
    pub view_type: ViewType,
    /// `-1` if the view is not known.
    pub view_id: i64,
    pub format: String,
    pub mips: Vec<MipLevel>,
    pub first_mip: u32,
    pub first_slice: u32,
    /// The size in bytes of a row if rows are padded.
    pub row_pitch: Option<usize>,
}

impl TextureDescriptor {
    /// The dimensions of the base level if non zero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.mips
            .first()
            .filter(|m| m.width > 0 && m.height > 0)
            .map(|m| (m.width, m.height))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct BufferDescriptor {
    pub resource_id: u64,
    pub view_type: ViewType,
    pub view_id: i64,
    pub size: u64,
    pub stride: usize,
    pub offset: u64,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResourceDescriptor {
    Texture(TextureDescriptor),
    Buffer(BufferDescriptor),
}

impl ResourceDescriptor {
    pub fn from_json(value: &Value) -> Result<Self, DescriptorError> {
        let object = as_object(value)?;

        let resource_id = required(object, "resource_id", as_u64)?;
        let view_type = ViewType::from_name(
            object
                .get("view_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        );
        let view_id = optional(object, "view_id", as_i64)?.unwrap_or(-1);

        match object.get("resource_type").and_then(Value::as_str) {
            Some("texture") => {
                let mips = match object.get("mips") {
                    Some(Value::Array(mips)) => mips
                        .iter()
                        .map(|m| -> Result<MipLevel, DescriptorError> {
                            let mip = as_object(m)?;
                            Ok(MipLevel {
                                width: optional(mip, "width", as_u32)?.unwrap_or_default(),
                                height: optional(mip, "height", as_u32)?.unwrap_or_default(),
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => Vec::new(),
                };

                Ok(Self::Texture(TextureDescriptor {
                    resource_id,
                    view_type,
                    view_id,
                    format: object
                        .get("format")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                    mips,
                    first_mip: optional(object, "first_mip", as_u32)?.unwrap_or_default(),
                    first_slice: optional(object, "first_slice", as_u32)?.unwrap_or_default(),
                    row_pitch: optional(object, "row_pitch", as_usize)?,
                }))
            }
            Some("buffer") => Ok(Self::Buffer(BufferDescriptor {
                resource_id,
                view_type,
                view_id,
                size: optional(object, "size", as_u64)?.unwrap_or_default(),
                stride: optional(object, "stride", as_usize)?.unwrap_or_default(),
                offset: optional(object, "offset", as_u64)?.unwrap_or_default(),
            })),
            other => Err(DescriptorError::UnsupportedResourceType(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn resource_id(&self) -> u64 {
        match self {
            Self::Texture(t) => t.resource_id,
            Self::Buffer(b) => b.resource_id,
        }
    }
}

/// A named argument of an API call.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct CallArgument {
    pub name: String,
    pub value: Value,
}

impl CallArgument {
    pub fn as_i64(&self) -> Option<i64> {
        as_i64(&self.value)
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct CallDescriptor {
    pub id: Option<u64>,
    pub name: String,
    /// `true` for draws and dispatches.
    pub is_event: bool,
    pub arguments: Vec<CallArgument>,
}

impl CallDescriptor {
    pub fn from_json(value: &Value) -> Result<Self, DescriptorError> {
        let object = as_object(value)?;

        let arguments = match object.get("arguments") {
            Some(Value::Array(arguments)) => arguments
                .iter()
                .filter_map(|a| {
                    Some(CallArgument {
                        name: a.get("name")?.as_str()?.to_string(),
                        value: a.get("value").cloned().unwrap_or_default(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            id: optional(object, "id", as_u64)?,
            name: object
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            is_event: object
                .get("is_event")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            arguments,
        })
    }

    /// The first argument with exactly this `name`.
    pub fn argument(&self, name: &str) -> Option<&CallArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// The index window and base vertex for an indexed or non indexed draw.
    /// Arguments without an integer value are ignored.
    pub fn draw_params(&self) -> DrawParams {
        DrawParams::from_arguments(
            self.arguments
                .iter()
                .filter_map(|a| Some((a.name.as_str(), a.as_i64()?))),
        )
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl ShaderStage {
    pub const ALL: [Self; 6] = [
        Self::Vertex,
        Self::Pixel,
        Self::Geometry,
        Self::Hull,
        Self::Domain,
        Self::Compute,
    ];

    /// The key for this stage in program descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
            Self::Geometry => "geometry",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Compute => "compute",
        }
    }

    /// The file name prefix like `"vs"` for vertex shaders.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Vertex => "vs",
            Self::Pixel => "ps",
            Self::Geometry => "gs",
            Self::Hull => "hs",
            Self::Domain => "ds",
            Self::Compute => "cs",
        }
    }
}

/// The code for a single stage of a program.
/// Empty fields are stored as `None`.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct StageDescriptor {
    pub source: Option<String>,
    pub dxbc: Option<ShaderBlob>,
    pub dxil: Option<ShaderBlob>,
    pub hash: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProgramDescriptor {
    /// The id as written by the host.
    pub id: String,
    pub stages: BTreeMap<ShaderStage, StageDescriptor>,
}

impl ProgramDescriptor {
    pub fn from_json(value: &Value) -> Result<Self, DescriptorError> {
        let object = as_object(value)?;

        let id = match object.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };

        let mut stages = BTreeMap::new();
        for stage in ShaderStage::ALL {
            if let Some(stage_value) = object.get(stage.name()) {
                let stage_object = as_object(stage_value)?;
                stages.insert(
                    stage,
                    StageDescriptor {
                        source: stage_object
                            .get("source")
                            .and_then(Value::as_str)
                            .filter(|s| !s.is_empty())
                            .map(ToString::to_string),
                        dxbc: blob(stage_object, "dxbc"),
                        dxil: blob(stage_object, "dxil"),
                        hash: match stage_object.get("hash") {
                            Some(Value::String(s)) => s.clone(),
                            Some(Value::Number(n)) => n.to_string(),
                            _ => String::new(),
                        },
                    },
                );
            }
        }

        Ok(Self { id, stages })
    }

    /// Numeric ids in uppercase hexadecimal and other ids unchanged.
    pub fn id_hex(&self) -> String {
        match self.id.parse::<u64>() {
            Ok(id) => format!("{id:X}"),
            Err(_) => self.id.clone(),
        }
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&StageDescriptor> {
        self.stages.get(&stage)
    }
}

/// A vertex buffer assigned to the input assembler.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GeometryVertexBuffer {
    pub buffer: u64,
    /// The input layout element name like `"POSITION"`.
    pub layout_name: String,
}

/// The input assembler state of a draw.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct GeometryInfo {
    pub index_buffer: Option<u64>,
    pub vertex_buffers: Vec<GeometryVertexBuffer>,
}

impl GeometryInfo {
    pub fn from_json(value: &Value) -> Result<Self, DescriptorError> {
        let object = as_object(value)?;

        let vertex_buffers = match object.get("vertex_buffers") {
            Some(Value::Array(buffers)) => buffers
                .iter()
                .filter_map(|b| {
                    Some(GeometryVertexBuffer {
                        buffer: as_u64(b.get("buffer")?)?,
                        layout_name: b
                            .get("layout")
                            .and_then(|l| l.get("name"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            index_buffer: optional(object, "index_buffer", as_u64)?,
            vertex_buffers,
        })
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, DescriptorError> {
    value
        .as_object()
        .ok_or_else(|| DescriptorError::NotAnObject(value.to_string()))
}

fn optional<T>(
    object: &Map<String, Value>,
    field: &'static str,
    parse: fn(&Value) -> Option<T>,
) -> Result<Option<T>, DescriptorError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| DescriptorError::InvalidField {
                field,
                value: value.to_string(),
            }),
    }
}

fn required<T>(
    object: &Map<String, Value>,
    field: &'static str,
    parse: fn(&Value) -> Option<T>,
) -> Result<T, DescriptorError> {
    optional(object, field, parse)?.ok_or(DescriptorError::MissingField(field))
}

fn blob(object: &Map<String, Value>, field: &str) -> Option<ShaderBlob> {
    object
        .get(field)
        .and_then(|v| ShaderBlob::deserialize(v).ok())
        .filter(|b| !b.is_empty())
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    as_i64(value).and_then(|v| u64::try_from(v).ok())
}

fn as_u32(value: &Value) -> Option<u32> {
    as_i64(value).and_then(|v| u32::try_from(v).ok())
}

fn as_usize(value: &Value) -> Option<usize> {
    as_i64(value).and_then(|v| usize::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn texture_descriptor() {
        let value = json!({
            "resource_type": "texture",
            "resource_id": 989,
            "view_type": "SRV",
            "view_id": 0,
            "format": "BC7_UNORM_SRGB",
            "mips": [{"width": 256, "height": "128"}, {"width": 128, "height": 64}],
            "first_mip": 1,
            "first_slice": "2"
        });
        assert_eq!(
            ResourceDescriptor::Texture(TextureDescriptor {
                resource_id: 989,
                view_type: ViewType::Srv,
                view_id: 0,
                format: "BC7_UNORM_SRGB".to_string(),
                mips: vec![
                    MipLevel {
                        width: 256,
                        height: 128
                    },
                    MipLevel {
                        width: 128,
                        height: 64
                    }
                ],
                first_mip: 1,
                first_slice: 2,
                row_pitch: None
            }),
            ResourceDescriptor::from_json(&value).unwrap()
        );
    }

    #[test]
    fn texture_defaults() {
        let value = json!({"resource_type": "texture", "resource_id": "12"});
        let ResourceDescriptor::Texture(texture) = ResourceDescriptor::from_json(&value).unwrap()
        else {
            panic!("expected a texture");
        };
        assert_eq!(12, texture.resource_id);
        assert_eq!(ViewType::Other("unknown".to_string()), texture.view_type);
        assert_eq!(-1, texture.view_id);
        assert_eq!("unknown", texture.format);
        assert_eq!(None, texture.dimensions());
    }

    #[test]
    fn empty_base_level() {
        let value = json!({
            "resource_type": "texture",
            "resource_id": 1,
            "mips": [{"width": 0, "height": 4}]
        });
        let ResourceDescriptor::Texture(texture) = ResourceDescriptor::from_json(&value).unwrap()
        else {
            panic!("expected a texture");
        };
        assert_eq!(None, texture.dimensions());
    }

    #[test]
    fn buffer_descriptor() {
        let value = json!({
            "resource_type": "buffer",
            "resource_id": 4660,
            "view_type": "VBV",
            "size": 768,
            "stride": 24,
            "offset": 48
        });
        assert_eq!(
            ResourceDescriptor::Buffer(BufferDescriptor {
                resource_id: 4660,
                view_type: ViewType::Vbv,
                view_id: -1,
                size: 768,
                stride: 24,
                offset: 48
            }),
            ResourceDescriptor::from_json(&value).unwrap()
        );
    }

    #[test]
    fn resource_errors() {
        assert!(matches!(
            ResourceDescriptor::from_json(&json!({"resource_type": "sampler", "resource_id": 1})),
            Err(DescriptorError::UnsupportedResourceType(t)) if t == "sampler"
        ));
        assert!(matches!(
            ResourceDescriptor::from_json(&json!({"resource_type": "buffer"})),
            Err(DescriptorError::MissingField("resource_id"))
        ));
        assert!(matches!(
            ResourceDescriptor::from_json(&json!({"resource_type": "buffer", "resource_id": 1, "stride": "wide"})),
            Err(DescriptorError::InvalidField { field: "stride", .. })
        ));
        assert!(matches!(
            ResourceDescriptor::from_json(&json!([1, 2])),
            Err(DescriptorError::NotAnObject(_))
        ));
    }

    #[test]
    fn view_type_names() {
        for name in ["SRV", "RTV", "DSV", "UAV", "VBV", "IBV", "CBV", "SOV"] {
            assert_eq!(name, ViewType::from_name(name).name());
        }
    }

    #[test]
    fn call_draw_params() {
        let value = json!({
            "id": 1234,
            "name": "DrawIndexed",
            "is_event": true,
            "arguments": [
                {"name": "IndexCount", "type": "UINT", "value": 36},
                {"name": "StartIndexLocation", "value": "6"},
                {"name": "BaseVertexLocation", "value": -4},
                {"name": "pContext", "value": "0x1f"},
                {"value": 7}
            ]
        });
        let call = CallDescriptor::from_json(&value).unwrap();
        assert_eq!(Some(1234), call.id);
        assert_eq!("DrawIndexed", call.name);
        assert!(call.is_event);
        assert_eq!(4, call.arguments.len());
        assert_eq!(
            DrawParams {
                index_count: 36,
                start_index_location: 6,
                base_vertex_location: -4
            },
            call.draw_params()
        );
        assert_eq!(Some(36), call.argument("IndexCount").and_then(|a| a.as_i64()));
        assert_eq!(None, call.argument("indexcount"));
    }

    #[test]
    fn call_defaults() {
        let call = CallDescriptor::from_json(&json!({"name": "PSSetShaderResources"})).unwrap();
        assert_eq!(None, call.id);
        assert!(!call.is_event);
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn program_descriptor() {
        let value = json!({
            "id": 255,
            "vertex": {"source": "float4 main() : SV_Position { return 0; }", "hash": "abc"},
            "pixel": {"source": "", "dxbc": "ps_5_0\nret", "dxil": [1, 2, 3], "hash": 17}
        });
        let program = ProgramDescriptor::from_json(&value).unwrap();
        assert_eq!("255", program.id);
        assert_eq!("FF", program.id_hex());

        let vertex = program.stage(ShaderStage::Vertex).unwrap();
        assert_eq!("abc", vertex.hash);
        assert!(vertex.source.is_some());
        assert_eq!(None, vertex.dxbc);

        let pixel = program.stage(ShaderStage::Pixel).unwrap();
        assert_eq!(None, pixel.source);
        assert_eq!("17", pixel.hash);
        assert_eq!(Some(ShaderBlob::Text("ps_5_0\nret".to_string())), pixel.dxbc);
        assert_eq!(Some(ShaderBlob::Bytes(vec![1, 2, 3])), pixel.dxil);

        assert_eq!(None, program.stage(ShaderStage::Compute));
    }

    #[test]
    fn program_id_not_numeric() {
        let program = ProgramDescriptor::from_json(&json!({"id": "prog_a"})).unwrap();
        assert_eq!("prog_a", program.id_hex());

        let program = ProgramDescriptor::from_json(&json!({})).unwrap();
        assert_eq!("unknown", program.id_hex());
    }

    #[test]
    fn geometry_info() {
        let value = json!({
            "index_buffer": "77",
            "vertex_buffers": [
                {"buffer": 80, "layout": {"name": "POSITION"}},
                {"buffer": "81"},
                {"layout": {"name": "TEXCOORD"}}
            ]
        });
        assert_eq!(
            GeometryInfo {
                index_buffer: Some(77),
                vertex_buffers: vec![
                    GeometryVertexBuffer {
                        buffer: 80,
                        layout_name: "POSITION".to_string()
                    },
                    GeometryVertexBuffer {
                        buffer: 81,
                        layout_name: String::new()
                    }
                ]
            },
            GeometryInfo::from_json(&value).unwrap()
        );
    }

    #[test]
    fn numeric_values() {
        assert_eq!(Some(3), as_i64(&json!(3)));
        assert_eq!(Some(-3), as_i64(&json!("-3")));
        assert_eq!(Some(4), as_i64(&json!(4.0)));
        assert_eq!(None, as_i64(&json!(4.5)));
        assert_eq!(None, as_i64(&json!(true)));
        assert_eq!(None, as_u64(&json!(-1)));
    }
}
