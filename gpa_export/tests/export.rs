use std::path::Path;

use gpa_export::{
    EventRange, ExportOptions,
    bindings::{BindingDirection, ResourceSlotBinding},
    capture_file::JsonCapture,
    event::ExportedTexture,
    export_frame,
};
use gpa_lib::skinning::SkinningOptions;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn vertex_bytes() -> Vec<u8> {
    // position, packed normal, texcoord
    let vertices: [([f32; 3], [f32; 2]); 3] = [
        ([0.0, 0.0, 0.0], [0.0, 0.0]),
        ([1.0, 0.0, 0.0], [1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 1.0]),
    ];
    let mut bytes = Vec::new();
    for (position, uv) in vertices {
        bytes.extend(f32_bytes(&position));
        bytes.extend([128, 128, 255, 0]);
        bytes.extend(f32_bytes(&uv));
    }
    bytes
}

fn identity_skeleton() -> Vec<u8> {
    (0..16)
        .flat_map(|_| {
            f32_bytes(&[
                1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            ])
        })
        .collect()
}

fn capture() -> JsonCapture {
    let capture = json!({
        "frame_metadata": { "framename": "C:/captures/scene.gpa_frame" },
        "calls": [
            {
                "description": {
                    "id": 1,
                    "name": "PSSetShaderResources",
                    "arguments": [
                        { "name": "StartSlot", "value": 2 },
                        { "name": "NumViews", "value": 1 },
                        { "name": "ppShaderResourceViews", "value": [{ "value": 100 }] }
                    ]
                }
            },
            {
                "description": {
                    "id": 2,
                    "name": "OMSetRenderTargets",
                    "arguments": [{ "name": "ppRenderTargetViews", "value": [200] }]
                }
            },
            {
                "description": {
                    "id": 3,
                    "name": "DrawIndexed",
                    "is_event": true,
                    "arguments": [
                        { "name": "IndexCount", "value": 3 },
                        { "name": "StartIndexLocation", "value": 0 },
                        { "name": "BaseVertexLocation", "value": 0 }
                    ]
                },
                "bindings": { "inputs": [0, 1, 2, 3, 4], "outputs": [5], "program": 0 }
            },
            {
                "description": {
                    "id": 4,
                    "name": "Draw",
                    "is_event": true,
                    "arguments": [{ "name": "VertexCount", "value": 3 }]
                },
                "bindings": {
                    "input_geometry": {
                        "vertex_buffers": [{ "buffer": 300, "layout": { "name": "POSITION" } }]
                    }
                }
            }
        ],
        "resources": [
            {
                "description": {
                    "resource_type": "texture",
                    "resource_id": 100,
                    "view_type": "SRV",
                    "view_id": 0,
                    "format": "R8G8B8A8_UNORM",
                    "mips": [{ "width": 2, "height": 2 }]
                },
                "data": vec![255u8; 16]
            },
            {
                "description": {
                    "resource_type": "buffer",
                    "resource_id": 101,
                    "view_type": "IBV",
                    "size": 6,
                    "stride": 2
                },
                "data": [0, 0, 1, 0, 2, 0]
            },
            {
                "description": {
                    "resource_type": "buffer",
                    "resource_id": 102,
                    "view_type": "VBV",
                    "size": 72,
                    "stride": 24
                },
                "data": vertex_bytes()
            },
            {
                "description": {
                    "resource_type": "buffer",
                    "resource_id": 103,
                    "view_type": "VBV",
                    "size": 24,
                    "stride": 8
                },
                "data": [255, 0, 0, 0, 0, 0, 0, 0,
                         255, 0, 0, 0, 0, 0, 0, 0,
                         255, 0, 0, 0, 0, 0, 0, 0]
            },
            {
                "description": {
                    "resource_type": "buffer",
                    "resource_id": 104,
                    "view_type": "CBV",
                    "size": 768
                },
                "data": identity_skeleton()
            },
            {
                "description": {
                    "resource_type": "texture",
                    "resource_id": 200,
                    "view_type": "RTV",
                    "view_id": 1,
                    "format": "R8G8B8A8_UNORM",
                    "mips": [{ "width": 2, "height": 2 }]
                },
                "data": vec![0u8; 16]
            },
            {
                "description": {
                    "resource_type": "buffer",
                    "resource_id": 300,
                    "view_type": "VBV",
                    "stride": 12
                },
                "data": f32_bytes(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0])
            }
        ],
        "programs": [
            {
                "description": {
                    "id": 26,
                    "vertex": { "source": "float4 main() : SV_Position { return 0; }", "hash": "0xABC" },
                    "pixel": {
                        "source": "float4 main() : SV_Target { return 1; }",
                        "dxbc": "// Resource Bindings:\n//\n// Name Type Format Dim HLSL Bind Count\n// ---- ---- ---- ---- ---- ----\n// sLinear sampler NA NA s0 1\n// tAlbedo texture float4 2d t2 1\n//\n"
                    }
                },
                "il": { "pixel.isa": "s_endpgm" }
            }
        ]
    });
    JsonCapture::from_json_str(&capture.to_string(), Path::new(".").to_path_buf()).unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn export_all_events() {
    let output = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        skinning: Some(SkinningOptions {
            debug_output: true,
            ..Default::default()
        }),
        ..ExportOptions::new(output.path())
    };

    let frame = export_frame(&capture(), &options).unwrap();
    assert!(
        frame
            .folder
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scene_")
    );
    assert_eq!(2, frame.events.len());

    let event = &frame.events[0];
    assert_eq!(1, event.index);
    assert_eq!(Some(3), event.id);
    assert_eq!("DrawIndexed", event.name);
    assert_eq!(None, event.error);
    assert!(event.skipped.is_empty(), "{:?}", event.skipped);

    assert_eq!(
        vec![
            ExportedTexture {
                direction: BindingDirection::Input,
                resource_id: 100,
                dxbc_name: Some("tAlbedo".to_string()),
                dxbc_slot: Some("t2".to_string()),
                order_index: Some(0),
                file: "input/t_tAlbedo_64.dds".to_string(),
            },
            ExportedTexture {
                direction: BindingDirection::Output,
                resource_id: 200,
                dxbc_name: None,
                dxbc_slot: None,
                order_index: None,
                file: "output/tex_C8.dds".to_string(),
            }
        ],
        event.exported_textures
    );
    assert_eq!(
        vec![
            "input/ibv_65.json",
            "input/vbv_vertex_66.json",
            "input/vbv_bone_67.json",
            "input/cbv_68.json"
        ],
        event
            .exported_buffers
            .iter()
            .map(|b| b.file.as_str())
            .collect::<Vec<_>>()
    );
    assert_eq!(
        vec![
            ("vertex", "input/vs_1A.hlsl"),
            ("pixel", "input/ps_1A.hlsl"),
            ("pixel_dxbc", "input/ps_1A.dxbc"),
            ("ps_texture_bindings", "input/ps_texture_bindings_1A.json"),
            ("pixel_isa", "input/ps_1A.isa"),
            ("info", "input/shader_info_1A.json"),
        ],
        event
            .exported_shaders
            .iter()
            .map(|s| (s.kind.as_str(), s.file.as_str()))
            .collect::<Vec<_>>()
    );
    assert_eq!(Some("input/g_1.obj".to_string()), event.exported_mesh);
    assert_eq!(
        vec![ResourceSlotBinding {
            resource_id: 200,
            slot: 0,
            direction: BindingDirection::Output
        }],
        event.output_slots
    );

    let event_folder = frame.folder.join("g_1");
    for file in event
        .exported_textures
        .iter()
        .map(|t| &t.file)
        .chain(event.exported_buffers.iter().map(|b| &b.file))
        .chain(event.exported_shaders.iter().map(|s| &s.file))
    {
        assert!(event_folder.join(file).is_file(), "{file}");
    }

    let obj = std::fs::read_to_string(event_folder.join("input").join("g_1.obj")).unwrap();
    assert!(obj.contains("# Skinning Applied: true\n"));
    assert!(obj.contains("# Skeleton Data: 48 float4s\n"));
    assert!(obj.contains("v 1.000000 0.000000 0.000000\n"));
    // V is flipped for OBJ
    assert!(obj.contains("vt 1.000000 1.000000\n"));
    assert!(obj.contains("f 1/1/1 2/2/2 3/3/3\n"));
    assert!(event_folder.join("input").join("bone.json").is_file());

    let skeleton = read_json(&event_folder.join("input").join("cbv_68.json"));
    assert_eq!(json!(true), skeleton["is_skeleton_data"]);
    assert_eq!(json!(48), skeleton["skeleton_float4_count"]);
    assert_eq!(json!("CBV"), skeleton["view_type"]);

    let bindings = read_json(&event_folder.join("input").join("ps_texture_bindings_1A.json"));
    assert_eq!(json!(1), bindings["texture_count"]);
    assert_eq!(json!("tAlbedo"), bindings["textures"][0]["name"]);

    let hlsl = std::fs::read_to_string(event_folder.join("input").join("vs_1A.hlsl")).unwrap();
    assert!(hlsl.contains("// Hash: 0xABC\n"));
    assert!(hlsl.ends_with("float4 main() : SV_Position { return 0; }"));

    let info = read_json(&event_folder.join("_event_info.json"));
    assert_eq!(
        json!({
            "inputs_count": 5,
            "outputs_count": 1,
            "has_program": true,
            "has_geometry": false,
            "shaders_exported": 6
        }),
        info["bindings_summary"]
    );
    assert_eq!(json!("DrawIndexed"), info["name"]);
    assert_eq!(json!("IndexCount"), info["arguments"][0]["name"]);

    let event = &frame.events[1];
    assert_eq!(2, event.index);
    assert!(event.skipped.is_empty(), "{:?}", event.skipped);
    assert_eq!(Some("input/g_2.obj".to_string()), event.exported_mesh);
    let obj = std::fs::read_to_string(frame.folder.join("g_2/input/g_2.obj")).unwrap();
    assert!(obj.contains("v 2.000000 0.000000 0.000000\n"));
    assert!(obj.contains("f 1 2 3\n"));

    let summary = frame.summary();
    assert_eq!(2, summary.events);
    assert_eq!(2, summary.textures);
    assert_eq!(4, summary.buffers);
    assert_eq!(2, summary.meshes);
    assert_eq!(1, summary.shader_programs);
    assert_eq!(0, summary.errors);
}

#[test]
fn export_event_range() {
    let output = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        events: EventRange::from_bounds(2, -1),
        ..ExportOptions::new(output.path())
    };

    let frame = export_frame(&capture(), &options).unwrap();
    assert_eq!(
        vec![2],
        frame.events.iter().map(|e| e.index).collect::<Vec<_>>()
    );
    assert!(frame.folder.join("g_2").join("_event_info.json").is_file());
    assert!(!frame.folder.join("g_1").exists());
}

#[test]
fn unavailable_texture_data_is_skipped() {
    let capture = json!({
        "frame_metadata": null,
        "calls": [{
            "description": { "name": "Draw", "is_event": true },
            "bindings": { "inputs": [0] }
        }],
        "resources": [{
            "description": {
                "resource_type": "texture",
                "resource_id": 5,
                "view_type": "SRV",
                "view_id": 0,
                "format": "BC1_UNORM",
                "mips": [{ "width": 4, "height": 4 }]
            }
        }]
    });
    let capture = JsonCapture::from_json_str(&capture.to_string(), ".".into()).unwrap();

    let output = tempfile::tempdir().unwrap();
    let frame = export_frame(&capture, &ExportOptions::new(output.path())).unwrap();

    let event = &frame.events[0];
    assert_eq!(None, event.error);
    assert!(event.exported_textures.is_empty());
    assert_eq!(1, event.skipped.len());
    assert_eq!("texture 5", event.skipped[0].artifact);
    assert_eq!(None, event.exported_mesh);
}
