//! Shader source, bytecode and intermediate language dumps for a program.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use gpa_lib::dxbc::{TextureBinding, texture_bindings};
use log::debug;
use serde::Serialize;

use crate::{
    capture::{CaptureHost, IlType, ProgramHandle, READBACK_TIMEOUT, ShaderBlob},
    descriptor::{ProgramDescriptor, ShaderStage, StageDescriptor},
    error::SkipReason,
};

/// A file written for a program.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ExportedShader {
    /// The content like `"vertex"`, `"pixel_dxbc"`, or `"info"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub file: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ShaderInfo {
    pub program_id: String,
    pub program_id_hex: String,
    pub event_index: usize,
    pub shaders: BTreeMap<&'static str, StageInfo>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct StageInfo {
    pub hash: String,
    pub has_source: bool,
    pub has_dxil: bool,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct TextureBindingsInfo<'a> {
    pub program_id: &'a str,
    pub program_id_hex: &'a str,
    pub shader_type: &'static str,
    pub event_index: usize,
    pub texture_count: usize,
    pub textures: &'a [TextureBinding],
}

/// The texture rows from the reflection block of the pixel shader.
pub fn pixel_texture_bindings(program: &ProgramDescriptor) -> Vec<TextureBinding> {
    program
        .stage(ShaderStage::Pixel)
        .and_then(|s| s.dxbc.as_ref())
        .map(|dxbc| texture_bindings(&dxbc.to_text()))
        .unwrap_or_default()
}

/// Write the code for the vertex and pixel stages and a summary of all stages to `folder`.
///
/// Every stage may have HLSL source, DXBC disassembly, DXIL, and ISA.
/// DXIL is requested from the host first and then taken from the description.
#[tracing::instrument(skip_all)]
pub fn export_shaders<H: CaptureHost>(
    host: &H,
    handle: ProgramHandle,
    program: &ProgramDescriptor,
    event_index: usize,
    folder: &Path,
) -> Result<Vec<ExportedShader>, SkipReason> {
    let id_hex = program.id_hex();
    let mut exported = Vec::new();

    for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
        let Some(descriptor) = program.stage(stage) else {
            continue;
        };
        let prefix = stage.prefix();
        let name = stage.name();

        if let Some(source) = &descriptor.source {
            let header = source_header(stage, program, descriptor, event_index);
            let file = write(folder, format!("{prefix}_{id_hex}.hlsl"), format!("{header}{source}"))?;
            exported.push(shader_file(name, file));
        }

        if let Some(dxbc) = &descriptor.dxbc {
            let file = write(folder, format!("{prefix}_{id_hex}.dxbc"), dxbc.as_bytes())?;
            exported.push(shader_file(&format!("{name}_dxbc"), file));

            if stage == ShaderStage::Pixel {
                let textures = texture_bindings(&dxbc.to_text());
                if !textures.is_empty() {
                    let info = TextureBindingsInfo {
                        program_id: &program.id,
                        program_id_hex: &id_hex,
                        shader_type: name,
                        event_index,
                        texture_count: textures.len(),
                        textures: &textures,
                    };
                    let file = write(
                        folder,
                        format!("ps_texture_bindings_{id_hex}.json"),
                        serde_json::to_string_pretty(&info)?,
                    )?;
                    exported.push(shader_file("ps_texture_bindings", file));
                }
            }
        }

        let dxil = request_il(host, handle, stage, IlType::Dxil).or_else(|| descriptor.dxil.clone());
        if let Some(dxil) = dxil {
            let file = write(folder, format!("{prefix}_{id_hex}.dxil"), dxil.as_bytes())?;
            exported.push(shader_file(&format!("{name}_dxil"), file));
        }

        if let Some(isa) = request_il(host, handle, stage, IlType::Isa) {
            let file = write(folder, format!("{prefix}_{id_hex}.isa"), isa.as_bytes())?;
            exported.push(shader_file(&format!("{name}_isa"), file));
        }
    }

    let info = ShaderInfo {
        program_id: program.id.clone(),
        program_id_hex: id_hex.clone(),
        event_index,
        shaders: program
            .stages
            .iter()
            .map(|(stage, s)| {
                (
                    stage.name(),
                    StageInfo {
                        hash: s.hash.clone(),
                        has_source: s.source.is_some(),
                        has_dxil: s.dxil.is_some(),
                    },
                )
            })
            .collect(),
    };
    let file = write(
        folder,
        format!("shader_info_{id_hex}.json"),
        serde_json::to_string_pretty(&info)?,
    )?;
    exported.push(shader_file("info", file));

    Ok(exported)
}

fn request_il<H: CaptureHost>(
    host: &H,
    handle: ProgramHandle,
    stage: ShaderStage,
    il_type: IlType,
) -> Option<ShaderBlob> {
    host.il_source(handle, stage, il_type, READBACK_TIMEOUT)
        .inspect_err(|e| debug!("Error requesting {} {}: {e}", stage.name(), il_type.name()))
        .ok()
        .flatten()
        .filter(|il| !il.is_empty())
}

fn source_header(
    stage: ShaderStage,
    program: &ProgramDescriptor,
    descriptor: &StageDescriptor,
    event_index: usize,
) -> String {
    let (title, description): (_, &[_]) = match stage {
        ShaderStage::Pixel => (
            "Pixel Shader",
            &[
                "Computes the final color of each pixel from",
                "texture samples, lighting, and material parameters.",
            ],
        ),
        _ => (
            "Vertex Shader",
            &[
                "Transforms each vertex from model space to clip space",
                "and outputs the attributes interpolated for the pixel shader.",
            ],
        ),
    };

    let rule = format!("//{}", "=".repeat(78));
    let mut lines = vec![
        rule.clone(),
        format!("// {title}"),
        rule.clone(),
        format!("// Program ID: {} (0x{})", program.id, program.id_hex()),
    ];
    if !descriptor.hash.is_empty() {
        lines.push(format!("// Hash: {}", descriptor.hash));
    }
    lines.push(format!("// Event Index: {event_index}"));
    lines.push("//".to_string());
    lines.extend(description.iter().map(|l| format!("//   {l}")));
    lines.push(rule);

    lines.join("\n") + "\n\n"
}

fn write<C: AsRef<[u8]>>(folder: &Path, name: String, contents: C) -> std::io::Result<String> {
    let path: PathBuf = folder.join(&name);
    std::fs::write(path, contents)?;
    Ok(name)
}

fn shader_file(kind: &str, file: String) -> ExportedShader {
    ExportedShader {
        kind: kind.to_string(),
        file,
    }
}
