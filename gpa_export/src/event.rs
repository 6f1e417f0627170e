use std::path::{Path, PathBuf};

use gpa_lib::dxbc::slot_names;
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::Value;

use crate::{
    ExportOptions,
    bindings::{
        BindingDirection, ResourceSlotBinding, calls_since_previous_event, input_slots,
        slot_bindings, texture_names,
    },
    buffer::export_buffer_info,
    capture::{CallHandle, CaptureHost, RawBindings, Readback, ResourceHandle},
    descriptor::{
        BufferDescriptor, CallArgument, CallDescriptor, GeometryInfo, ProgramDescriptor,
        ResourceDescriptor, TextureDescriptor, ViewType,
    },
    error::{EventError, SkipReason},
    mesh::{BoundBuffer, DrawBuffers, export_mesh_from_buffers, export_mesh_from_geometry},
    shader::{ExportedShader, export_shaders, pixel_texture_bindings},
    texture::export_texture,
};

pub const EVENT_INFO_FILE_NAME: &str = "_event_info.json";

/// The files written for a single draw event.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct EventResult {
    /// The 1-based position in the list of events.
    pub index: usize,
    pub id: Option<u64>,
    pub name: String,
    pub exported_textures: Vec<ExportedTexture>,
    pub exported_buffers: Vec<ExportedBuffer>,
    pub exported_shaders: Vec<ExportedShader>,
    /// The path of the OBJ file relative to the event folder.
    pub exported_mesh: Option<String>,
    /// Render targets assigned since the previous event.
    pub output_slots: Vec<ResourceSlotBinding>,
    pub skipped: Vec<SkippedArtifact>,
    /// The error that stopped processing this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ExportedTexture {
    #[serde(rename = "type")]
    pub direction: BindingDirection,
    pub resource_id: u64,
    /// The texture name from shader reflection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dxbc_name: Option<String>,
    /// The register like `"t0"` for named textures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dxbc_slot: Option<String>,
    /// The position among the shader resource views of the draw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<usize>,
    pub file: String,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ExportedBuffer {
    #[serde(rename = "type")]
    pub direction: BindingDirection,
    pub resource_id: u64,
    pub file: String,
}

/// An artifact that was not written and the reason.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct SkippedArtifact {
    pub artifact: String,
    pub reason: String,
}

#[derive(Debug, PartialEq, Serialize)]
struct EventInfo<'a> {
    index: usize,
    id: Option<u64>,
    name: &'a str,
    arguments: &'a [CallArgument],
    bindings_summary: BindingsSummary,
}

#[derive(Debug, PartialEq, Serialize)]
struct BindingsSummary {
    inputs_count: usize,
    outputs_count: usize,
    has_program: bool,
    has_geometry: bool,
    shaders_exported: usize,
}

impl EventResult {
    fn new(index: usize, call: &CallDescriptor) -> Self {
        Self {
            index,
            id: call.id,
            name: call.name.clone(),
            exported_textures: Vec::new(),
            exported_buffers: Vec::new(),
            exported_shaders: Vec::new(),
            exported_mesh: None,
            output_slots: Vec::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    fn skip(&mut self, artifact: impl Into<String>, reason: impl std::fmt::Display) {
        let artifact = artifact.into();
        debug!("Skipped {artifact} for event {}: {reason}", self.index);
        self.skipped.push(SkippedArtifact {
            artifact,
            reason: reason.to_string(),
        });
    }
}

/// A resource bound to a draw with its parsed and unparsed descriptions.
struct Bound<T> {
    resource: ResourceHandle,
    descriptor: T,
    description: Value,
}

#[derive(Default)]
struct ClassifiedResources {
    /// Shader resource views for the first view of each texture.
    srv_textures: Vec<Bound<TextureDescriptor>>,
    textures: Vec<Bound<TextureDescriptor>>,
    buffers: Vec<Bound<BufferDescriptor>>,
}

/// Export the bound resources, mesh, and shaders for the event at `call`.
///
/// Failures for individual artifacts are recorded in [EventResult::skipped].
/// Errors that prevent processing the event are recorded in [EventResult::error].
#[tracing::instrument(skip_all)]
pub fn export_event<H: CaptureHost>(
    host: &H,
    calls: &[CallDescriptor],
    call: CallHandle,
    event_index: usize,
    frame_folder: &Path,
    options: &ExportOptions,
) -> EventResult {
    let descriptor = calls.get(call.0).cloned().unwrap_or_default();
    let mut result = EventResult::new(event_index, &descriptor);

    if let Err(e) = export_event_inner(
        host,
        calls,
        call,
        &descriptor,
        frame_folder,
        options,
        &mut result,
    ) {
        error!("Error exporting event {event_index}: {e}");
        result.error = Some(e.to_string());
    }

    result
}

fn export_event_inner<H: CaptureHost>(
    host: &H,
    calls: &[CallDescriptor],
    call: CallHandle,
    descriptor: &CallDescriptor,
    frame_folder: &Path,
    options: &ExportOptions,
    result: &mut EventResult,
) -> Result<(), EventError> {
    let event_folder = event_folder(frame_folder, result.index);
    let input_folder = event_folder.join("input");
    let output_folder = event_folder.join("output");
    for folder in [&input_folder, &output_folder] {
        std::fs::create_dir_all(folder).map_err(|source| EventError::CreateFolder {
            path: folder.to_path_buf(),
            source,
        })?;
    }

    let bindings = host.bindings(call).map_err(EventError::Bindings)?;

    let program = bindings.program.and_then(|handle| {
        host.program_description(handle)
            .map_err(SkipReason::from)
            .and_then(|v| ProgramDescriptor::from_json(&v).map_err(SkipReason::from))
            .map(|p| (handle, p))
            .inspect_err(|e| result.skip(format!("program {}", handle.0), e))
            .ok()
    });

    let trace_bindings = slot_bindings(calls_since_previous_event(calls, call.0));
    result.output_slots = trace_bindings
        .iter()
        .filter(|b| b.direction == BindingDirection::Output)
        .cloned()
        .collect();

    // Names are only known for textures in slots from the pixel shader reflection.
    let slot_names = program
        .as_ref()
        .map(|(_, p)| slot_names(&pixel_texture_bindings(p)))
        .unwrap_or_default();
    let names = if slot_names.is_empty() {
        Default::default()
    } else {
        texture_names(&input_slots(&trace_bindings), &slot_names)
    };
    if !names.is_empty() {
        debug!("Resolved texture names {names:?}");
    }

    let mut readback = Readback::new(host, call);

    let inputs = classify_resources(host, &bindings.inputs, true, result);
    for (i, texture) in inputs.srv_textures.iter().enumerate() {
        let name = names.get(&texture.descriptor.resource_id);
        match export_texture(
            &readback,
            texture.resource,
            &texture.descriptor,
            name.map(|n| n.name.as_str()),
            &input_folder,
            options.texture_format,
            options.flip_textures,
        ) {
            Ok(path) => result.exported_textures.push(ExportedTexture {
                direction: BindingDirection::Input,
                resource_id: texture.descriptor.resource_id,
                dxbc_name: name.map(|n| n.name.clone()),
                dxbc_slot: name.map(|n| format!("t{}", n.slot)),
                order_index: Some(i),
                file: relative_file("input", &path),
            }),
            Err(e) => result.skip(texture_artifact(&texture.descriptor), e),
        }
    }
    export_textures(
        &readback,
        &inputs.textures,
        BindingDirection::Input,
        &input_folder,
        options,
        result,
    );
    export_buffers(
        &mut readback,
        &inputs.buffers,
        BindingDirection::Input,
        &input_folder,
        result,
    );

    let outputs = classify_resources(host, &bindings.outputs, false, result);
    export_textures(
        &readback,
        &outputs.textures,
        BindingDirection::Output,
        &output_folder,
        options,
        result,
    );
    export_buffers(
        &mut readback,
        &outputs.buffers,
        BindingDirection::Output,
        &output_folder,
        result,
    );

    export_mesh(
        &mut readback,
        &inputs.buffers,
        &bindings,
        descriptor,
        &input_folder,
        options,
        result,
    );

    if let Some((handle, program)) = &program {
        match export_shaders(host, *handle, program, result.index, &input_folder) {
            Ok(shaders) => {
                result.exported_shaders = shaders
                    .into_iter()
                    .map(|s| ExportedShader {
                        kind: s.kind,
                        file: format!("input/{}", s.file),
                    })
                    .collect()
            }
            Err(e) => result.skip(format!("shaders for program {}", program.id), e),
        }
    }

    let info = EventInfo {
        index: result.index,
        id: descriptor.id,
        name: &descriptor.name,
        arguments: &descriptor.arguments,
        bindings_summary: BindingsSummary {
            inputs_count: bindings.inputs.len(),
            outputs_count: bindings.outputs.len(),
            has_program: bindings.program.is_some(),
            has_geometry: bindings.input_geometry.is_some(),
            shaders_exported: result.exported_shaders.len(),
        },
    };
    std::fs::write(
        event_folder.join(EVENT_INFO_FILE_NAME),
        serde_json::to_string_pretty(&info)?,
    )?;

    Ok(())
}

fn classify_resources<H: CaptureHost>(
    host: &H,
    resources: &[ResourceHandle],
    separate_srv_textures: bool,
    result: &mut EventResult,
) -> ClassifiedResources {
    let mut classified = ClassifiedResources::default();
    for resource in resources {
        let description = match host.resource_description(*resource) {
            Ok(description) => description,
            Err(e) => {
                result.skip(format!("resource {}", resource.0), e);
                continue;
            }
        };
        match ResourceDescriptor::from_json(&description) {
            Ok(ResourceDescriptor::Texture(descriptor)) => {
                let is_srv = descriptor.view_type == ViewType::Srv && descriptor.view_id == 0;
                let texture = Bound {
                    resource: *resource,
                    descriptor,
                    description,
                };
                if separate_srv_textures && is_srv {
                    classified.srv_textures.push(texture);
                } else {
                    classified.textures.push(texture);
                }
            }
            Ok(ResourceDescriptor::Buffer(descriptor)) => classified.buffers.push(Bound {
                resource: *resource,
                descriptor,
                description,
            }),
            Err(e) => result.skip(format!("resource {}", resource.0), e),
        }
    }
    classified
}

fn export_textures<H: CaptureHost>(
    readback: &Readback<H>,
    textures: &[Bound<TextureDescriptor>],
    direction: BindingDirection,
    folder: &Path,
    options: &ExportOptions,
    result: &mut EventResult,
) {
    for texture in textures {
        match export_texture(
            readback,
            texture.resource,
            &texture.descriptor,
            None,
            folder,
            options.texture_format,
            options.flip_textures,
        ) {
            Ok(path) => result.exported_textures.push(ExportedTexture {
                direction,
                resource_id: texture.descriptor.resource_id,
                dxbc_name: None,
                dxbc_slot: None,
                order_index: None,
                file: relative_file(folder_name(direction), &path),
            }),
            Err(e) => result.skip(texture_artifact(&texture.descriptor), e),
        }
    }
}

fn export_buffers<H: CaptureHost>(
    readback: &mut Readback<H>,
    buffers: &[Bound<BufferDescriptor>],
    direction: BindingDirection,
    folder: &Path,
    result: &mut EventResult,
) {
    for buffer in buffers {
        match export_buffer_info(
            readback,
            buffer.resource,
            &buffer.descriptor,
            buffer.description.clone(),
            folder,
        ) {
            Ok(path) => result.exported_buffers.push(ExportedBuffer {
                direction,
                resource_id: buffer.descriptor.resource_id,
                file: relative_file(folder_name(direction), &path),
            }),
            Err(e) => result.skip(format!("buffer {:X}", buffer.descriptor.resource_id), e),
        }
    }
}

fn export_mesh<H: CaptureHost>(
    readback: &mut Readback<H>,
    buffers: &[Bound<BufferDescriptor>],
    bindings: &RawBindings,
    descriptor: &CallDescriptor,
    folder: &Path,
    options: &ExportOptions,
    result: &mut EventResult,
) {
    let draw_buffers = draw_buffers(buffers);
    let draw = descriptor.draw_params();
    let event_index = result.index;

    let mut mesh = None;
    if draw_buffers.index.is_some() && !draw_buffers.vertex.is_empty() {
        match export_mesh_from_buffers(
            readback,
            &draw_buffers,
            &draw,
            event_index,
            options.skinning.as_ref(),
            folder,
        ) {
            Ok(export) => mesh = Some(export),
            Err(e) => result.skip("mesh from buffer views", e),
        }
    }

    if mesh.is_none()
        && let Some(geometry) = &bindings.input_geometry
    {
        match GeometryInfo::from_json(geometry)
            .map_err(SkipReason::from)
            .and_then(|g| export_mesh_from_geometry(readback, &g, &draw, event_index, folder))
        {
            Ok(export) => mesh = Some(export),
            Err(e) => result.skip("mesh from input geometry", e),
        }
    }

    if let Some(mesh) = mesh {
        if mesh.skinning_applied {
            debug!("Applied skinning to {:?}", mesh.path);
        }
        result.exported_mesh = Some(relative_file("input", &mesh.path));
    } else if bindings.input_geometry.is_none() && draw_buffers.index.is_none() {
        warn!("No geometry bound for event {event_index}");
    }
}

/// Group the buffer views used for reconstructing the mesh.
/// The last index buffer view is used if there are multiple.
fn draw_buffers(buffers: &[Bound<BufferDescriptor>]) -> DrawBuffers {
    let mut draw_buffers = DrawBuffers::default();
    for buffer in buffers {
        let bound = BoundBuffer {
            resource: buffer.resource,
            descriptor: buffer.descriptor.clone(),
        };
        match buffer.descriptor.view_type {
            ViewType::Ibv => draw_buffers.index = Some(bound),
            ViewType::Vbv => draw_buffers.vertex.push(bound),
            ViewType::Cbv => draw_buffers.constant.push(bound),
            _ => (),
        }
    }
    draw_buffers
}

fn folder_name(direction: BindingDirection) -> &'static str {
    match direction {
        BindingDirection::Input => "input",
        BindingDirection::Output => "output",
    }
}

fn relative_file(folder: &str, path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{folder}/{name}")
}

fn texture_artifact(texture: &TextureDescriptor) -> String {
    format!("texture {:X}", texture.resource_id)
}

/// The folder for an event relative to the frame folder.
pub fn event_folder(frame_folder: &Path, event_index: usize) -> PathBuf {
    frame_folder.join(format!("g_{event_index}"))
}
