//! Export the resources used by the draw events of a captured frame.
//!
//! The captured frame is accessed through the [CaptureHost](capture::CaptureHost) trait.
//! [JsonCapture](capture_file::JsonCapture) implements the trait for a folder
//! with a `capture.json` file and the resource payloads.
//!
//! Each event gets its own folder with the input and output textures,
//! a JSON description of each buffer, the reconstructed mesh as OBJ,
//! and the shader code for the bound program.
//!
//! # Getting Started
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use gpa_export::{ExportOptions, capture_file::JsonCapture, export_frame};
//!
//! let capture = JsonCapture::from_folder("captures/frame1")?;
//! let options = ExportOptions::new("export");
//! let frame = export_frame(&capture, &options)?;
//! println!("{:?}", frame.summary());
//! # Ok(())
//! # }
//! ```
use std::path::{Path, PathBuf};

use gpa_lib::skinning::SkinningOptions;
use log::{info, warn};
use serde_json::Value;

use crate::{
    capture::{CallHandle, CaptureHost},
    descriptor::CallDescriptor,
    error::ExportError,
    event::{EventResult, export_event},
};

pub use texture::TextureFileFormat;

pub mod bindings;
pub mod buffer;
pub mod capture;
pub mod capture_file;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod mesh;
pub mod shader;
pub mod texture;

const FRAME_EXTENSIONS: [&str; 2] = [".gpa_frame", ".gpa"];

/// Settings for [export_frame].
#[derive(Debug, PartialEq, Clone)]
pub struct ExportOptions {
    /// The folder that will contain the folder for the frame.
    pub output_folder: PathBuf,
    pub events: EventRange,
    /// Apply bone transforms to skinned meshes if present.
    pub skinning: Option<SkinningOptions>,
    pub texture_format: TextureFileFormat,
    /// Flip textures vertically before saving.
    pub flip_textures: bool,
}

impl ExportOptions {
    /// All events with DDS textures and no skinning.
    pub fn new<P: AsRef<Path>>(output_folder: P) -> Self {
        Self {
            output_folder: output_folder.as_ref().to_path_buf(),
            events: EventRange::default(),
            skinning: None,
            texture_format: TextureFileFormat::Dds,
            flip_textures: false,
        }
    }
}

/// An inclusive range of 1-based event indices.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct EventRange {
    pub start: usize,
    /// The last event or `None` to include all remaining events.
    pub end: Option<usize>,
}

impl Default for EventRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

impl EventRange {
    /// Values less than 1 select the first event for `start` and every remaining event for `end`.
    pub fn from_bounds(start: i64, end: i64) -> Self {
        Self {
            start: start.max(1) as usize,
            end: (end >= 1).then_some(end as usize),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && self.end.is_none_or(|end| index <= end)
    }

    /// The 1-based index and value for each item in the range.
    pub fn select<'a, T>(&self, items: &'a [T]) -> impl Iterator<Item = (usize, &'a T)> + 'a {
        let range = *self;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| (i + 1, item))
            .filter(move |(i, _)| range.contains(*i))
    }
}

/// The exported events for a frame.
#[derive(Debug, PartialEq)]
pub struct FrameExport {
    pub folder: PathBuf,
    pub events: Vec<EventResult>,
}

/// Totals for the exported artifacts of all events.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct FrameSummary {
    pub events: usize,
    pub textures: usize,
    pub buffers: usize,
    pub meshes: usize,
    /// Events with at least one exported shader file.
    pub shader_programs: usize,
    pub skipped: usize,
    /// Events that could not be processed.
    pub errors: usize,
}

impl FrameExport {
    pub fn summary(&self) -> FrameSummary {
        self.events
            .iter()
            .fold(FrameSummary::default(), |summary, event| FrameSummary {
                events: summary.events + 1,
                textures: summary.textures + event.exported_textures.len(),
                buffers: summary.buffers + event.exported_buffers.len(),
                meshes: summary.meshes + event.exported_mesh.is_some() as usize,
                shader_programs: summary.shader_programs
                    + (!event.exported_shaders.is_empty()) as usize,
                skipped: summary.skipped + event.skipped.len(),
                errors: summary.errors + event.error.is_some() as usize,
            })
    }
}

/// Export the selected events of the frame to a new timestamped folder in [ExportOptions::output_folder].
///
/// Errors for individual events are recorded in the [EventResult]
/// and only prevent exporting that event.
/// A frame without readable calls exports no events.
#[tracing::instrument(skip_all)]
pub fn export_frame<H: CaptureHost>(
    host: &H,
    options: &ExportOptions,
) -> Result<FrameExport, ExportError> {
    let calls: Vec<_> = host
        .calls()
        .inspect_err(|e| warn!("Error querying calls: {e}"))
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, value)| {
            CallDescriptor::from_json(value).unwrap_or_else(|e| {
                warn!("Error parsing description for call {i}: {e}");
                CallDescriptor::default()
            })
        })
        .collect();

    let name = host
        .frame_metadata()
        .inspect_err(|e| warn!("Error querying frame metadata: {e}"))
        .ok()
        .and_then(|metadata| frame_name(&metadata));
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let folder = options
        .output_folder
        .join(frame_folder_name(name.as_deref(), &timestamp));
    std::fs::create_dir_all(&folder).map_err(|source| ExportError::OutputFolder {
        path: folder.clone(),
        source,
    })?;

    let event_calls: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_event)
        .map(|(i, _)| CallHandle(i))
        .collect();
    info!(
        "Exporting events {:?} of {} to {folder:?}",
        options.events,
        event_calls.len()
    );

    let events = options
        .events
        .select(&event_calls)
        .map(|(index, call)| export_event(host, &calls, *call, index, &folder, options))
        .collect();

    Ok(FrameExport { folder, events })
}

/// The file name of the capture without extension from the frame metadata.
/// String metadata is parsed as JSON.
pub fn frame_name(metadata: &Value) -> Option<String> {
    let parsed;
    let metadata = match metadata {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).ok()?;
            &parsed
        }
        _ => metadata,
    };

    let path = ["framename", "frame_name", "name"]
        .iter()
        .find_map(|key| metadata.get(key).and_then(Value::as_str))?;

    let file_name = path.rsplit(['/', '\\']).next()?;
    let name = strip_frame_extension(file_name);
    (!name.is_empty()).then(|| name.to_string())
}

/// `<name>_<timestamp>` using only the characters of `name` that are safe for paths.
pub fn frame_folder_name(name: Option<&str>, timestamp: &str) -> String {
    let name: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    let name = strip_frame_extension(&name);
    if name.is_empty() {
        timestamp.to_string()
    } else {
        format!("{name}_{timestamp}")
    }
}

fn strip_frame_extension(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    FRAME_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &name[..name.len() - ext.len()])
        .unwrap_or(name)
}
