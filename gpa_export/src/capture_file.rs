//! A [CaptureHost] backed by a folder with a `capture.json` file.
//!
//! This allows exporting frames saved from the debugger without a running session.
//!
//! ```json
//! {
//!   "frame_metadata": { "framename": "C:/captures/scene.gpa_frame" },
//!   "calls": [
//!     { "description": { "id": 1, "name": "PSSetShaderResources", "arguments": [] } },
//!     {
//!       "description": { "id": 2, "name": "DrawIndexed", "is_event": true, "arguments": [] },
//!       "bindings": { "inputs": [0, 1], "outputs": [2], "program": 0 }
//!     }
//!   ],
//!   "resources": [
//!     { "description": { "resource_type": "buffer", "resource_id": 10 }, "data": "ib.bin" },
//!     { "description": { "resource_type": "buffer", "resource_id": 11 }, "data": [0, 0, 128, 63] }
//!   ],
//!   "programs": [
//!     { "description": { "id": 5, "pixel": { "source": "..." } }, "il": { "pixel.isa": "..." } }
//!   ]
//! }
//! ```
//!
//! Resource and program bindings are indices into `resources` and `programs`.
//! Resource data is either inline bytes or a path relative to the folder.
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    time::Duration,
};

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    capture::{
        BufferRequest, CallHandle, CaptureHost, IlType, ImageRequest, ProgramHandle, RawBindings,
        ResourceHandle, ShaderBlob,
    },
    descriptor::{ShaderStage, as_u64},
    error::{HostError, LoadCaptureError},
};

pub const CAPTURE_FILE_NAME: &str = "capture.json";

#[derive(Debug, PartialEq, Deserialize)]
pub struct CaptureFile {
    #[serde(default)]
    pub frame_metadata: Value,
    #[serde(default)]
    pub calls: Vec<CallEntry>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct CallEntry {
    pub description: Value,
    #[serde(default)]
    pub bindings: Option<CallBindings>,
}

#[derive(Debug, PartialEq, Deserialize, Default)]
pub struct CallBindings {
    #[serde(default)]
    pub inputs: Vec<usize>,
    #[serde(default)]
    pub outputs: Vec<usize>,
    #[serde(default)]
    pub program: Option<usize>,
    #[serde(default)]
    pub input_geometry: Option<Value>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct ResourceEntry {
    pub description: Value,
    #[serde(default)]
    pub data: Option<DataSource>,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DataSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct ProgramEntry {
    pub description: Value,
    /// Intermediate language code keyed by `"<stage>.<il>"` like `"pixel.dxil"`.
    #[serde(default)]
    pub il: BTreeMap<String, ShaderBlob>,
}

/// A capture loaded from a [CAPTURE_FILE_NAME] file.
#[derive(Debug, PartialEq)]
pub struct JsonCapture {
    root: PathBuf,
    file: CaptureFile,
}

impl JsonCapture {
    /// Load `capture.json` from `folder`.
    /// Data files are only read when requested.
    pub fn from_folder<P: AsRef<Path>>(folder: P) -> Result<Self, LoadCaptureError> {
        let root = folder.as_ref().to_path_buf();
        let path = root.join(CAPTURE_FILE_NAME);
        let text = std::fs::read_to_string(&path)
            .map_err(|source| LoadCaptureError::Io { path, source })?;
        Self::from_json_str(&text, root)
    }

    /// Parse a capture with data files relative to `root`.
    pub fn from_json_str(text: &str, root: PathBuf) -> Result<Self, LoadCaptureError> {
        let file: CaptureFile = serde_json::from_str(text)?;
        Self::new(file, root)
    }

    pub fn new(file: CaptureFile, root: PathBuf) -> Result<Self, LoadCaptureError> {
        // Check references up front so bindings always resolve.
        for (i, call) in file.calls.iter().enumerate() {
            if let Some(bindings) = &call.bindings {
                for index in bindings.inputs.iter().chain(&bindings.outputs) {
                    if *index >= file.resources.len() {
                        return Err(LoadCaptureError::InvalidReference {
                            call: i,
                            kind: "resource",
                            index: *index,
                        });
                    }
                }
                if let Some(index) = bindings.program
                    && index >= file.programs.len()
                {
                    return Err(LoadCaptureError::InvalidReference {
                        call: i,
                        kind: "program",
                        index,
                    });
                }
            }
        }

        Ok(Self { root, file })
    }

    fn resource(&self, resource: ResourceHandle) -> Result<&ResourceEntry, HostError> {
        self.file
            .resources
            .get(resource.0)
            .ok_or(HostError::InvalidResource(resource.0))
    }

    fn program(&self, program: ProgramHandle) -> Result<&ProgramEntry, HostError> {
        self.file
            .programs
            .get(program.0)
            .ok_or(HostError::InvalidProgram(program.0))
    }

    fn resource_data(&self, resource: ResourceHandle) -> Option<Vec<u8>> {
        match &self.file.resources.get(resource.0)?.data {
            Some(DataSource::Bytes(bytes)) => Some(bytes.clone()),
            Some(DataSource::File(path)) => {
                let path = self.root.join(path);
                std::fs::read(&path)
                    .inspect_err(|e| warn!("Failed to read resource data {path:?}: {e}"))
                    .ok()
            }
            None => None,
        }
    }
}

impl CaptureHost for JsonCapture {
    fn frame_metadata(&self) -> Result<Value, HostError> {
        Ok(self.file.frame_metadata.clone())
    }

    fn calls(&self) -> Result<Vec<Value>, HostError> {
        Ok(self
            .file
            .calls
            .iter()
            .map(|c| c.description.clone())
            .collect())
    }

    fn bindings(&self, call: CallHandle) -> Result<RawBindings, HostError> {
        let entry = self
            .file
            .calls
            .get(call.0)
            .ok_or(HostError::InvalidCall(call.0))?;

        Ok(entry
            .bindings
            .as_ref()
            .map(|b| RawBindings {
                inputs: b.inputs.iter().copied().map(ResourceHandle).collect(),
                outputs: b.outputs.iter().copied().map(ResourceHandle).collect(),
                program: b.program.map(ProgramHandle),
                input_geometry: b.input_geometry.clone(),
            })
            .unwrap_or_default())
    }

    fn resource_description(&self, resource: ResourceHandle) -> Result<Value, HostError> {
        Ok(self.resource(resource)?.description.clone())
    }

    fn memory_resource(&self, resource_id: u64) -> Option<ResourceHandle> {
        self.file
            .resources
            .iter()
            .position(|r| {
                r.description
                    .get("resource_id")
                    .and_then(as_u64)
                    .is_some_and(|id| id == resource_id)
            })
            .map(ResourceHandle)
    }

    fn program_description(&self, program: ProgramHandle) -> Result<Value, HostError> {
        Ok(self.program(program)?.description.clone())
    }

    fn il_source(
        &self,
        program: ProgramHandle,
        stage: ShaderStage,
        il_type: IlType,
        _timeout: Duration,
    ) -> Result<Option<ShaderBlob>, HostError> {
        let key = format!("{}.{}", stage.name(), il_type.name());
        Ok(self.program(program)?.il.get(&key).cloned())
    }

    fn images_data(
        &self,
        requests: &[ImageRequest],
        _timeout: Duration,
    ) -> HashMap<ImageRequest, Vec<u8>> {
        // Files store the selected surface for each texture view.
        requests
            .iter()
            .filter_map(|r| Some((*r, self.resource_data(r.image)?)))
            .collect()
    }

    fn buffers_data(
        &self,
        requests: &[BufferRequest],
        _timeout: Duration,
    ) -> HashMap<BufferRequest, Vec<u8>> {
        requests
            .iter()
            .filter_map(|r| Some((*r, self.resource_data(r.buffer)?)))
            .collect()
    }
}
