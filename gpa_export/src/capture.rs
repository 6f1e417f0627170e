//! The contract with the debugger that owns the captured frame.
//!
//! Calls, resources and programs are referenced by opaque handles.
//! Descriptions are returned as loosely typed JSON and parsed with [crate::descriptor].
//! Resource data is read back in batches with a timeout,
//! and requests that could not be resolved are simply missing from the result.
use std::{collections::HashMap, rc::Rc, time::Duration};

use serde::Deserialize;
use serde_json::Value;

use crate::{descriptor::ShaderStage, error::HostError, error::SkipReason};

/// The timeout for every readback and IL request.
pub const READBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// The position of a call in [CaptureHost::calls].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct CallHandle(pub usize);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct ResourceHandle(pub usize);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct ProgramHandle(pub usize);

/// A single surface of a texture at the state of `call`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ImageRequest {
    pub image: ResourceHandle,
    pub mip: u32,
    pub slice: u32,
    pub call: CallHandle,
    /// Read the data before `call` executes instead of after.
    pub extract_before: bool,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct BufferRequest {
    pub buffer: ResourceHandle,
    pub call: CallHandle,
    pub extract_before: bool,
}

/// The resources and program bound for a call.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct RawBindings {
    pub inputs: Vec<ResourceHandle>,
    pub outputs: Vec<ResourceHandle>,
    pub program: Option<ProgramHandle>,
    /// Unparsed vertex and index buffer assignments for the input assembler.
    pub input_geometry: Option<Value>,
}

/// Shader code or disassembly in either text or binary form.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum ShaderBlob {
    Text(String),
    Bytes(Vec<u8>),
}

impl ShaderBlob {
    pub fn is_empty(&self) -> bool {
        match self {
            ShaderBlob::Text(text) => text.is_empty(),
            ShaderBlob::Bytes(bytes) => bytes.is_empty(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ShaderBlob::Text(text) => text.as_bytes(),
            ShaderBlob::Bytes(bytes) => bytes,
        }
    }

    /// The blob as text with invalid UTF-8 replaced.
    pub fn to_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            ShaderBlob::Text(text) => text.into(),
            ShaderBlob::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

/// The intermediate languages available from [CaptureHost::il_source].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IlType {
    Dxil,
    Isa,
}

impl IlType {
    pub fn name(&self) -> &'static str {
        match self {
            IlType::Dxil => "dxil",
            IlType::Isa => "isa",
        }
    }
}

/// Access to the API log and resources of a captured frame.
pub trait CaptureHost {
    /// Information about the capture itself like the frame file name.
    fn frame_metadata(&self) -> Result<Value, HostError>;

    /// Descriptions of every call in submission order.
    /// The index of each description is its [CallHandle].
    fn calls(&self) -> Result<Vec<Value>, HostError>;

    fn bindings(&self, call: CallHandle) -> Result<RawBindings, HostError>;

    fn resource_description(&self, resource: ResourceHandle) -> Result<Value, HostError>;

    /// The first resource view with the given `resource_id`.
    fn memory_resource(&self, resource_id: u64) -> Option<ResourceHandle>;

    fn program_description(&self, program: ProgramHandle) -> Result<Value, HostError>;

    /// Request the intermediate language for a stage or `None` if the host has no such code.
    fn il_source(
        &self,
        program: ProgramHandle,
        stage: ShaderStage,
        il_type: IlType,
        timeout: Duration,
    ) -> Result<Option<ShaderBlob>, HostError>;

    fn images_data(
        &self,
        requests: &[ImageRequest],
        timeout: Duration,
    ) -> HashMap<ImageRequest, Vec<u8>>;

    fn buffers_data(
        &self,
        requests: &[BufferRequest],
        timeout: Duration,
    ) -> HashMap<BufferRequest, Vec<u8>>;
}

/// Resource data read back at the state after a single call.
///
/// Buffers are cached since the same constant or vertex buffer
/// may be needed for both the buffer info and the mesh.
pub struct Readback<'a, H> {
    host: &'a H,
    call: CallHandle,
    buffers: HashMap<ResourceHandle, Option<Rc<Vec<u8>>>>,
}

impl<'a, H: CaptureHost> Readback<'a, H> {
    pub fn new(host: &'a H, call: CallHandle) -> Self {
        Self {
            host,
            call,
            buffers: HashMap::new(),
        }
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn call(&self) -> CallHandle {
        self.call
    }

    pub fn buffer(&mut self, buffer: ResourceHandle) -> Result<Rc<Vec<u8>>, SkipReason> {
        let (host, call) = (self.host, self.call);
        self.buffers
            .entry(buffer)
            .or_insert_with(|| {
                let request = BufferRequest {
                    buffer,
                    call,
                    extract_before: false,
                };
                host.buffers_data(&[request], READBACK_TIMEOUT)
                    .remove(&request)
                    .map(Rc::new)
            })
            .clone()
            .ok_or(SkipReason::Unavailable {
                resource: buffer.0,
            })
    }

    pub fn image(&self, image: ResourceHandle, mip: u32, slice: u32) -> Result<Vec<u8>, SkipReason> {
        let request = ImageRequest {
            image,
            mip,
            slice,
            call: self.call,
            extract_before: false,
        };
        self.host
            .images_data(&[request], READBACK_TIMEOUT)
            .remove(&request)
            .ok_or(SkipReason::Unavailable { resource: image.0 })
    }
}
