use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("expected a JSON object but found {0}")]
    NotAnObject(String),

    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("field {field:?} has invalid value {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("resource type {0:?} is not supported")]
    UnsupportedResourceType(String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("call {0} does not exist")]
    InvalidCall(usize),

    #[error("resource {0} does not exist")]
    InvalidResource(usize),

    #[error("program {0} does not exist")]
    InvalidProgram(usize),

    #[error("{0}")]
    Other(String),
}

/// The reason an artifact was not written.
///
/// These are recorded in the event result and never stop processing.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("data for resource {resource} was not returned by the host")]
    Unavailable { resource: usize },

    #[error("texture has no mip levels")]
    NoMips,

    #[error("texture dimensions {width}x{height} must be non zero")]
    EmptyTexture { width: u32, height: u32 },

    #[error("no vertex buffer has a usable stride")]
    NoVertexBuffer,

    #[error("draw does not use any indices")]
    NoIndices,

    #[error("no vertices could be decoded")]
    NoVertices,

    #[error("error decoding buffer: {0}")]
    Decode(#[from] binrw::Error),

    #[error("error querying host: {0}")]
    Host(#[from] HostError),

    #[error("error parsing description: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("error writing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error writing file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("error creating folder {path:?}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error querying bindings: {0}")]
    Bindings(#[source] HostError),

    #[error("error writing event info: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error writing event info: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("error creating output folder {path:?}")]
    OutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum LoadCaptureError {
    #[error("error reading capture file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing capture JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("call {call} references {kind} {index} which does not exist")]
    InvalidReference {
        call: usize,
        kind: &'static str,
        index: usize,
    },
}
