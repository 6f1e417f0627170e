//! A library for decoding resources recorded in GPU frame captures.
//!
//! Frame captures store textures and buffers as raw bytes alongside loosely typed descriptions.
//! This library converts those bytes into usable data and standard interchange formats.
//!
//! # Getting Started
//! Each concern has its own module.
//! Decoders operate on byte slices and never fail for truncated input.
//! Partial trailing records are ignored instead.
//!
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use gpa_lib::{dds::save_dds, vertex::read_vertices};
//!
//! let data = std::fs::read("vertices.bin")?;
//! let vertices = read_vertices(&data, 24, data.len() / 24)?;
//! println!("{}", vertices.positions.len());
//!
//! let pixels = std::fs::read("albedo.bin")?;
//! save_dds("albedo.dds", &pixels, 512, 512, "BC7_UNORM")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! Fixed binary layouts like the TGA header are described with binrw types.
//! DDS files are written with ddsfile.
//! Variable layouts like vertex records are decoded from a [std::io::Cursor]
//! based on offsets selected from the buffer stride.
//!
//! Format identifiers from the capture are strings like `"BC7_UNORM_SRGB"`.
//! The tables in [format] are checked in a fixed order so lookups are reproducible.
pub mod dds;
pub mod dxbc;
pub mod error;
pub mod format;
pub mod image;
pub mod index;
pub mod obj;
pub mod skinning;
pub mod vertex;
