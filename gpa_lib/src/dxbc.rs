//! Resource bindings from DXBC disassembly.
//!
//! The compiler writes reflection data as a comment block at the start of the disassembly.
//!
//! ```text
//! // Resource Bindings:
//! //
//! // Name                                 Type  Format         Dim      HLSL Bind  Count
//! // ------------------------------ ---------- ------- ----------- -------------- ------
//! // sLinear                           sampler      NA          NA             s0      1
//! // tBaseMap                          texture  float4          2d             t0      1
//! // tNormalMap                        texture  float4          2d             t1      1
//! //
//! ```
//!
//! Only texture rows are used since they determine the names for shader resource view slots.
use std::{collections::BTreeMap, sync::OnceLock};

use log::debug;
use regex::Regex;

/// A texture row from the resource bindings comment block.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TextureBinding {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub resource_type: String,
    pub format: String,
    pub dim: String,
    /// The HLSL register like `"t0"`.
    #[cfg_attr(feature = "serde", serde(rename = "slot"))]
    pub bind: String,
    pub count: u32,
    /// The 1-based line in the disassembly.
    pub line_number: usize,
}

impl TextureBinding {
    /// The register index for `"t<N>"` bind points.
    pub fn slot(&self) -> Option<u32> {
        self.bind.strip_prefix('t')?.parse().ok()
    }
}

fn binding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\S+)\s+(texture|sampler|cbuffer|UAV)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\d+)")
            .unwrap()
    })
}

/// Find the texture rows of all resource bindings blocks in `disassembly`.
pub fn texture_bindings(disassembly: &str) -> Vec<TextureBinding> {
    let mut bindings = Vec::new();

    let mut in_bindings = false;
    let mut header_found = false;
    for (i, line) in disassembly.lines().enumerate() {
        let line = line.trim();

        if line.contains("Resource Bindings:") {
            in_bindings = true;
            header_found = false;
            continue;
        }
        if !in_bindings {
            continue;
        }

        if line.contains("Name") && line.contains("HLSL Bind") {
            header_found = true;
            continue;
        }
        if line.contains("// ---") || !header_found {
            continue;
        }

        // The block ends with a blank comment or the first non comment line.
        let Some(content) = line.strip_prefix("//") else {
            in_bindings = false;
            continue;
        };
        if content.is_empty() {
            in_bindings = false;
            continue;
        }

        if let Some(binding) = parse_binding(content.trim(), i + 1) {
            debug!("Found texture {} at {}", binding.name, binding.bind);
            bindings.push(binding);
        }
    }

    bindings
}

fn parse_binding(content: &str, line_number: usize) -> Option<TextureBinding> {
    let captures = binding_pattern().captures(content)?;
    if &captures[2] != "texture" {
        return None;
    }

    Some(TextureBinding {
        name: captures[1].to_string(),
        resource_type: captures[2].to_string(),
        format: captures[3].to_string(),
        dim: captures[4].to_string(),
        bind: captures[5].to_string(),
        count: captures[6].parse().ok()?,
        line_number,
    })
}

/// The texture name for each shader resource view slot.
pub fn slot_names(bindings: &[TextureBinding]) -> BTreeMap<u32, String> {
    bindings
        .iter()
        .filter_map(|b| Some((b.slot()?, b.name.clone())))
        .collect()
}
