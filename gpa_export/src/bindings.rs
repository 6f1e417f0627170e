//! Correlate resource binding calls in the API log with shader reflection.
//!
//! Shader reflection only names register slots like `t3`.
//! The `PSSetShaderResources` calls since the previous event determine which resource
//! occupies each slot, which gives names for the textures used by a draw.
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{CallDescriptor, as_u64};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingDirection {
    Input,
    Output,
}

/// A resource bound to a slot by a call in the API log.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct ResourceSlotBinding {
    pub resource_id: u64,
    pub slot: u32,
    pub direction: BindingDirection,
}

/// A texture name from shader reflection for a bound resource.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TextureName {
    pub name: String,
    pub slot: u32,
}

/// The calls after the previous event and before the event at `event_index`.
pub fn calls_since_previous_event(calls: &[CallDescriptor], event_index: usize) -> &[CallDescriptor] {
    let end = event_index.min(calls.len());
    let start = calls[..end]
        .iter()
        .rposition(|c| c.is_event)
        .map(|i| i + 1)
        .unwrap_or_default();
    &calls[start..end]
}

/// Find the shader resource and render target slots assigned by `calls` in order.
pub fn slot_bindings(calls: &[CallDescriptor]) -> Vec<ResourceSlotBinding> {
    calls
        .iter()
        .flat_map(|call| match call.name.as_str() {
            "PSSetShaderResources" => {
                view_bindings(call, "ppShaderResourceViews", BindingDirection::Input)
            }
            "OMSetRenderTargets" => {
                view_bindings(call, "ppRenderTargetViews", BindingDirection::Output)
            }
            _ => Vec::new(),
        })
        .collect()
}

fn view_bindings(
    call: &CallDescriptor,
    views_name: &str,
    direction: BindingDirection,
) -> Vec<ResourceSlotBinding> {
    let start_slot = call
        .argument("StartSlot")
        .and_then(|a| a.as_i64())
        .and_then(|s| u32::try_from(s).ok())
        .unwrap_or_default();

    let Some(Value::Array(views)) = call.argument(views_name).map(|a| &a.value) else {
        return Vec::new();
    };

    views
        .iter()
        .enumerate()
        .filter_map(|(i, view)| {
            // Views are usually objects with the id as the value.
            let resource_id = match view {
                Value::Object(_) => view.get("value").and_then(as_u64),
                _ => as_u64(view),
            }
            .filter(|id| *id != 0)?;

            Some(ResourceSlotBinding {
                resource_id,
                slot: start_slot.checked_add(u32::try_from(i).ok()?)?,
                direction,
            })
        })
        .collect()
}

/// The slot for each input resource with later bindings replacing earlier ones.
pub fn input_slots(bindings: &[ResourceSlotBinding]) -> BTreeMap<u64, u32> {
    bindings
        .iter()
        .filter(|b| b.direction == BindingDirection::Input)
        .map(|b| (b.resource_id, b.slot))
        .collect()
}

/// Join the resource slots with the texture names from shader reflection.
/// Resources in slots without a name are not included.
pub fn texture_names(
    resource_slots: &BTreeMap<u64, u32>,
    slot_names: &BTreeMap<u32, String>,
) -> BTreeMap<u64, TextureName> {
    resource_slots
        .iter()
        .filter_map(|(id, slot)| {
            Some((
                *id,
                TextureName {
                    name: slot_names.get(slot)?.clone(),
                    slot: *slot,
                },
            ))
        })
        .collect()
}
