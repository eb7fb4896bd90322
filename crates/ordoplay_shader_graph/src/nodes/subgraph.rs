// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sub-graph wrapper node.
//!
//! A wrapper node stands in for a referenced sub-graph. Its slots are not
//! fixed: inputs come from the sub-graph's exposed properties, outputs from
//! the ports of its output node. [`SubGraphNode::sync_slots`] re-derives
//! them whenever the reference changes or the node is refreshed. Slot
//! identities are stable, so connections to slots that still exist survive.
//!
//! Code generation expands the wrapper into a call of one generated
//! function per referenced sub-graph:
//!
//! ```text
//! float4 _Blend_1a2b3c4d_Output1;
//! Blend_5f0e...(_Tint, TEXTURE2D_PARAM(_Noise, sampler_Noise), IN, _Blend_1a2b3c4d_Output1);
//! ```

use crate::asset::{AssetHandle, AssetResolver, SubGraphAsset};
use crate::codegen::{self, slot_value, texture_argument, GenerationContext};
use crate::node::Node;
use crate::registry::FunctionSink;
use crate::requirements::{aggregate_within, Capability, Requirement};
use crate::slot::{Slot, SlotDirection, SlotError, SlotId, SlotRegistry};
use crate::writer::ShaderWriter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

/// Serialized handle plus a cache of the live sub-graph it resolves to
///
/// The cache holds a weak pointer, so the asset store keeps ownership. It
/// is dropped whenever the handle is reassigned or the wrapper is refreshed,
/// and re-filled from the resolver when empty or stale.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SubGraphReference {
    handle: Option<AssetHandle>,
    #[serde(skip)]
    cache: Mutex<Weak<SubGraphAsset>>,
}

impl SubGraphReference {
    /// Create a reference to `handle`
    pub fn new(handle: Option<AssetHandle>) -> Self {
        Self {
            handle,
            cache: Mutex::new(Weak::new()),
        }
    }

    /// The serialized handle
    pub fn handle(&self) -> Option<AssetHandle> {
        self.handle
    }

    /// Reassign the handle, invalidating the cache
    pub fn set_handle(&mut self, handle: Option<AssetHandle>) {
        self.handle = handle;
        self.invalidate();
    }

    /// Forget the cached definition so the next resolve asks the resolver
    pub fn invalidate(&mut self) {
        *self.cache.get_mut() = Weak::new();
    }

    /// Resolve to the live sub-graph; `None` when unbound or missing
    pub fn resolve(&self, assets: &dyn AssetResolver) -> Option<Arc<SubGraphAsset>> {
        let handle = self.handle?;
        let mut cache = self.cache.lock();
        if let Some(asset) = cache.upgrade() {
            if asset.handle == handle {
                return Some(asset);
            }
        }
        let asset = assets.resolve(handle)?;
        *cache = Arc::downgrade(&asset);
        Some(asset)
    }
}

impl Clone for SubGraphReference {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            cache: Mutex::new(self.cache.lock().clone()),
        }
    }
}

/// Wrapper node state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubGraphNode {
    /// The referenced sub-graph
    pub reference: SubGraphReference,
    /// Input slot identities in property declaration order
    #[serde(default)]
    input_order: Vec<SlotId>,
}

impl SubGraphNode {
    /// Create a wrapper for `handle`
    pub fn new(handle: Option<AssetHandle>) -> Self {
        Self {
            reference: SubGraphReference::new(handle),
            input_order: Vec::new(),
        }
    }

    /// Input slots in the order the sub-graph declares its properties
    pub fn ordered_inputs<'a>(&'a self, slots: &'a SlotRegistry) -> impl Iterator<Item = &'a Slot> + 'a {
        self.input_order.iter().filter_map(|id| slots.slot(*id))
    }

    /// Re-derive `slots` from the referenced sub-graph
    ///
    /// Slots whose identity persists are replaced in place; every other slot
    /// is removed. Returns whether the slot set changed. An identity
    /// collision aborts before anything is modified.
    pub fn sync_slots(&mut self, slots: &mut SlotRegistry, assets: &dyn AssetResolver) -> Result<bool, SlotError> {
        let before = slots.clone();

        // The definition may have been replaced in the store since the last sync
        self.reference.invalidate();

        let Some(asset) = self.reference.resolve(assets) else {
            self.input_order.clear();
            slots.remove_slots_not_in(&HashSet::new());
            return Ok(*slots != before);
        };

        let mut fresh = Vec::new();
        let mut claimed: HashMap<SlotId, String> = HashMap::new();
        let mut claim = |slot: Slot| -> Result<Slot, SlotError> {
            if let Some(first) = claimed.insert(slot.id, slot.display_name.clone()) {
                return Err(SlotError::IdentityCollision {
                    id: slot.id,
                    first,
                    second: slot.display_name,
                });
            }
            Ok(slot)
        };

        for property in asset.graph.properties() {
            fresh.push(claim(property.to_input_slot()?)?);
        }
        let inputs = fresh.len();
        for port in asset.graph.graph_outputs() {
            fresh.push(claim(Slot::new(
                port.id,
                port.display_name.clone(),
                port.shader_output_name.clone(),
                SlotDirection::Output,
                port.value_type,
            ))?);
        }

        self.input_order = fresh[..inputs].iter().map(|s| s.id).collect();
        let valid: HashSet<SlotId> = fresh.iter().map(|s| s.id).collect();
        for slot in fresh {
            slots.add_slot(slot);
        }
        slots.remove_slots_not_in(&valid);

        let changed = *slots != before;
        if changed {
            tracing::debug!(
                "Synchronised slots with sub-graph '{}': {} input(s), {} output(s)",
                asset.name,
                inputs,
                valid.len() - inputs
            );
        }
        Ok(changed)
    }

    /// Generated function name; the sentinel `ERROR` when unresolved
    pub fn function_name(&self, assets: &dyn AssetResolver) -> String {
        codegen::sub_graph_function_name(self.reference.resolve(assets).as_deref())
    }

    /// Fold `capability` over the active nodes of the referenced sub-graph
    pub fn requirement_within(
        &self,
        capability: Capability,
        assets: &dyn AssetResolver,
        expanding: &mut Vec<AssetHandle>,
    ) -> Requirement {
        let Some(asset) = self.reference.resolve(assets) else {
            return capability.neutral();
        };
        if expanding.contains(&asset.handle) {
            tracing::warn!("Sub-graph '{}' references itself, skipping", asset.name);
            return capability.neutral();
        }

        expanding.push(asset.handle);
        let requirement = aggregate_within(asset.graph.active_nodes(), capability, assets, expanding);
        expanding.pop();
        requirement
    }

    /// Register the functions of the nested graph, then the wrapping function
    pub(crate) fn generate_function<S: FunctionSink>(
        &self,
        ctx: &GenerationContext<'_>,
        sink: &mut S,
        expanding: &mut Vec<AssetHandle>,
    ) {
        let Some(asset) = self.reference.resolve(ctx.assets) else {
            return;
        };
        if expanding.contains(&asset.handle) {
            tracing::warn!("Sub-graph '{}' references itself, skipping", asset.name);
            return;
        }

        let inner = ctx.for_graph(&asset.graph);
        expanding.push(asset.handle);
        codegen::generate_functions_within(&inner, sink, expanding);
        expanding.pop();

        let name = codegen::sub_graph_function_name(Some(asset.as_ref()));
        sink.provide_function(&name, |writer| {
            codegen::write_graph_function(&inner, &name, true, writer);
        });
    }

    /// Declare one local per output, then call the generated function
    pub fn generate_code(&self, node: &Node, ctx: &GenerationContext<'_>, writer: &mut ShaderWriter) {
        let Some(asset) = self.reference.resolve(ctx.assets) else {
            return;
        };
        let precision = ctx.settings.precision;

        for port in asset.graph.graph_outputs() {
            writer.add_line(format!(
                "{} {};",
                port.value_type.shader_type(precision),
                node.variable_name_for_slot(port.id)
            ));
        }

        let mut arguments = Vec::new();
        for property in asset.graph.properties() {
            let id = property.slot_id();
            let value = if node.slot(id).is_some() {
                slot_value(ctx, node, id)
            } else {
                // Out of sync with the sub-graph; pass the property default
                property
                    .default_literal(precision)
                    .unwrap_or_else(|| property.reference_name.clone())
            };
            let Ok(value_type) = property.slot_type() else {
                continue;
            };
            arguments.push(texture_argument(value_type, value));
        }
        arguments.push(ctx.settings.context_argument.clone());
        arguments.extend(asset.graph.graph_outputs().map(|port| node.variable_name_for_slot(port.id)));

        writer.add_line(format!(
            "{}({});",
            codegen::sub_graph_function_name(Some(asset.as_ref())),
            arguments.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetStore, NoAssets};
    use crate::property::{Property, PropertyValue};
    use crate::shader_graph::ShaderGraph;
    use crate::slot::{SlotValue, SlotValueType, TextureRef};

    fn store_with(graph: ShaderGraph) -> (AssetStore, AssetHandle) {
        let mut store = AssetStore::new();
        let asset = store.insert(SubGraphAsset::new("Blend", graph));
        (store, asset.handle)
    }

    #[test]
    fn test_two_floats_three_outputs() {
        let mut graph = ShaderGraph::new_sub_graph("Blend");
        let a = Property::new("A", PropertyValue::Float(0.25));
        let b = Property::new("B", PropertyValue::Float(0.75));
        graph.add_property(a.clone()).unwrap();
        graph.add_property(b.clone()).unwrap();
        for _ in 0..3 {
            graph.add_output();
        }
        let (store, handle) = store_with(graph);

        let mut sub_graph = SubGraphNode::new(Some(handle));
        let mut slots = SlotRegistry::new();
        assert!(sub_graph.sync_slots(&mut slots, &store).unwrap());

        let inputs: Vec<_> = sub_graph.ordered_inputs(&slots).map(|s| s.display_name.as_str()).collect();
        assert_eq!(inputs, vec!["A", "B"]);
        assert_eq!(slots.input_slots().count(), 2);
        assert_eq!(slots.slot(a.slot_id()).unwrap().default_value, SlotValue::Vector1(0.25));

        let outputs: Vec<_> = slots.output_slots().map(|s| (s.id.value(), s.display_name.as_str())).collect();
        assert_eq!(outputs, vec![(1, "Output 1"), (2, "Output 2"), (3, "Output 3")]);
        assert!(slots.output_slots().all(|s| s.value_type == SlotValueType::Vector4));
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut graph = ShaderGraph::new_sub_graph("Blend");
        graph.add_property(Property::new("Tint", PropertyValue::Color([1.0; 4]))).unwrap();
        graph
            .add_property(Property::new("Noise", PropertyValue::Texture(None)))
            .unwrap();
        graph.add_output();
        let (store, handle) = store_with(graph);

        let mut sub_graph = SubGraphNode::new(Some(handle));
        let mut slots = SlotRegistry::new();
        sub_graph.sync_slots(&mut slots, &store).unwrap();
        let first = slots.clone();
        let first_order: Vec<_> = sub_graph.ordered_inputs(&slots).map(|s| s.id).collect();

        assert!(!sub_graph.sync_slots(&mut slots, &store).unwrap());
        assert_eq!(slots, first);
        let second_order: Vec<_> = sub_graph.ordered_inputs(&slots).map(|s| s.id).collect();
        assert_eq!(first_order, second_order);
    }

    #[test]
    fn test_authored_values_survive_sync() {
        let mut graph = ShaderGraph::new_sub_graph("Blend");
        let amount = Property::new("Amount", PropertyValue::Float(0.5));
        graph.add_property(amount.clone()).unwrap();
        let (store, handle) = store_with(graph);

        let mut sub_graph = SubGraphNode::new(Some(handle));
        let mut slots = SlotRegistry::new();
        sub_graph.sync_slots(&mut slots, &store).unwrap();
        slots.slot_mut(amount.slot_id()).unwrap().default_value = SlotValue::Vector1(0.9);

        sub_graph.sync_slots(&mut slots, &store).unwrap();
        assert_eq!(slots.slot(amount.slot_id()).unwrap().default_value, SlotValue::Vector1(0.9));
    }

    #[test]
    fn test_unbound_removes_everything() {
        let mut slots = SlotRegistry::new();
        slots.add_slot(Slot::input(SlotId::positional(1), "Stale", SlotValueType::Vector1));

        let mut sub_graph = SubGraphNode::new(None);
        assert!(sub_graph.sync_slots(&mut slots, &NoAssets).unwrap());
        assert!(slots.is_empty());
        assert_eq!(sub_graph.function_name(&NoAssets), "ERROR");
        for capability in Capability::all() {
            assert!(sub_graph
                .requirement_within(capability, &NoAssets, &mut Vec::new())
                .is_neutral());
        }
    }

    #[test]
    fn test_missing_output_node_keeps_inputs() {
        let mut graph = ShaderGraph::new("NoOutputs");
        graph.add_property(Property::new("A", PropertyValue::Vector3([0.0; 3]))).unwrap();
        let (store, handle) = store_with(graph);

        let mut sub_graph = SubGraphNode::new(Some(handle));
        let mut slots = SlotRegistry::new();
        sub_graph.sync_slots(&mut slots, &store).unwrap();
        assert_eq!(slots.input_slots().count(), 1);
        assert_eq!(slots.output_slots().count(), 0);
    }

    #[test]
    fn test_texture_default_carried_to_wrapper() {
        let mut graph = ShaderGraph::new_sub_graph("Blend");
        let texture = TextureRef("Textures/Noise.png".to_string());
        let noise = Property::new("Noise", PropertyValue::Texture(Some(texture.clone())));
        graph.add_property(noise.clone()).unwrap();
        let (store, handle) = store_with(graph);

        let mut sub_graph = SubGraphNode::new(Some(handle));
        let mut slots = SlotRegistry::new();
        sub_graph.sync_slots(&mut slots, &store).unwrap();
        assert_eq!(slots.slot(noise.slot_id()).unwrap().default_value.texture(), Some(&texture));
    }

    #[test]
    fn test_reference_cache_follows_handle() {
        let (mut store, handle) = store_with(ShaderGraph::new_sub_graph("Blend"));
        let other = store.insert(SubGraphAsset::new("Other", ShaderGraph::new_sub_graph("Other")));

        let mut reference = SubGraphReference::new(Some(handle));
        assert_eq!(reference.resolve(&store).unwrap().name, "Blend");
        // Served from the cache
        assert_eq!(reference.resolve(&NoAssets).unwrap().name, "Blend");

        reference.set_handle(Some(other.handle));
        assert_eq!(reference.resolve(&store).unwrap().name, "Other");

        reference.set_handle(None);
        assert!(reference.resolve(&store).is_none());
    }

    #[test]
    fn test_sync_picks_up_replaced_definition() {
        let mut graph = ShaderGraph::new_sub_graph("Blend");
        graph.add_output();
        let mut store = AssetStore::new();
        let held = store.insert(SubGraphAsset::new("Blend", graph.clone()));

        let mut sub_graph = SubGraphNode::new(Some(held.handle));
        let mut slots = SlotRegistry::new();
        sub_graph.sync_slots(&mut slots, &store).unwrap();
        assert_eq!(slots.output_slots().count(), 1);

        // Replace the definition while the old one is still alive
        graph.add_output();
        graph.add_output();
        store.insert(SubGraphAsset::new("Blend", graph).with_handle(held.handle));
        assert_eq!(held.graph.graph_outputs().count(), 1);

        assert!(sub_graph.sync_slots(&mut slots, &store).unwrap());
        assert_eq!(slots.output_slots().count(), 3);
        let resolved = sub_graph.reference.resolve(&store).unwrap();
        assert!(!Arc::ptr_eq(&resolved, &held));
    }

    #[test]
    fn test_identity_collision_leaves_node_untouched() {
        let mut graph = ShaderGraph::new_sub_graph("Blend");
        let a = Property::new("A", PropertyValue::Float(0.0));
        graph.add_property(a.clone()).unwrap();
        graph.add_output();
        let mut store = AssetStore::new();
        let asset = store.insert(SubGraphAsset::new("Blend", graph.clone()));

        let mut sub_graph = SubGraphNode::new(Some(asset.handle));
        let mut slots = SlotRegistry::new();
        sub_graph.sync_slots(&mut slots, &store).unwrap();
        let slots_before = slots.clone();
        let order_before = sub_graph.input_order.clone();

        let mut twin = Property::new("B", PropertyValue::Float(1.0));
        twin.guid = a.guid;
        graph.add_property(twin).unwrap();
        store.insert(SubGraphAsset::new("Blend", graph).with_handle(asset.handle));

        let err = sub_graph.sync_slots(&mut slots, &store).unwrap_err();
        assert!(matches!(
            err,
            SlotError::IdentityCollision { ref first, ref second, .. } if first == "A" && second == "B"
        ));
        assert_eq!(slots, slots_before);
        assert_eq!(sub_graph.input_order, order_before);
    }

    #[test]
    fn test_function_name_is_shared() {
        let (store, handle) = store_with(ShaderGraph::new_sub_graph("Blend"));
        let first = SubGraphNode::new(Some(handle));
        let second = SubGraphNode::new(Some(handle));
        let name = first.function_name(&store);
        assert!(name.starts_with("Blend_"));
        assert_eq!(name, second.function_name(&store));
    }
}
