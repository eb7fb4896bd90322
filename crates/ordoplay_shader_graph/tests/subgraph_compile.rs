// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end compilation of graphs with sub-graph nodes.

use ordoplay_shader_graph::codegen::sub_graph_function_name;
use ordoplay_shader_graph::library::{create_function_library, NodeLibrary};
use ordoplay_shader_graph::nodes::PropertyNode;
use ordoplay_shader_graph::validation::ValidationError;
use ordoplay_shader_graph::{
    AssetHandle, AssetResolver, AssetStore, CompileError, FunctionRegistry, MayRequire, NeededCoordinateSpace, Node,
    NodeId, Property, PropertyValue, ShaderCompiler, ShaderGraph, SharedFunctionRegistry, SlotId, SubGraphAsset,
    UvChannel,
};

/// Sub-graph "Blend": `A` (float) feeds Output 1, `Tex` sampled at UV0 feeds Output 2
fn blend_graph(library: &NodeLibrary) -> ShaderGraph {
    let mut graph = ShaderGraph::new_sub_graph("Blend");
    let a = Property::new("A", PropertyValue::Float(0.5)).with_reference_name("A");
    let tex = Property::new("Tex", PropertyValue::Texture(None)).with_reference_name("Tex");
    graph.add_property(a.clone()).unwrap();
    graph.add_property(tex.clone()).unwrap();
    graph.add_output();
    graph.add_output();

    let output = graph.output_node_id().unwrap();
    let read_a = graph.add_node(Node::property(&a).unwrap());
    let read_tex = graph.add_node(Node::property(&tex).unwrap());
    let uv = graph.add_node(library.create_node("uv").unwrap());
    let sample = graph.add_node(library.create_node("sample_texture_2d").unwrap());

    graph.connect(read_a, PropertyNode::OUTPUT, output, SlotId::positional(1)).unwrap();
    graph.connect(read_tex, PropertyNode::OUTPUT, sample, SlotId::positional(0)).unwrap();
    graph.connect(uv, SlotId::positional(0), sample, SlotId::positional(1)).unwrap();
    graph.connect(sample, SlotId::positional(2), output, SlotId::positional(2)).unwrap();
    graph
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn insert(store: &mut AssetStore, name: &str, graph: ShaderGraph) -> AssetHandle {
    store.insert(SubGraphAsset::new(name, graph)).handle
}

fn wrapper(graph: &mut ShaderGraph, handle: AssetHandle, store: &AssetStore) -> NodeId {
    graph.add_node(Node::sub_graph(Some(handle), store).unwrap())
}

#[test]
fn test_two_wrappers_share_one_function() {
    init_tracing();
    let library = create_function_library();
    let mut store = AssetStore::new();
    let blend = insert(&mut store, "Blend", blend_graph(&library));

    let mut root = ShaderGraph::new("Root");
    let first = wrapper(&mut root, blend, &store);
    let second = wrapper(&mut root, blend, &store);

    let compiled = ShaderCompiler::default().compile(&mut root, &store).unwrap();
    let function = sub_graph_function_name(store.resolve(blend).as_deref());

    let names: Vec<&str> = compiled.functions.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.iter().filter(|n| **n == function).count(), 1);
    // Functions the sub-graph calls come first
    assert_eq!(names.last(), Some(&function.as_str()));
    assert!(names.contains(&"Unity_SampleTexture2D_float"));
    assert!(names.contains(&"Unity_UV0_float"));

    let calls = compiled.entry.lines().filter(|l| l.contains(&format!("{function}("))).count();
    assert_eq!(calls, 2);
    assert!(root.node(first).unwrap().output_slots().count() == 2);
    assert!(root.node(second).unwrap().input_slots().count() == 2);
}

#[test]
fn test_sub_graph_function_and_call_site() {
    let library = create_function_library();
    let mut store = AssetStore::new();
    let blend = insert(&mut store, "Blend", blend_graph(&library));

    let mut root = ShaderGraph::new("Root");
    let node_id = wrapper(&mut root, blend, &store);
    let compiled = ShaderCompiler::default().compile(&mut root, &store).unwrap();

    let asset = store.resolve(blend).unwrap();
    let function = sub_graph_function_name(Some(asset.as_ref()));
    let body = &compiled.functions.iter().find(|(n, _)| *n == function).unwrap().1;
    assert!(body.starts_with(&format!(
        "void {function}(float A, TEXTURE2D_ARGS(Tex, samplerTex), SurfaceInputs IN, out float4 Output1, out float4 Output2)\n{{\n"
    )));
    assert!(body.lines().any(|l| l == "    Output1 = A;"));
    assert!(body.ends_with("}\n"));

    let node = root.node(node_id).unwrap();
    let tex = asset.graph.properties()[1].slot_id();
    let uniform = node.variable_name_for_slot(tex);
    let out1 = node.variable_name_for_slot(SlotId::positional(1));
    let out2 = node.variable_name_for_slot(SlotId::positional(2));

    let lines: Vec<&str> = compiled.entry.lines().collect();
    assert!(lines.contains(&format!("    float4 {out1};").as_str()));
    assert!(lines.contains(&format!("    float4 {out2};").as_str()));
    let call = format!("    {function}(0.5, TEXTURE2D_PARAM({uniform}, sampler{uniform}), IN, {out1}, {out2});");
    assert!(lines.contains(&call.as_str()), "{}", compiled.entry);

    // The unconnected texture input becomes a uniform
    assert!(compiled.properties.iter().any(|p| p.reference_name == uniform));
    assert!(compiled.uniforms.contains(&format!("TEXTURE2D({uniform});")));
}

#[test]
fn test_nested_requirements_and_order() {
    let library = create_function_library();
    let mut store = AssetStore::new();
    let blend = insert(&mut store, "Blend", blend_graph(&library));

    let mut outer = ShaderGraph::new_sub_graph("Outer");
    outer.add_output();
    let inner = wrapper(&mut outer, blend, &store);
    let normal = outer.add_node(library.create_node("normal_vector").unwrap());
    let output = outer.output_node_id().unwrap();
    outer.connect(inner, SlotId::positional(2), output, SlotId::positional(1)).unwrap();
    let outer_handle = insert(&mut store, "Outer", outer);

    let mut root = ShaderGraph::new("Root");
    let top = wrapper(&mut root, outer_handle, &store);
    let time = root.add_node(library.create_node("time").unwrap());

    let top_node = root.node(top).unwrap();
    assert!(top_node.requires_mesh_uv(UvChannel::Uv0, &store));
    assert_eq!(top_node.requires_normal(&store), NeededCoordinateSpace::WORLD);
    assert!(!top_node.requires_time(&store));

    let compiled = ShaderCompiler::default().compile(&mut root, &store).unwrap();
    assert_eq!(compiled.requirements.mesh_uv, vec![UvChannel::Uv0]);
    assert_eq!(compiled.requirements.normal, NeededCoordinateSpace::WORLD);
    assert!(compiled.requirements.time);
    assert!(!compiled.requirements.vertex_color);

    let names: Vec<&str> = compiled.functions.iter().map(|(n, _)| n.as_str()).collect();
    let blend_name = sub_graph_function_name(store.resolve(blend).as_deref());
    let outer_name = sub_graph_function_name(store.resolve(outer_handle).as_deref());
    let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(position(&blend_name) < position(&outer_name));

    // Disabling the normal node inside Outer drops the normal requirement
    let mut outer = store.resolve(outer_handle).unwrap().graph.clone();
    outer.node_mut(normal).unwrap().enabled = false;
    store.insert(SubGraphAsset::new("Outer", outer).with_handle(outer_handle));
    let top_node = root.node(top).unwrap();
    assert_eq!(top_node.requires_normal(&store), NeededCoordinateSpace::NONE);
    assert!(root.node(time).unwrap().requires_time(&store));
}

#[test]
fn test_adding_a_requiring_node_never_shrinks_the_aggregate() {
    let library = create_function_library();
    let mut sub = ShaderGraph::new_sub_graph("Grow");
    let mut store = AssetStore::new();
    let handle = AssetHandle::new();

    let mut previous: Option<(NeededCoordinateSpace, (bool, bool, bool))> = None;
    for id in ["position", "object_position", "vertex_color", "screen_position", "uv1", "add"] {
        sub.add_node(library.create_node(id).unwrap());
        store.insert(SubGraphAsset::new("Grow", sub.clone()).with_handle(handle));
        let node = Node::sub_graph(Some(handle), &store).unwrap();

        let position = node.requires_position(&store);
        let flags = (
            node.requires_vertex_color(&store),
            node.requires_screen_position(&store),
            node.requires_mesh_uv(UvChannel::Uv1, &store),
        );
        if let Some((prev_position, prev_flags)) = previous {
            assert!(position.contains(prev_position));
            assert!(flags.0 >= prev_flags.0 && flags.1 >= prev_flags.1 && flags.2 >= prev_flags.2);
        }
        previous = Some((position, flags));
    }
    let (position, flags) = previous.unwrap();
    assert_eq!(position, NeededCoordinateSpace::WORLD | NeededCoordinateSpace::OBJECT);
    assert_eq!(flags, (true, true, true));
}

#[test]
fn test_cyclic_reference_is_rejected_before_emission() {
    init_tracing();
    let mut store = AssetStore::new();
    let a = AssetHandle::new();
    let b = AssetHandle::new();

    let mut graph_a = ShaderGraph::new_sub_graph("A");
    wrapper(&mut graph_a, b, &store);
    let mut graph_b = ShaderGraph::new_sub_graph("B");
    wrapper(&mut graph_b, a, &store);
    store.insert(SubGraphAsset::new("A", graph_a).with_handle(a));
    store.insert(SubGraphAsset::new("B", graph_b).with_handle(b));

    let mut root = ShaderGraph::new("Root");
    wrapper(&mut root, a, &store);

    let mut registry = FunctionRegistry::new();
    let err = ShaderCompiler::default()
        .compile_with(&mut root, &store, &mut registry)
        .unwrap_err();
    match err {
        CompileError::Validation(ValidationError::CyclicSubGraph { chain }) => {
            assert_eq!(chain, vec!["A".to_string(), "B".to_string(), "A".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_unresolved_wrapper_is_neutral() {
    init_tracing();
    let library = create_function_library();
    let store = AssetStore::new();
    let mut root = ShaderGraph::new("Root");
    let unbound = root.add_node(Node::sub_graph(None, &store).unwrap());
    let missing = root.add_node(Node::sub_graph(Some(AssetHandle::new()), &store).unwrap());
    root.add_node(library.create_node("add").unwrap());

    for id in [unbound, missing] {
        let node = root.node(id).unwrap();
        assert!(node.slots.is_empty());
        assert_eq!(node.as_sub_graph().unwrap().function_name(&store), "ERROR");
        assert!(ordoplay_shader_graph::Capability::all().all(|c| node.requirement(c, &store).is_neutral()));
    }

    let compiled = ShaderCompiler::default().compile(&mut root, &store).unwrap();
    assert_eq!(compiled.report.flagged, vec![missing]);
    assert!(compiled.requirements.is_empty());
    assert!(!compiled.entry.contains("ERROR("));
    assert!(compiled.entry.contains("// Sub-graph has errors"));
    // Unrelated nodes still compile
    assert!(compiled.functions.iter().any(|(n, _)| n == "Unity_Add_float4"));
}

#[test]
fn test_flagged_wrapper_adds_no_requirements() {
    let library = create_function_library();
    let mut store = AssetStore::new();
    let mut inner = ShaderGraph::new_sub_graph("Inner");
    inner.add_output();
    let output = inner.output_node_id().unwrap();
    let uv = inner.add_node(library.create_node("uv").unwrap());
    inner.connect(uv, SlotId::positional(0), output, SlotId::positional(1)).unwrap();
    inner.add_node(Node::sub_graph(Some(AssetHandle::new()), &store).unwrap());
    let inner = insert(&mut store, "Inner", inner);

    let mut root = ShaderGraph::new("Root");
    let node_id = wrapper(&mut root, inner, &store);
    assert!(root.node(node_id).unwrap().requires_mesh_uv(UvChannel::Uv0, &store));

    let compiled = ShaderCompiler::default().compile(&mut root, &store).unwrap();
    assert_eq!(compiled.report.flagged, vec![node_id]);
    assert!(compiled.requirements.is_empty());
}

#[test]
fn test_refresh_keeps_surviving_connections() {
    init_tracing();
    let library = create_function_library();
    let mut store = AssetStore::new();
    let mut blend = blend_graph(&library);
    let handle = insert(&mut store, "Blend", blend.clone());

    let mut root = ShaderGraph::new("Root");
    let node_id = wrapper(&mut root, handle, &store);
    let add = root.add_node(library.create_node("add").unwrap());
    root.connect(node_id, SlotId::positional(1), add, SlotId::positional(0)).unwrap();
    root.connect(node_id, SlotId::positional(2), add, SlotId::positional(1)).unwrap();

    assert_eq!(root.refresh_sub_graph_nodes(&store).unwrap(), 0);
    assert_eq!(root.graph().connection_count(), 2);

    // A new port and a new property leave existing connections alone
    blend.add_output();
    blend
        .add_property(Property::new("Strength", PropertyValue::Vector2([1.0, 1.0])))
        .unwrap();
    store.insert(SubGraphAsset::new("Blend", blend.clone()).with_handle(handle));
    assert_eq!(root.refresh_sub_graph_nodes(&store).unwrap(), 1);
    assert_eq!(root.graph().connection_count(), 2);
    let node = root.node(node_id).unwrap();
    assert_eq!(node.output_slots().count(), 3);
    assert_eq!(node.input_slots().count(), 3);

    // Removing ports drops only the connections into them
    blend.remove_output();
    blend.remove_output();
    store.insert(SubGraphAsset::new("Blend", blend).with_handle(handle));
    assert_eq!(root.refresh_sub_graph_nodes(&store).unwrap(), 1);
    assert_eq!(root.graph().connection_count(), 1);
    let remaining = root.graph().connections().next().unwrap();
    assert_eq!(remaining.from_slot, SlotId::positional(1));
}

#[test]
fn test_refresh_uses_replaced_definition_while_old_one_is_held() {
    let mut store = AssetStore::new();
    let mut blend = ShaderGraph::new_sub_graph("Blend");
    blend.add_output();
    let held = store.insert(SubGraphAsset::new("Blend", blend.clone()));

    let mut root = ShaderGraph::new("Root");
    let node_id = wrapper(&mut root, held.handle, &store);

    blend.add_output();
    blend.add_output();
    store.insert(SubGraphAsset::new("Blend", blend).with_handle(held.handle));

    assert_eq!(root.refresh_sub_graph_nodes(&store).unwrap(), 1);
    assert_eq!(root.node(node_id).unwrap().output_slots().count(), 3);

    let compiled = ShaderCompiler::default().compile(&mut root, &store).unwrap();
    let function = sub_graph_function_name(store.resolve(held.handle).as_deref());
    let (_, body) = compiled.functions.iter().find(|(name, _)| *name == function).unwrap();
    assert!(body.contains("out float4 Output3"));
    assert_eq!(held.graph.graph_outputs().count(), 1);
}

#[test]
fn test_rebinding_replaces_slots() {
    let library = create_function_library();
    let mut store = AssetStore::new();
    let blend = insert(&mut store, "Blend", blend_graph(&library));
    let mut empty = ShaderGraph::new_sub_graph("Empty");
    empty.add_output();
    let empty = insert(&mut store, "Empty", empty);

    let mut root = ShaderGraph::new("Root");
    let node_id = wrapper(&mut root, blend, &store);
    let add = root.add_node(library.create_node("add").unwrap());
    root.connect(node_id, SlotId::positional(2), add, SlotId::positional(0)).unwrap();

    assert!(root.set_sub_graph(node_id, Some(empty), &store).unwrap());
    let node = root.node(node_id).unwrap();
    assert!(node.dirty);
    assert_eq!(node.input_slots().count(), 0);
    assert_eq!(node.output_slots().count(), 1);
    assert_eq!(root.graph().connection_count(), 0);

    assert!(!root.set_sub_graph(node_id, Some(empty), &store).unwrap());
    assert!(root.set_sub_graph(node_id, None, &store).unwrap());
    assert!(root.node(node_id).unwrap().slots.is_empty());
}

#[test]
fn test_parallel_passes_share_one_registry() {
    let library = create_function_library();
    let mut store = AssetStore::new();
    let blend = insert(&mut store, "Blend", blend_graph(&library));
    let registry = SharedFunctionRegistry::new();

    std::thread::scope(|scope| {
        for i in 0..4 {
            let mut registry = registry.clone();
            let store = &store;
            scope.spawn(move || {
                let mut root = ShaderGraph::new(format!("Root{i}"));
                root.add_node(Node::sub_graph(Some(blend), store).unwrap());
                ShaderCompiler::default()
                    .compile_with(&mut root, store, &mut registry)
                    .unwrap();
            });
        }
    });

    let snapshot = registry.snapshot();
    let function = sub_graph_function_name(store.resolve(blend).as_deref());
    assert_eq!(snapshot.names().filter(|n| *n == function).count(), 1);
    assert_eq!(snapshot.len(), 3);
}
