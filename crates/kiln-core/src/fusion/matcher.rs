//! Pattern matching and subgraph rewriting for the depthwise + 1x1 conv
//! fusion.

use super::codegen::generate_code;
use super::heuristic::is_fusion_supported;
use super::pack::pack_fused_weights;
use super::plan::PackingPlan;
use super::NotApplicable;
use crate::{
    flops, CompilerOption, Conv2dAttributes, DepthwiseConv2dAttributes, EdgeId, GpuInfo,
    GpuOperation, GpuSubgraph, GraphQuery, HashMap, HashSet, KernelSource, NodeId, Operation,
    OperationDef, Precision, ReluAttributes, TensorDescriptor, TensorToGrid,
};
use std::borrow::Cow;

/// Build the fused operation: generated kernel source, scalar and tensor
/// bindings, and the packed constants buffer.
pub fn create_depthwise_plus_1x1_conv(
    definition: &OperationDef,
    gpu: &GpuInfo,
    dw_attr: &DepthwiseConv2dAttributes,
    conv_attr: &Conv2dAttributes,
    relu_attr: Option<&ReluAttributes>,
) -> GpuOperation {
    let plan = PackingPlan::new(&dw_attr.weights.shape, &conv_attr.weights.shape);
    let mut result = GpuOperation::new(definition.clone());
    let code = generate_code(definition, gpu, dw_attr, relu_attr, &plan, &mut result);
    result.code = KernelSource(Cow::Owned(code));
    result.grid = TensorToGrid::WbToXHdToYZIsOne;
    if gpu.is_mali() {
        result.compiler_options.push(CompilerOption::FastRelaxedMath);
    }
    let constants = pack_fused_weights(&plan, dw_attr, conv_attr, gpu, definition.precision);
    result.args.add_buffer("constants", constants);
    result
}

/// Try to fuse `depthwise_conv [-> relu] -> conv_1x1` starting at
/// `first_node_id`.
///
/// Every rejection returns [`NotApplicable`] with no state touched; on
/// success the subgraph accumulator gains one fused operation and all
/// matched node ids enter `consumed_nodes`.
pub fn try_depthwise_conv_plus_1x1_conv<G: GraphQuery>(
    graph: &G,
    first_node_id: NodeId,
    precision: Precision,
    gpu: &GpuInfo,
    tensor_descriptors: &HashMap<EdgeId, TensorDescriptor>,
    consumed_nodes: &mut HashSet<NodeId>,
    gpu_subgraph: &mut GpuSubgraph,
) -> Result<(), NotApplicable> {
    if !(gpu.is_adreno() || gpu.is_nvidia() || gpu.is_mali() || gpu.is_apple() || gpu.is_amd()) {
        return Err(NotApplicable);
    }

    let dw_node = graph.node(first_node_id).ok_or(NotApplicable)?;
    let dw_attr = match &dw_node.op {
        Operation::DepthwiseConv2d(attr) => attr,
        _ => return Err(NotApplicable),
    };
    let dw_inputs = graph.inputs(dw_node.id);
    if dw_inputs.len() != 1 {
        return Err(NotApplicable);
    }
    let dw_outputs = graph.outputs(dw_node.id);
    let dw_output = *dw_outputs.first().ok_or(NotApplicable)?;
    let consumers = graph.consumers(dw_output);
    if consumers.len() != 1 {
        return Err(NotApplicable);
    }
    let mut next_node = graph.node(consumers[0]).ok_or(NotApplicable)?;
    if consumed_nodes.contains(&next_node.id) {
        return Err(NotApplicable);
    }

    let mut relu: Option<(NodeId, ReluAttributes)> = None;
    if let Operation::Relu(attr) = &next_node.op {
        let relu_outputs = graph.outputs(next_node.id);
        let relu_output = *relu_outputs.first().ok_or(NotApplicable)?;
        let consumers = graph.consumers(relu_output);
        if consumers.len() != 1 {
            return Err(NotApplicable);
        }
        relu = Some((next_node.id, *attr));
        next_node = graph.node(consumers[0]).ok_or(NotApplicable)?;
    }

    let conv_node = next_node;
    let conv_attr = match &conv_node.op {
        Operation::Conv2d(attr) => attr,
        _ => return Err(NotApplicable),
    };
    if graph.inputs(conv_node.id).len() != 1 {
        return Err(NotApplicable);
    }
    let conv_outputs = graph.outputs(conv_node.id);
    let conv_output = *conv_outputs.first().ok_or(NotApplicable)?;

    let mut op_def = OperationDef::new(precision);
    if let Some(desc) = tensor_descriptors.get(&dw_inputs[0]) {
        op_def.src_tensors.push(desc.clone());
    }
    if let Some(desc) = tensor_descriptors.get(&conv_output) {
        op_def.dst_tensors.push(desc.clone());
    }

    let dst_shape = graph.edge(conv_output).ok_or(NotApplicable)?.shape;
    if !is_fusion_supported(&op_def, gpu, dw_attr, conv_attr, Some(&dst_shape)) {
        return Err(NotApplicable);
    }
    let dw_dst_shape = graph.edge(dw_output).ok_or(NotApplicable)?.shape;

    // Matched and admitted: all mutation happens below this line.
    let relu_attr = relu.as_ref().map(|(_, attr)| attr);
    let mut operation = create_depthwise_plus_1x1_conv(&op_def, gpu, dw_attr, conv_attr, relu_attr);
    operation.flops = flops::depthwise_conv_flops(&dw_dst_shape, &dw_attr.weights.shape)
        + flops::conv_flops(&dst_shape, &conv_attr.weights.shape);

    let mut fused_nodes = format!("{:?}", dw_node.id);
    if let Some((relu_id, _)) = &relu {
        fused_nodes.push_str(&format!(" {relu_id:?}"));
    }
    fused_nodes.push_str(&format!(" {:?}", conv_node.id));
    log::debug!("fusing depthwise_conv_plus_1x1_conv over nodes [{fused_nodes}]");

    let slot = gpu_subgraph.add_single_operation(dw_inputs, graph.outputs(conv_node.id));
    slot.name = format!("depthwise_conv_plus_1x1_conv {fused_nodes}");
    slot.operation = Some(operation);

    consumed_nodes.insert(dw_node.id);
    if let Some((relu_id, _)) = relu {
        consumed_nodes.insert(relu_id);
    }
    consumed_nodes.insert(conv_node.id);
    Ok(())
}
