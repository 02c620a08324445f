//! Admission heuristic for the depthwise + 1x1 conv fusion.
//!
//! The structural prerequisites are hard requirements of the generated
//! kernel; the per-vendor channel ceilings are empirically tuned
//! configuration and carry no derivation.

use crate::{
    div_round_up, recommended_conv_block_size, Axis, Bhwc, Conv2dAttributes,
    DepthwiseConv2dAttributes, GpuInfo, Hw, OperationDef, Precision,
};

/// Pure predicate: is fusing this pair legal and expected to be profitable
/// on `gpu` at the definition's precision?
pub fn is_fusion_supported(
    definition: &OperationDef,
    gpu: &GpuInfo,
    dw_attr: &DepthwiseConv2dAttributes,
    conv_attr: &Conv2dAttributes,
    dst_shape: Option<&Bhwc>,
) -> bool {
    let dw_shape = dw_attr.weights.shape;
    let conv_shape = conv_attr.weights.shape;

    // Structural prerequisites, hardware-independent: the kernel carries the
    // depthwise result in registers, so no channel multiplier, and the 1x1
    // conv must be a pure per-pixel projection.
    let good_dw = dw_shape.o == 1;
    let good_conv = conv_shape.w == 1
        && conv_shape.h == 1
        && conv_attr.dilations == Hw::new(1, 1)
        && conv_attr.strides == Hw::new(1, 1)
        && conv_attr.padding.is_zero();
    if !(good_dw && good_conv) {
        return false;
    }

    let dw_within = |max_ch: usize, max_volume: usize| {
        dw_shape.i <= max_ch && dw_shape.i * dw_shape.h * dw_shape.w <= max_volume
    };
    let conv_within =
        |max_out: usize, max_product: usize| conv_shape.o <= max_out && conv_shape.i * conv_shape.o <= max_product;

    if gpu.is_apple() {
        if definition.precision == Precision::F16 {
            dw_within(16, 3 * 3 * 16) && conv_within(16, 16 * 16)
        } else {
            dw_within(16, 3 * 3 * 16) && conv_within(8, 8 * 16)
        }
    } else if gpu.is_mali() {
        if gpu.mali.map(|m| m.is_midgard()).unwrap_or(false) {
            return false;
        }
        // All channel groups stay live in registers; if the conv selector
        // would already have shrunk its block size for this task, the fused
        // kernel's register pressure is a net loss.
        if let Some(dst) = dst_shape {
            let dst_slices = div_round_up(dst.c, 4);
            let task_size = dst.b * dst.h * dst.w * dst_slices;
            let block_size = recommended_conv_block_size(gpu, definition.precision, task_size);
            if block_size < 4 && dst_slices >= 2 {
                return false;
            }
            if block_size < 2 && dst_slices >= 4 {
                return false;
            }
        }
        let src_clamps = definition
            .src_tensors
            .first()
            .map(|src| {
                src.supports_zero_clamp(Axis::Width, gpu) && src.supports_zero_clamp(Axis::Height, gpu)
            })
            .unwrap_or(false);
        if definition.precision == Precision::F16 && src_clamps {
            dw_within(16, 3 * 3 * 16) && conv_within(16, 16 * 16)
        } else {
            false
        }
    } else if definition.precision == Precision::F16 {
        dw_within(32, 3 * 3 * 32) && conv_within(32, 32 * 32)
    } else {
        dw_within(16, 3 * 3 * 16) && conv_within(32, 16 * 32)
    }
}
