//! Kernel source generation for the fused depthwise + 1x1 conv operation.
//!
//! The emitted dialect is the delegate's portable kernel language: the
//! execution layer expands `MAIN_FUNCTION`, `GLOBAL_ID_*`, `FLT4` and the
//! `args.<name>` accessors per backend API. Every packed-constant read takes
//! its offset from the shared [`PackingPlan`] cursor, one read token per
//! buffer element.

use super::plan::{PackingPlan, SlotCursor, SlotKind};
use crate::{
    Arguments, Axis, DepthwiseConv2dAttributes, GpuInfo, GpuOperation, OperationDef,
    ReluAttributes, TensorDescriptor,
};
use std::fmt::Write;

const LANE_POSTFIX: [&str; 4] = [".x", ".xy", ".xyz", ""];

/// One accumulate of `a * b` into `accum`. AMD's OpenCL compiler only forms
/// fma from the explicit builtin.
fn multiply_accumulate(gpu: &GpuInfo, accum: &str, a: &str, b: &str) -> String {
    if gpu.is_amd() && gpu.is_api_opencl() {
        format!("{accum} = fma({a}, {b}, {accum})")
    } else {
        format!("{accum} += {a} * {b}")
    }
}

/// Four sequential constant reads assembled into a FLT4.
fn read_vec4(cursor: &mut SlotCursor<'_>, kind: SlotKind) -> String {
    let a = cursor.take(kind);
    let b = cursor.take(kind);
    let c = cursor.take(kind);
    let d = cursor.take(kind);
    format!(
        "INIT_FLT4v4(args.constants.Read({a}), args.constants.Read({b}), \
         args.constants.Read({c}), args.constants.Read({d}))"
    )
}

/// Emit the activation applied in place to accumulator `var`.
///
/// The activation's effect is an expression over exactly one variable; it is
/// rendered directly against the accumulator name, so no placeholder
/// substitution (and no substring collision) is involved.
fn splice_activation(attr: &ReluAttributes, var: &str) -> String {
    let lower = if attr.alpha != 0.0 {
        format!("min({var} * args.activation_alpha, INIT_FLT4(0.0f))")
    } else {
        "INIT_FLT4(0.0f)".to_string()
    };
    if attr.clip != 0.0 {
        format!("  {var} = clamp({var}, {lower}, INIT_FLT4(args.activation_clip));\n")
    } else {
        format!("  {var} = max({var}, {lower});\n")
    }
}

fn push_activation_args(attr: &ReluAttributes, args: &mut Arguments) {
    if attr.alpha != 0.0 {
        args.add_float("activation_alpha", attr.alpha);
    }
    if attr.clip != 0.0 {
        args.add_float("activation_clip", attr.clip);
    }
}

fn supports_zero_clamp(desc: Option<&TensorDescriptor>, axis: Axis, gpu: &GpuInfo) -> bool {
    desc.map(|d| d.supports_zero_clamp(axis, gpu)).unwrap_or(false)
}

/// Generate the fused kernel body and populate `result`'s tensor bindings
/// and scalar arguments. `plan` must have been built from the same weight
/// shapes as `dw_attr` and the 1x1 conv this kernel folds in.
pub(super) fn generate_code(
    definition: &OperationDef,
    gpu: &GpuInfo,
    dw_attr: &DepthwiseConv2dAttributes,
    relu_attr: Option<&ReluAttributes>,
    plan: &PackingPlan,
    result: &mut GpuOperation,
) -> String {
    let src_desc = definition.src_tensors.first();
    let dst_desc = definition.dst_tensors.first();
    if let Some(desc) = src_desc {
        result.add_src_tensor("src_tensor", desc.clone());
    }
    if let Some(desc) = dst_desc {
        result.add_dst_tensor("dst_tensor", desc.clone());
    }

    result.args.add_int("stride_x", dw_attr.strides.w);
    result.args.add_int("padding_x", -dw_attr.padding.prepended.w);
    result.args.add_int("dilation_x", dw_attr.dilations.w);
    result.args.add_int("stride_y", dw_attr.strides.h);
    result.args.add_int("padding_y", -dw_attr.padding.prepended.h);
    result.args.add_int("dilation_y", dw_attr.dilations.h);
    if let Some(attr) = relu_attr {
        push_activation_args(attr, &mut result.args);
    }

    let dw_shape = dw_attr.weights.shape;
    let clamp_w = supports_zero_clamp(src_desc, Axis::Width, gpu);
    let clamp_h = supports_zero_clamp(src_desc, Axis::Height, gpu);
    let mut cursor = plan.cursor();

    let mut c = String::with_capacity(4096);
    c.push_str("MAIN_FUNCTION($0) {\n");
    if dst_desc.map(|d| d.has_axis(Axis::Batch)).unwrap_or(false) {
        c.push_str("  int linear_id = GLOBAL_ID_0;\n");
        c.push_str("  int X = linear_id / args.dst_tensor.Batch();\n");
        c.push_str("  int B = linear_id % args.dst_tensor.Batch();\n");
        c.push_str("  args.dst_tensor.SetBatchRef(B);\n");
        c.push_str("  args.src_tensor.SetBatchRef(B);\n");
    } else {
        c.push_str("  int X = GLOBAL_ID_0;\n");
    }
    c.push_str("  int Y = GLOBAL_ID_1;\n");
    c.push_str("  if (X >= args.dst_tensor.Width() || Y >= args.dst_tensor.Height()) {\n");
    c.push_str("    return;\n");
    c.push_str("  }\n");

    // Depthwise accumulators seeded from the bias region.
    for d in 0..plan.intermediate_depth {
        let bias = read_vec4(&mut cursor, SlotKind::DwBias);
        let _ = writeln!(c, "  FLT4 dw_res_{d} = {bias};");
    }
    c.push_str("  int x_offseted = X * args.stride_x + args.padding_x;\n");
    c.push_str("  int y_offseted = Y * args.stride_y + args.padding_y;\n");
    c.push_str("  int x_c, y_c;\n");

    // Branch-free boundary handling: clamp the coordinate and zero the
    // contribution through a multiplicative flag.
    let boundary_check = match (clamp_w, clamp_h) {
        (false, false) => Some("x_in && y_in"),
        (false, true) => Some("x_in"),
        (true, false) => Some("y_in"),
        (true, true) => None,
    };
    if !clamp_h {
        c.push_str("  bool y_in;\n");
    }
    if !clamp_w {
        c.push_str("  bool x_in;\n");
    }

    c.push_str("  FLT4 src;\n");
    c.push_str("  FLT4 f;\n");
    for d in 0..plan.intermediate_depth {
        let src_ch_count = std::cmp::min(4, dw_shape.i - d * 4);
        let postfix = LANE_POSTFIX[src_ch_count - 1];
        for ky in 0..dw_shape.h {
            let _ = writeln!(c, "  y_c = y_offseted + {ky} * args.dilation_y;");
            if !clamp_h {
                c.push_str("  y_in = y_c >= 0 && y_c < args.src_tensor.Height();\n");
                c.push_str("  y_c = clamp(y_c, 0, args.src_tensor.Height() - 1);\n");
            }
            for kx in 0..dw_shape.w {
                let _ = writeln!(c, "  x_c = x_offseted + {kx} * args.dilation_x;");
                if !clamp_w {
                    c.push_str("  x_in = x_c >= 0 && x_c < args.src_tensor.Width();\n");
                    c.push_str("  x_c = clamp(x_c, 0, args.src_tensor.Width() - 1);\n");
                }
                let multiplier = boundary_check
                    .map(|check| format!(" * INIT_FLT({check})"))
                    .unwrap_or_default();
                let _ = writeln!(
                    c,
                    "  src{postfix} = args.src_tensor.Read(x_c, y_c, {d}){postfix}{multiplier};"
                );
                let weights = read_vec4(&mut cursor, SlotKind::DwWeight);
                let _ = writeln!(c, "  f = {weights};");
                let mad = multiply_accumulate(
                    gpu,
                    &format!("dw_res_{d}{postfix}"),
                    &format!("src{postfix}"),
                    &format!("f{postfix}"),
                );
                let _ = writeln!(c, "  {mad};");
            }
        }
    }

    if let Some(attr) = relu_attr {
        for d in 0..plan.intermediate_depth {
            c.push_str(&splice_activation(attr, &format!("dw_res_{d}")));
        }
    }

    // 1x1 conv accumulators seeded from the conv bias region.
    for d in 0..plan.result_depth {
        let bias = read_vec4(&mut cursor, SlotKind::ConvBias);
        let _ = writeln!(c, "  FLT4 conv_res_{d} = {bias};");
    }
    for d in 0..plan.result_depth {
        for s in 0..plan.intermediate_depth {
            let src = format!("dw_res_{s}");
            let dst = format!("conv_res_{d}");
            for lane in ["x", "y", "z", "w"] {
                let weights = read_vec4(&mut cursor, SlotKind::ConvWeight);
                let mad = multiply_accumulate(gpu, &dst, &weights, &format!("{src}.{lane}"));
                let _ = writeln!(c, "  {mad};");
            }
        }
        let _ = writeln!(c, "  args.dst_tensor.Write(conv_res_{d}, X, Y, {d});");
    }
    c.push_str("}\n");

    debug_assert!(cursor.is_exhausted(), "codegen consumed {} of {} plan slots", cursor.consumed(), plan.len());
    log::trace!(
        "generated fused dw+1x1 kernel: {} bytes, {} constant reads",
        c.len(),
        cursor.consumed()
    );
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GpuApi, GpuVendor};

    #[test]
    fn fma_only_on_amd_opencl() {
        let amd = GpuInfo::new(GpuVendor::Amd, GpuApi::OpenCl);
        assert_eq!(
            multiply_accumulate(&amd, "acc", "a", "b"),
            "acc = fma(a, b, acc)"
        );

        let amd_vk = GpuInfo::new(GpuVendor::Amd, GpuApi::Vulkan);
        assert_eq!(multiply_accumulate(&amd_vk, "acc", "a", "b"), "acc += a * b");

        let apple = GpuInfo::new(GpuVendor::Apple, GpuApi::Metal);
        assert_eq!(multiply_accumulate(&apple, "acc", "a", "b"), "acc += a * b");
    }

    #[test]
    fn activation_splice_targets_the_given_variable() {
        let plain = splice_activation(&ReluAttributes::relu(), "dw_res_3");
        assert_eq!(plain, "  dw_res_3 = max(dw_res_3, INIT_FLT4(0.0f));\n");

        let relu6 = splice_activation(&ReluAttributes::relu6(), "dw_res_0");
        assert!(relu6.contains("clamp(dw_res_0"));
        assert!(relu6.contains("args.activation_clip"));

        let leaky = splice_activation(&ReluAttributes::new(0.1, 0.0), "acc");
        assert_eq!(
            leaky,
            "  acc = max(acc, min(acc * args.activation_alpha, INIT_FLT4(0.0f)));\n"
        );
    }
}
