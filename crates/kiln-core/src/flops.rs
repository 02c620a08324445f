//! Floating-point cost estimators for fused-subgraph accounting.

use crate::{Bhwc, Ohwi};

/// Cost of a dense convolution producing `dst` with `weights`.
/// One multiply-add per weight tap per output element.
pub fn conv_flops(dst: &Bhwc, weights: &Ohwi) -> u64 {
    dst.numel() as u64 * 2 * (weights.h * weights.w * weights.i) as u64
}

/// Cost of a depthwise convolution producing `dst` with `weights`.
pub fn depthwise_conv_flops(dst: &Bhwc, weights: &Ohwi) -> u64 {
    dst.numel() as u64 * 2 * (weights.h * weights.w) as u64
}
