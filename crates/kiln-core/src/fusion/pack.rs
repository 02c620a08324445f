//! Weight packing for the fused depthwise + 1x1 conv kernel.

use super::plan::{PackingPlan, WeightSlot};
use crate::{
    BufferDescriptor, Conv2dAttributes, DepthwiseConv2dAttributes, GpuInfo, MemoryKind, Precision,
};
use half::f16;

/// Serialize both operators' biases and weights into one device buffer in
/// plan order.
///
/// Element type follows the requested precision; address space is plain
/// global memory on Mali and AMD, the constant space elsewhere. Alignment
/// padding lanes are written as explicit zeros.
pub fn pack_fused_weights(
    plan: &PackingPlan,
    dw_attr: &DepthwiseConv2dAttributes,
    conv_attr: &Conv2dAttributes,
    gpu: &GpuInfo,
    precision: Precision,
) -> BufferDescriptor {
    let dw_shape = dw_attr.weights.shape;
    let conv_shape = conv_attr.weights.shape;

    let values = plan.slots.iter().map(|slot| match *slot {
        WeightSlot::DwBias { channel } => dw_attr.bias.get(channel).copied().unwrap_or(0.0),
        WeightSlot::DwWeight { y, x, channel } => {
            if channel < dw_shape.i {
                dw_attr.weights.get(0, y, x, channel)
            } else {
                0.0
            }
        }
        WeightSlot::ConvBias { channel } => conv_attr.bias.get(channel).copied().unwrap_or(0.0),
        WeightSlot::ConvWeight {
            dst_channel,
            src_channel,
        } => {
            if dst_channel < conv_shape.o && src_channel < conv_shape.i {
                conv_attr.weights.get(dst_channel, 0, 0, src_channel)
            } else {
                0.0
            }
        }
    });

    let element_dtype = precision.storage_dtype();
    let mut data = Vec::with_capacity(plan.len() * element_dtype.size_of());
    match element_dtype {
        crate::DType::F32 => {
            for v in values {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        crate::DType::F16 => {
            for v in values {
                data.extend_from_slice(&f16::from_f32(v).to_le_bytes());
            }
        }
    }

    let memory = if gpu.is_mali() || gpu.is_amd() {
        MemoryKind::Global
    } else {
        MemoryKind::Constant
    };

    BufferDescriptor {
        element_dtype,
        memory,
        data,
    }
}
