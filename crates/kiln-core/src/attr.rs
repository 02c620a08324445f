//! Operator attribute payloads for the operation kinds the fusion pass
//! inspects.

use crate::{Hw, Ohwi};
use derive_new::new;

/// Explicit spatial padding, prepended/appended per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Padding2d {
    pub prepended: Hw,
    pub appended: Hw,
}

impl Padding2d {
    pub fn zero() -> Self {
        Self::new(Hw::new(0, 0), Hw::new(0, 0))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

/// Dense convolution weights in OHWI order.
#[derive(Debug, Clone, PartialEq, new)]
pub struct WeightsTensor {
    pub shape: Ohwi,
    pub data: Vec<f32>,
}

impl WeightsTensor {
    /// Element at logical position `(o, y, x, i)`.
    pub fn get(&self, o: usize, y: usize, x: usize, i: usize) -> f32 {
        self.data[self.shape.linear_index(o, y, x, i)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthwiseConv2dAttributes {
    /// Weight shape `(channel_multiplier, kh, kw, in_channels)`.
    pub weights: WeightsTensor,
    pub bias: Vec<f32>,
    pub strides: Hw,
    pub dilations: Hw,
    pub padding: Padding2d,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conv2dAttributes {
    /// Weight shape `(out_channels, kh, kw, in_channels)`.
    pub weights: WeightsTensor,
    pub bias: Vec<f32>,
    pub strides: Hw,
    pub dilations: Hw,
    pub padding: Padding2d,
}

/// Parameters of the ReLU family: `max(x, alpha * x)`, optionally clipped
/// from above at `clip`. `alpha == 0, clip == 0` is plain ReLU.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct ReluAttributes {
    pub alpha: f32,
    pub clip: f32,
}

impl ReluAttributes {
    pub fn relu() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn relu6() -> Self {
        Self::new(0.0, 6.0)
    }
}
