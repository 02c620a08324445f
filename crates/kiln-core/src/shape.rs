use derive_new::new;

/// Tensor axes a descriptor can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Batch,
    Height,
    Width,
    Channels,
    Depth,
}

/// Batch-height-width-channels activation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Bhwc {
    pub b: usize,
    pub h: usize,
    pub w: usize,
    pub c: usize,
}

impl Bhwc {
    pub fn numel(&self) -> usize {
        self.b * self.h * self.w * self.c
    }
}

/// Convolution weight shape in OHWI layout: output channels, kernel height,
/// kernel width, input channels.
///
/// For depthwise weights in this crate `o` is the channel multiplier and `i`
/// the number of input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Ohwi {
    pub o: usize,
    pub h: usize,
    pub w: usize,
    pub i: usize,
}

impl Ohwi {
    pub fn numel(&self) -> usize {
        self.o * self.h * self.w * self.i
    }

    /// Flat index of element `(o, y, x, i)` in OHWI memory order.
    pub fn linear_index(&self, o: usize, y: usize, x: usize, i: usize) -> usize {
        ((o * self.h + y) * self.w + x) * self.i + i
    }
}

/// A height/width pair (strides, dilations, padding extents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Hw {
    pub h: i32,
    pub w: i32,
}

/// Round `value` up to the next multiple of `n`.
pub fn align_by(value: usize, n: usize) -> usize {
    value.div_ceil(n) * n
}

/// `value / divisor`, rounded up.
pub fn div_round_up(value: usize, divisor: usize) -> usize {
    value.div_ceil(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ohwi_linear_index_is_innermost_on_channels() {
        let shape = Ohwi::new(1, 3, 3, 8);
        assert_eq!(shape.linear_index(0, 0, 0, 0), 0);
        assert_eq!(shape.linear_index(0, 0, 0, 7), 7);
        assert_eq!(shape.linear_index(0, 0, 1, 0), 8);
        assert_eq!(shape.linear_index(0, 1, 0, 0), 24);
        assert_eq!(shape.numel(), 72);
    }

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_by(8, 4), 8);
        assert_eq!(align_by(9, 4), 12);
        assert_eq!(div_round_up(8, 4), 2);
        assert_eq!(div_round_up(9, 4), 3);
    }
}
