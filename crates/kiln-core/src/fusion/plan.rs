//! Shared serialization plan for the fused depthwise + 1x1 conv kernel.
//!
//! The packed constants buffer and the generated source agree on one flat
//! element order. Both sides consume the same [`PackingPlan`]: the packer
//! serializes slot values in plan order, and the code generator pulls read
//! offsets from a [`SlotCursor`] over the same plan. An offset can therefore
//! never point at a differently-typed element than the packer wrote.

use crate::{align_by, div_round_up, Ohwi};

/// Kind tag for a [`WeightSlot`], used to cross-check cursor consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    DwBias,
    DwWeight,
    ConvBias,
    ConvWeight,
}

/// One scalar element of the packed constants buffer, identified by its
/// logical position in the source attribute tensors. Channels at or beyond
/// the true channel count are alignment padding and serialize as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSlot {
    DwBias { channel: usize },
    DwWeight { y: usize, x: usize, channel: usize },
    ConvBias { channel: usize },
    ConvWeight { dst_channel: usize, src_channel: usize },
}

impl WeightSlot {
    pub fn kind(&self) -> SlotKind {
        match self {
            WeightSlot::DwBias { .. } => SlotKind::DwBias,
            WeightSlot::DwWeight { .. } => SlotKind::DwWeight,
            WeightSlot::ConvBias { .. } => SlotKind::ConvBias,
            WeightSlot::ConvWeight { .. } => SlotKind::ConvWeight,
        }
    }
}

/// The complete element order of the packed buffer, plus the channel-group
/// counts both stages of the fused kernel iterate over.
#[derive(Debug)]
pub struct PackingPlan {
    pub slots: Vec<WeightSlot>,
    /// Channel groups carried from the depthwise stage: ceil(dw input channels / 4).
    pub intermediate_depth: usize,
    /// Output channel groups of the 1x1 conv: ceil(conv output channels / 4).
    pub result_depth: usize,
}

impl PackingPlan {
    /// Build the plan for the given depthwise and 1x1 conv weight shapes.
    ///
    /// Region order is fixed: depthwise bias, depthwise weights, conv bias,
    /// conv weights. Iteration orders inside the weight regions match the
    /// read order the generated kernel uses.
    pub fn new(dw_shape: &Ohwi, conv_shape: &Ohwi) -> Self {
        let dw_aligned = align_by(dw_shape.i, 4);
        let conv_src_aligned = align_by(conv_shape.i, 4);
        let conv_dst_aligned = align_by(conv_shape.o, 4);
        let intermediate_depth = div_round_up(dw_shape.i, 4);
        let result_depth = div_round_up(conv_shape.o, 4);

        let mut slots = Vec::with_capacity(
            dw_aligned
                + dw_aligned * dw_shape.h * dw_shape.w
                + conv_dst_aligned
                + conv_dst_aligned * conv_src_aligned,
        );

        for channel in 0..dw_aligned {
            slots.push(WeightSlot::DwBias { channel });
        }
        for group in 0..intermediate_depth {
            for y in 0..dw_shape.h {
                for x in 0..dw_shape.w {
                    for lane in 0..4 {
                        slots.push(WeightSlot::DwWeight {
                            y,
                            x,
                            channel: group * 4 + lane,
                        });
                    }
                }
            }
        }
        for channel in 0..conv_dst_aligned {
            slots.push(WeightSlot::ConvBias { channel });
        }
        for dst_group in 0..result_depth {
            for src_group in 0..conv_src_aligned / 4 {
                for src_lane in 0..4 {
                    for dst_lane in 0..4 {
                        slots.push(WeightSlot::ConvWeight {
                            dst_channel: dst_group * 4 + dst_lane,
                            src_channel: src_group * 4 + src_lane,
                        });
                    }
                }
            }
        }

        Self {
            slots,
            intermediate_depth,
            result_depth,
        }
    }

    /// Total scalar elements in the packed buffer.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn cursor(&self) -> SlotCursor<'_> {
        SlotCursor {
            plan: self,
            next: 0,
        }
    }
}

/// Monotone offset cursor over a [`PackingPlan`].
///
/// The code generator takes every read offset from here; `take` checks the
/// slot at the handed-out offset has the kind the caller is emitting a read
/// for, so codegen loop structure cannot silently diverge from the packer.
#[derive(Debug)]
pub struct SlotCursor<'a> {
    plan: &'a PackingPlan,
    next: usize,
}

impl SlotCursor<'_> {
    /// Hand out the next offset, which must be a `kind` slot.
    pub fn take(&mut self, kind: SlotKind) -> usize {
        let offset = self.next;
        debug_assert!(
            offset < self.plan.slots.len(),
            "cursor ran past the packing plan ({} slots)",
            self.plan.slots.len()
        );
        debug_assert_eq!(self.plan.slots[offset].kind(), kind);
        self.next += 1;
        offset
    }

    /// Offsets handed out so far.
    pub fn consumed(&self) -> usize {
        self.next
    }

    pub fn is_exhausted(&self) -> bool {
        self.next == self.plan.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_regions_are_contiguous_and_ordered() {
        // dw: in=8 3x3, conv: 16 out of 8 in.
        let plan = PackingPlan::new(&Ohwi::new(1, 3, 3, 8), &Ohwi::new(16, 1, 1, 8));
        assert_eq!(plan.intermediate_depth, 2);
        assert_eq!(plan.result_depth, 4);
        assert_eq!(plan.len(), 8 + 2 * 3 * 3 * 4 + 16 + 4 * 2 * 4 * 4);

        let kinds: Vec<_> = plan.slots.iter().map(|s| s.kind()).collect();
        assert!(kinds[..8].iter().all(|&k| k == SlotKind::DwBias));
        assert!(kinds[8..80].iter().all(|&k| k == SlotKind::DwWeight));
        assert!(kinds[80..96].iter().all(|&k| k == SlotKind::ConvBias));
        assert!(kinds[96..].iter().all(|&k| k == SlotKind::ConvWeight));
    }

    #[test]
    fn padding_lanes_appear_for_unaligned_channels() {
        let plan = PackingPlan::new(&Ohwi::new(1, 1, 1, 6), &Ohwi::new(5, 1, 1, 6));
        // dw bias padded 6 -> 8.
        assert_eq!(
            plan.slots[7],
            WeightSlot::DwBias { channel: 7 },
        );
        // Lanes 6 and 7 of the second dw weight group exceed the true
        // channel count.
        let padded = plan
            .slots
            .iter()
            .filter(|s| matches!(s, WeightSlot::DwWeight { channel, .. } if *channel >= 6))
            .count();
        assert_eq!(padded, 2);
    }

    #[test]
    fn conv_weight_order_is_dst_group_src_group_src_lane_dst_lane() {
        let plan = PackingPlan::new(&Ohwi::new(1, 1, 1, 4), &Ohwi::new(8, 1, 1, 4));
        let conv_weights: Vec<_> = plan
            .slots
            .iter()
            .filter_map(|s| match s {
                WeightSlot::ConvWeight {
                    dst_channel,
                    src_channel,
                } => Some((*dst_channel, *src_channel)),
                _ => None,
            })
            .collect();
        // First vec4 read: dst lanes 0..4 for src lane 0 of dst group 0.
        assert_eq!(&conv_weights[..4], &[(0, 0), (1, 0), (2, 0), (3, 0)]);
        // Next vec4: src lane 1.
        assert_eq!(&conv_weights[4..8], &[(0, 1), (1, 1), (2, 1), (3, 1)]);
        // Second dst group starts after the full 4x4 block.
        assert_eq!(conv_weights[16], (4, 0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn cursor_rejects_wrong_slot_kind() {
        let plan = PackingPlan::new(&Ohwi::new(1, 1, 1, 4), &Ohwi::new(4, 1, 1, 4));
        let mut cursor = plan.cursor();
        cursor.take(SlotKind::ConvWeight);
    }
}
