//! # Operator fusion passes
//!
//! Currently one pattern: `depthwise_conv [-> relu] -> conv_1x1`, fused into
//! a single kernel that keeps the depthwise result in registers and folds
//! both operators' weights into one packed constants buffer.
//!
//! The entry point is [`try_depthwise_conv_plus_1x1_conv`]; the driver calls
//! it per candidate node and treats [`NotApplicable`] as "leave these nodes
//! for other selectors", never as fatal.
//!
//! A match attempt is synchronous and single-writer: it assumes exclusive
//! access to the consumed-node set and its subgraph accumulator for its
//! duration. Drivers running attempts for many candidate nodes must
//! serialize those writes.

mod codegen;
mod heuristic;
mod matcher;
mod pack;
mod plan;

pub use heuristic::is_fusion_supported;
pub use matcher::{create_depthwise_plus_1x1_conv, try_depthwise_conv_plus_1x1_conv};
pub use pack::pack_fused_weights;
pub use plan::{PackingPlan, SlotCursor, SlotKind, WeightSlot};

/// The single failure signal of a fusion attempt: the pattern did not match
/// or the heuristic declined it. Never fatal; the attempt left no state
/// behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("depthwise_conv_plus_1x1_conv not suitable")]
pub struct NotApplicable;
