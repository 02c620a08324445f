//! # kiln-core
//!
//! Graph-level operator fusion for the kiln GPU delegate.
//!
//! The crate's centerpiece is the depthwise-conv + 1x1-conv fusion pass in
//! [`fusion`]: it recognizes a `depthwise_conv [-> relu] -> conv_1x1` chain
//! in a [`ComputeGraph`], decides via per-vendor heuristics whether a single
//! fused kernel is profitable, and if so emits one [`GpuOperation`] carrying
//! the generated kernel source and a packed weight buffer.
//!
//! Graph storage, tensor descriptors and the kernel execution object are
//! collaborators: the pass only queries them through [`GraphQuery`] and the
//! descriptor map, and only ever mutates the [`GpuSubgraph`] accumulator and
//! the consumed-node set, and only on a confirmed match.

mod attr;
mod descriptor;
mod dtype;
pub mod flops;
pub mod fusion;
mod gpu_info;
mod graph;
mod operation;
mod shape;

pub use attr::*;
pub use descriptor::*;
pub use dtype::*;
pub use gpu_info::*;
pub use graph::*;
pub use operation::*;
pub use shape::*;

pub type RVec<T> = smallvec::SmallVec<[T; 4]>;
pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;

#[macro_export]
macro_rules! rvec {
    (@one $x:expr) => (1usize);
    ($elem:expr; $n:expr) => ({
        $crate::RVec::from_elem($elem, $n)
    });
    ($($x:expr),*$(,)*) => ({
        let count = 0usize $(+ rvec![@one $x])*;
        #[allow(unused_mut)]
        let mut vec = $crate::RVec::new();
        if count <= vec.inline_size() {
            $(vec.push($x);)*
            vec
        } else {
            $crate::RVec::from_vec(vec![$($x),*])
        }
    });
}
