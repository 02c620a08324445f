//! The fused-operation artifact handed to the kernel execution layer:
//! generated source, named argument bindings, dispatch hints.

use crate::{DType, EdgeId, Precision, RVec, TensorDescriptor};
use std::borrow::Cow;

/// Precision plus source/destination tensor descriptors for one operation.
#[derive(Debug, Clone)]
pub struct OperationDef {
    pub precision: Precision,
    pub src_tensors: RVec<TensorDescriptor>,
    pub dst_tensors: RVec<TensorDescriptor>,
}

impl OperationDef {
    pub fn new(precision: Precision) -> Self {
        Self {
            precision,
            src_tensors: RVec::new(),
            dst_tensors: RVec::new(),
        }
    }
}

/// Generated kernel source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource(pub Cow<'static, str>);

impl KernelSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KernelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address space the packed constants live in. Mali and AMD prefer plain
/// global memory over the constant address space for these buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Constant,
    Global,
}

/// A packed device buffer: raw bytes plus element type and address space.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor {
    pub element_dtype: DType,
    pub memory: MemoryKind,
    pub data: Vec<u8>,
}

impl BufferDescriptor {
    /// Number of logical elements serialized into `data`.
    pub fn element_count(&self) -> usize {
        self.data.len() / self.element_dtype.size_of()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// One named kernel argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Int(i32),
    Float(f32),
    Buffer(BufferDescriptor),
}

/// Ordered, named argument bindings for a kernel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    items: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub fn add_int(&mut self, name: impl Into<String>, value: i32) {
        self.items.push((name.into(), ArgValue::Int(value)));
    }

    pub fn add_float(&mut self, name: impl Into<String>, value: f32) {
        self.items.push((name.into(), ArgValue::Float(value)));
    }

    pub fn add_buffer(&mut self, name: impl Into<String>, buffer: BufferDescriptor) {
        self.items.push((name.into(), ArgValue::Buffer(buffer)));
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.items.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// How output tensor coordinates map onto the dispatch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorToGrid {
    #[default]
    Custom,
    /// Width*batch to X, height to Y, single Z slice; the fused kernel
    /// computes all channel groups per invocation.
    WbToXHdToYZIsOne,
}

/// Backend compiler hints attached to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerOption {
    FastRelaxedMath,
}

/// A generated GPU operation: kernel source plus everything the execution
/// layer needs to bind and dispatch it.
#[derive(Debug, Clone)]
pub struct GpuOperation {
    pub definition: OperationDef,
    pub code: KernelSource,
    pub args: Arguments,
    /// `(binding name, descriptor)` for each source tensor.
    pub src_bindings: RVec<(String, TensorDescriptor)>,
    pub dst_bindings: RVec<(String, TensorDescriptor)>,
    pub grid: TensorToGrid,
    pub compiler_options: Vec<CompilerOption>,
    pub flops: u64,
}

impl GpuOperation {
    pub fn new(definition: OperationDef) -> Self {
        Self {
            definition,
            code: KernelSource(Cow::Borrowed("")),
            args: Arguments::default(),
            src_bindings: RVec::new(),
            dst_bindings: RVec::new(),
            grid: TensorToGrid::default(),
            compiler_options: Vec::new(),
            flops: 0,
        }
    }

    pub fn add_src_tensor(&mut self, name: impl Into<String>, desc: TensorDescriptor) {
        self.src_bindings.push((name.into(), desc));
    }

    pub fn add_dst_tensor(&mut self, name: impl Into<String>, desc: TensorDescriptor) {
        self.dst_bindings.push((name.into(), desc));
    }
}

/// One rewritten operation inside a [`GpuSubgraph`], keyed by the edges it
/// consumes and produces in the source graph.
#[derive(Debug)]
pub struct SubgraphOperation {
    pub name: String,
    pub input_edges: RVec<EdgeId>,
    pub output_edges: RVec<EdgeId>,
    pub operation: Option<GpuOperation>,
}

/// Accumulator for subgraph rewrites produced by fusion passes.
#[derive(Debug, Default)]
pub struct GpuSubgraph {
    pub operations: Vec<SubgraphOperation>,
}

impl GpuSubgraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh single-operation slot covering `inputs` -> `outputs`.
    pub fn add_single_operation(
        &mut self,
        inputs: impl Into<RVec<EdgeId>>,
        outputs: impl Into<RVec<EdgeId>>,
    ) -> &mut SubgraphOperation {
        self.operations.push(SubgraphOperation {
            name: String::new(),
            input_edges: inputs.into(),
            output_edges: outputs.into(),
            operation: None,
        });
        self.operations.last_mut().unwrap()
    }
}
