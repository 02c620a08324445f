//! Tensor descriptors: how an activation tensor is laid out and stored on
//! the device. Attached to graph edges externally, keyed by edge id.

use crate::{Axis, GpuInfo, RVec};

/// Physical storage backing a tensor on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorStorage {
    Buffer,
    ImageBuffer,
    Texture2d,
    Texture3d,
    TextureArray,
}

impl TensorStorage {
    /// Sampled textures clamp out-of-range spatial reads to zero in
    /// hardware; linear storage has no such addressing mode.
    fn is_sampled_texture(self) -> bool {
        matches!(
            self,
            TensorStorage::Texture2d | TensorStorage::Texture3d | TensorStorage::TextureArray
        )
    }
}

/// Shape-and-storage description of one tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDescriptor {
    pub storage: TensorStorage,
    pub layout: RVec<Axis>,
}

impl TensorDescriptor {
    pub fn new(storage: TensorStorage, layout: impl Into<RVec<Axis>>) -> Self {
        Self {
            storage,
            layout: layout.into(),
        }
    }

    /// BHWC descriptor, the delegate's default activation layout.
    pub fn bhwc(storage: TensorStorage) -> Self {
        Self::new(
            storage,
            [Axis::Batch, Axis::Height, Axis::Width, Axis::Channels].as_slice(),
        )
    }

    /// HWC descriptor for single-batch tensors.
    pub fn hwc(storage: TensorStorage) -> Self {
        Self::new(storage, [Axis::Height, Axis::Width, Axis::Channels].as_slice())
    }

    pub fn has_axis(&self, axis: Axis) -> bool {
        self.layout.contains(&axis)
    }

    /// Whether out-of-range reads along `axis` return zero without explicit
    /// boundary code in the kernel.
    pub fn supports_zero_clamp(&self, axis: Axis, _gpu: &GpuInfo) -> bool {
        match axis {
            Axis::Height | Axis::Width | Axis::Depth => self.storage.is_sampled_texture(),
            Axis::Batch | Axis::Channels => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GpuApi, GpuVendor};

    #[test]
    fn textures_clamp_buffers_do_not() {
        let gpu = GpuInfo::new(GpuVendor::Adreno, GpuApi::OpenCl);
        let tex = TensorDescriptor::bhwc(TensorStorage::Texture2d);
        let buf = TensorDescriptor::bhwc(TensorStorage::Buffer);
        assert!(tex.supports_zero_clamp(Axis::Width, &gpu));
        assert!(tex.supports_zero_clamp(Axis::Height, &gpu));
        assert!(!buf.supports_zero_clamp(Axis::Width, &gpu));
        assert!(!tex.supports_zero_clamp(Axis::Channels, &gpu));
    }

    #[test]
    fn axis_presence_follows_layout() {
        let desc = TensorDescriptor::hwc(TensorStorage::Buffer);
        assert!(desc.has_axis(Axis::Width));
        assert!(!desc.has_axis(Axis::Batch));
    }
}
