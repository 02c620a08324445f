//! Hardware capability descriptor consumed by the fusion heuristics and the
//! kernel source generator.

use crate::Precision;
use derive_new::new;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Adreno,
    Amd,
    Apple,
    Intel,
    Mali,
    Nvidia,
    PowerVr,
    Unknown,
}

/// Execution API the generated kernel will be compiled under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuApi {
    OpenCl,
    Metal,
    Vulkan,
}

/// Mali microarchitecture generation. Midgard predates the warp-based
/// designs and is excluded from several fusions outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaliSeries {
    Midgard,
    BifrostGen1,
    BifrostGen2,
    BifrostGen3,
    Valhall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct MaliInfo {
    pub series: MaliSeries,
}

impl MaliInfo {
    pub fn is_midgard(&self) -> bool {
        self.series == MaliSeries::Midgard
    }
}

/// Static description of the target GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuInfo {
    pub vendor: GpuVendor,
    pub api: GpuApi,
    pub mali: Option<MaliInfo>,
    pub compute_units: usize,
}

impl GpuInfo {
    pub fn new(vendor: GpuVendor, api: GpuApi) -> Self {
        Self {
            vendor,
            api,
            mali: None,
            compute_units: 1,
        }
    }

    pub fn with_mali(series: MaliSeries, api: GpuApi) -> Self {
        Self {
            vendor: GpuVendor::Mali,
            api,
            mali: Some(MaliInfo::new(series)),
            compute_units: 1,
        }
    }

    pub fn with_compute_units(mut self, compute_units: usize) -> Self {
        self.compute_units = compute_units;
        self
    }

    pub fn is_adreno(&self) -> bool {
        self.vendor == GpuVendor::Adreno
    }

    pub fn is_amd(&self) -> bool {
        self.vendor == GpuVendor::Amd
    }

    pub fn is_apple(&self) -> bool {
        self.vendor == GpuVendor::Apple
    }

    pub fn is_mali(&self) -> bool {
        self.vendor == GpuVendor::Mali
    }

    pub fn is_nvidia(&self) -> bool {
        self.vendor == GpuVendor::Nvidia
    }

    pub fn is_api_opencl(&self) -> bool {
        self.api == GpuApi::OpenCl
    }
}

/// Recommended output block size for convolution-shaped work.
///
/// Only Mali is tiered; every other vendor gets 1. The thresholds compare
/// estimated work per compute unit and are tuned per microarchitecture
/// generation and precision. Empirical configuration, not derived.
pub fn recommended_conv_block_size(gpu: &GpuInfo, precision: Precision, task_size: usize) -> usize {
    let mali = match &gpu.mali {
        Some(mali) if gpu.is_mali() => mali,
        _ => return 1,
    };
    let per_cu = task_size as f32 / gpu.compute_units.max(1) as f32;

    let (threshold_1, threshold_2, threshold_4) = match precision {
        Precision::F16 => match mali.series {
            MaliSeries::BifrostGen1 => (256.0, 256.0 * 4.0, 256.0 * 8.0),
            MaliSeries::BifrostGen2 => (256.0 * 2.0, 256.0 * 8.0, 256.0 * 16.0),
            MaliSeries::BifrostGen3 | MaliSeries::Valhall => (256.0, 256.0 * 6.0, 256.0 * 16.0),
            MaliSeries::Midgard => (256.0 * 4.0, 256.0 * 16.0, f32::MAX),
        },
        Precision::F32F16 => match mali.series {
            MaliSeries::BifrostGen1 => (256.0, 256.0 * 3.0, 256.0 * 32.0),
            MaliSeries::BifrostGen2 => (256.0 * 2.0, 256.0 * 8.0, f32::MAX),
            MaliSeries::BifrostGen3 | MaliSeries::Valhall => (256.0, 256.0 * 8.0, f32::MAX),
            MaliSeries::Midgard => (256.0 * 4.0, f32::MAX, f32::MAX),
        },
        Precision::F32 => match mali.series {
            MaliSeries::BifrostGen1 => (256.0, 256.0 * 4.0, f32::MAX),
            MaliSeries::BifrostGen2 => (128.0, 256.0 * 4.0, f32::MAX),
            MaliSeries::BifrostGen3 | MaliSeries::Valhall => (256.0, 256.0 * 12.0, f32::MAX),
            MaliSeries::Midgard => (256.0 * 16.0, f32::MAX, f32::MAX),
        },
    };

    if per_cu <= threshold_1 {
        1
    } else if per_cu <= threshold_2 {
        2
    } else if per_cu <= threshold_4 {
        4
    } else {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_is_one_off_mali() {
        let gpu = GpuInfo::new(GpuVendor::Nvidia, GpuApi::OpenCl);
        assert_eq!(recommended_conv_block_size(&gpu, Precision::F16, 1 << 20), 1);
    }

    #[test]
    fn block_size_grows_with_mali_task_size() {
        let gpu = GpuInfo::with_mali(MaliSeries::Valhall, GpuApi::OpenCl).with_compute_units(4);
        let small = recommended_conv_block_size(&gpu, Precision::F16, 256);
        let large = recommended_conv_block_size(&gpu, Precision::F16, 1 << 22);
        assert_eq!(small, 1);
        assert_eq!(large, 8);
        assert!(small <= large);
    }
}
