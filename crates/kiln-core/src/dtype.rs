/// Element type of a packed GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F16,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
        }
    }
}

/// Numeric precision a kernel is generated for.
///
/// `F32F16` accumulates in f32 but stores weights and intermediates in f16;
/// weight packing therefore only stays in f32 for [`Precision::F32`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    F32,
    F32F16,
    F16,
}

impl Precision {
    /// Element type used for packed weight/bias data at this precision.
    pub fn storage_dtype(self) -> DType {
        match self {
            Precision::F32 => DType::F32,
            Precision::F32F16 | Precision::F16 => DType::F16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_dtype_is_f16_for_mixed_precision() {
        assert_eq!(Precision::F32.storage_dtype(), DType::F32);
        assert_eq!(Precision::F32F16.storage_dtype(), DType::F16);
        assert_eq!(Precision::F16.storage_dtype(), DType::F16);
    }
}
