//! Dense tensor values.
//!
//! The client never interprets tensor contents: a [`Tensor`] is a dtype, a
//! shape, and contiguous little-endian bytes, carried verbatim through the
//! backend. Loads overwrite existing buffers in place; they never resize or
//! reallocate.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// Unsigned byte
    U8,
}

impl Dtype {
    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
            Dtype::I32 => 4,
            Dtype::I64 => 8,
            Dtype::U8 => 1,
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dtype::F32 => write!(f, "f32"),
            Dtype::F64 => write!(f, "f64"),
            Dtype::I32 => write!(f, "i32"),
            Dtype::I64 => write!(f, "i64"),
            Dtype::U8 => write!(f, "u8"),
        }
    }
}

/// An N-dimensional dense tensor with contiguous storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    dtype: Dtype,
    shape: Vec<usize>,
    /// Element bytes in little-endian order, row-major.
    data: Vec<u8>,
}

impl Tensor {
    /// Create a zero-filled tensor.
    pub fn zeros(dtype: Dtype, shape: &[usize]) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            dtype,
            shape: shape.to_vec(),
            data: vec![0u8; numel * dtype.element_size()],
        }
    }

    /// Create a zero-filled tensor with the same dtype and shape as another.
    pub fn zeros_like(other: &Tensor) -> Self {
        Self::zeros(other.dtype, &other.shape)
    }

    /// Create an f32 tensor from row-major values.
    ///
    /// Fails if the value count does not match the shape.
    pub fn from_f32(shape: &[usize], values: &[f32]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if values.len() != numel {
            return Err(Error::InvalidTensorData(format!(
                "shape {:?} implies {} elements, got {}",
                shape,
                numel,
                values.len()
            )));
        }
        let mut data = Vec::with_capacity(numel * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Ok(Self {
            dtype: Dtype::F32,
            shape: shape.to_vec(),
            data,
        })
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Shape as a slice of dimension sizes.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Total storage size in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Raw little-endian element bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode the contents as f32 values.
    ///
    /// Fails if the tensor is not f32.
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        if self.dtype != Dtype::F32 {
            return Err(Error::InvalidTensorData(format!(
                "expected f32 tensor, got {}",
                self.dtype
            )));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Overwrite this tensor's contents in place from another tensor.
    ///
    /// The source must have the same dtype and shape; the destination buffer
    /// is reused, never reallocated.
    pub fn copy_from(&mut self, key: &str, src: &Tensor) -> Result<()> {
        if self.dtype != src.dtype {
            return Err(Error::DtypeMismatch {
                key: key.to_string(),
                stored: src.dtype.to_string(),
                destination: self.dtype.to_string(),
            });
        }
        if self.shape != src.shape {
            return Err(Error::ShapeMismatch {
                key: key.to_string(),
                stored: src.shape.clone(),
                destination: self.shape.clone(),
            });
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Element-wise approximate equality for f32 tensors (test helper).
    pub fn allclose(&self, other: &Tensor, tolerance: f32) -> bool {
        if self.dtype != other.dtype || self.shape != other.shape {
            return false;
        }
        match (self.to_f32(), other.to_f32()) {
            (Ok(a), Ok(b)) => a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| (x - y).abs() <= tolerance),
            // Non-float tensors compare bytes exactly.
            _ => self.data == other.data,
        }
    }
}
