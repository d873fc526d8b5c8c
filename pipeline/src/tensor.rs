//! Named tensors exchanged with a model runtime

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayD, ArrayView2, Axis, Ix2, IxDyn};
use std::collections::BTreeMap;

/// A dense tensor in one of the element types transformer graphs exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
}

impl Tensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(array) => array.shape(),
            Self::I64(array) => array.shape(),
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(array) => Some(array),
            Self::I64(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Self::I64(array) => Some(array),
            Self::F32(_) => None,
        }
    }

    /// A `[rows, cols]` i64 tensor; rows must be equally long
    pub fn i64_matrix(rows: &[Vec<i64>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(PipelineError::inference("ragged rows in i64 matrix"));
        }
        let data: Vec<i64> = rows.iter().flatten().copied().collect();
        let array = ArrayD::from_shape_vec(IxDyn(&[rows.len(), cols]), data)
            .map_err(|e| PipelineError::inference(e.to_string()))?;
        Ok(Self::I64(array))
    }

    /// A `[1, n]` i64 tensor
    pub fn i64_row<T: Copy + Into<i64>>(values: &[T]) -> Self {
        let data: Vec<i64> = values.iter().map(|&v| v.into()).collect();
        Self::I64(Array1::from_vec(data).insert_axis(Axis(0)).into_dyn())
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(array: ArrayD<f32>) -> Self {
        Self::F32(array)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(array: ArrayD<i64>) -> Self {
        Self::I64(array)
    }
}

/// Graph inputs or outputs keyed by name
pub type NamedTensors = BTreeMap<String, Tensor>;

/// The first float output present under any of `names`
pub fn float_output<'a>(outputs: &'a NamedTensors, names: &[&str]) -> Result<&'a ArrayD<f32>> {
    names
        .iter()
        .find_map(|name| outputs.get(*name).and_then(Tensor::as_f32))
        .ok_or_else(|| {
            PipelineError::inference(format!(
                "Model produced none of the expected outputs {:?} (got {:?})",
                names,
                outputs.keys().collect::<Vec<_>>()
            ))
        })
}

/// The first float output of the given rank, in name order
pub fn first_output_with_rank(outputs: &NamedTensors, rank: usize) -> Option<&ArrayD<f32>> {
    outputs
        .values()
        .filter_map(Tensor::as_f32)
        .find(|array| array.ndim() == rank)
}

/// Drop a leading batch dimension of 1 and copy the rest out as a matrix
///
/// `[1, n]` becomes one row of `n`; `[1, rows, ...]` flattens trailing dims.
pub fn batch_matrix(array: &ArrayD<f32>) -> Result<Array2<f32>> {
    let shape = array.shape();
    if shape.first() != Some(&1) {
        return Err(PipelineError::inference(format!(
            "Expected a batch of one, got shape {:?}",
            shape
        )));
    }
    let inner = array.index_axis(Axis(0), 0);
    let (rows, cols) = match inner.ndim() {
        0 => (1, 1),
        1 => (1, inner.len()),
        _ => (inner.shape()[0], inner.shape()[1..].iter().product()),
    };
    let data: Vec<f32> = inner.iter().copied().collect();
    Array2::from_shape_vec((rows, cols), data).map_err(|e| PipelineError::inference(e.to_string()))
}

/// Interpret a rank-2 float output as a matrix
pub fn as_matrix(array: &ArrayD<f32>) -> Result<ArrayView2<'_, f32>> {
    array
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| PipelineError::inference(format!("Expected a matrix: {}", e)))
}
