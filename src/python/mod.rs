use crate::client::DensePs;
use crate::tensor::Tensor;
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use tokio::runtime::Runtime;

// Helper runtime
fn runtime() -> Runtime {
    Runtime::new().unwrap()
}

fn to_py_err(e: crate::core::Error) -> PyErr {
    match e {
        crate::core::Error::KeyNotFound { .. } => PyKeyError::new_err(e.to_string()),
        crate::core::Error::LengthMismatch { .. }
        | crate::core::Error::EmptyTableName
        | crate::core::Error::ShapeMismatch { .. }
        | crate::core::Error::DtypeMismatch { .. }
        | crate::core::Error::InvalidUrl(_)
        | crate::core::Error::UnknownScheme(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

// --- Tensor Bindings ---

#[pyclass(name = "Tensor")]
#[derive(Clone)]
pub struct PyTensor {
    inner: Tensor,
}

#[pymethods]
impl PyTensor {
    #[new]
    fn new(shape: Vec<usize>, values: Vec<f32>) -> PyResult<Self> {
        let inner = Tensor::from_f32(&shape, &values).map_err(to_py_err)?;
        Ok(PyTensor { inner })
    }

    #[staticmethod]
    fn zeros(shape: Vec<usize>) -> Self {
        PyTensor {
            inner: Tensor::zeros(crate::tensor::Dtype::F32, &shape),
        }
    }

    #[getter]
    fn get_shape(&self) -> Vec<usize> {
        self.inner.shape().to_vec()
    }

    #[getter]
    fn get_dtype(&self) -> String {
        self.inner.dtype().to_string()
    }

    fn to_list(&self) -> PyResult<Vec<f32>> {
        self.inner.to_f32().map_err(to_py_err)
    }

    fn allclose(&self, other: &PyTensor, tolerance: Option<f32>) -> bool {
        self.inner.allclose(&other.inner, tolerance.unwrap_or(1e-6))
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(|e| PyValueError::new_err(e.to_string()))
    }
}

// --- Client Bindings ---

#[pyclass(name = "DensePS")]
pub struct PyDensePs {
    inner: DensePs,
}

#[pymethods]
impl PyDensePs {
    #[new]
    fn new(table_name: String, url: String) -> PyResult<Self> {
        let inner = runtime()
            .block_on(DensePs::new(&table_name, &url))
            .map_err(to_py_err)?;
        Ok(PyDensePs { inner })
    }

    #[getter]
    fn get_table_name(&self) -> String {
        self.inner.table_name().to_string()
    }

    fn save(&mut self, keys: Vec<String>, tensors: Vec<PyTensor>) -> PyResult<()> {
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let values: Vec<Tensor> = tensors.into_iter().map(|t| t.inner).collect();
        runtime()
            .block_on(self.inner.save(&key_refs, &values))
            .map_err(to_py_err)
    }

    fn load(&mut self, py: Python, keys: Vec<String>, tensors: Vec<Py<PyTensor>>) -> PyResult<()> {
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let mut destinations: Vec<Tensor> = tensors
            .iter()
            .map(|t| t.borrow(py).inner.clone())
            .collect();
        runtime()
            .block_on(self.inner.load(&key_refs, &mut destinations))
            .map_err(to_py_err)?;
        for (handle, loaded) in tensors.iter().zip(destinations) {
            handle.borrow_mut(py).inner = loaded;
        }
        Ok(())
    }
}

// --- Module ---

#[pymodule]
fn denseps(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyTensor>()?;
    m.add_class::<PyDensePs>()?;
    Ok(())
}
