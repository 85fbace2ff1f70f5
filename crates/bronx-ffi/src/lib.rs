// ─────────────────────────────────────────────────────────────────────
// Bronx — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the graph diffusion GP.
//!
//! Exposes `BronxConfig`, `Graph`, `GraphSVGP`, `EarlyStopping` and the
//! `diffusion_operator` / `weighted_cross_entropy_with_logits` functions.
//! The Python side owns the optimiser: it calls `model()` for the ELBO
//! terms, reads parameters through getters and writes updated values
//! back through setters.
//!
//! # FFI Safety
//!
//! - GIL acquired via `Python::with_gil` before every Python callback.
//! - `BronxError` and Python callback exceptions surface as `ValueError`.
//! - Matrices cross the boundary as lists of row lists.
//!
//! Install: `pip install -e crates/bronx-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from bronx_kernel import BronxConfig, Graph, GraphSVGP
//!
//! g = Graph(4, [0, 1, 2, 3], [1, 2, 3, 0])
//! gp = GraphSVGP(g, features, [0, 2], [1, 0], latent_dim=2)
//! loss = gp.model()["loss"]
//! ```

use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use bronx_diffusion::{Graph, GraphDiffusion};
use bronx_gp::{
    CompositeKernel, DiffusionKernel, ExternalLikelihood, GaussianLikelihood,
    GraphVariationalSparseGp, Kernel, LinearKernel, Likelihood, Mode, PredictiveCovariance,
    RbfKernel, SoftmaxLikelihood, Targets, TrainingData, VariationalParams,
};
use bronx_layers::{weighted_cross_entropy_with_logits as wce_with_logits, EarlyStopping};
use bronx_types::{BronxConfig, BronxError, Matrix};

// ─── Conversions ────────────────────────────────────────────────────

fn to_py_err(e: BronxError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Rows to a matrix. `cols` fixes the width of an empty input.
fn to_matrix(rows: Vec<Vec<f64>>, cols: usize) -> PyResult<Matrix> {
    if rows.is_empty() {
        return Ok(Matrix::zeros(0, cols));
    }
    Matrix::from_rows(&rows).map_err(to_py_err)
}

fn extract_targets(targets: &Bound<'_, PyAny>) -> PyResult<Targets> {
    if let Ok(classes) = targets.extract::<Vec<usize>>() {
        return Ok(Targets::Classes(classes));
    }
    let rows = targets.extract::<Vec<Vec<f64>>>().map_err(|_| {
        PyValueError::new_err("targets must be a list of class indices or a list of rows")
    })?;
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    Ok(Targets::Real(to_matrix(rows, width)?))
}

// ─── PyBronxConfig ──────────────────────────────────────────────────

/// Python-visible configuration for the graph diffusion GP.
#[pyclass(name = "BronxConfig")]
#[derive(Clone)]
struct PyBronxConfig {
    inner: BronxConfig,
}

#[pymethods]
impl PyBronxConfig {
    #[new]
    #[pyo3(signature = (
        jitter = 1e-6,
        whiten = false,
        full_cov = false,
        hidden_features = 16,
        init_std = 1.0,
        diffusion_cache_capacity = 1,
        kernel_cache_capacity = 8,
        mc_samples = 32,
        seed = 42,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        jitter: f64,
        whiten: bool,
        full_cov: bool,
        hidden_features: usize,
        init_std: f64,
        diffusion_cache_capacity: usize,
        kernel_cache_capacity: usize,
        mc_samples: usize,
        seed: u64,
    ) -> PyResult<Self> {
        let config = BronxConfig {
            jitter,
            whiten,
            full_cov,
            hidden_features,
            init_std,
            diffusion_cache_capacity,
            kernel_cache_capacity,
            mc_samples,
            seed,
        };
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = BronxConfig::from_json(json).map_err(to_py_err)?;
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "BronxConfig(jitter={:e}, whiten={}, hidden_features={}, seed={})",
            self.inner.jitter, self.inner.whiten, self.inner.hidden_features, self.inner.seed
        )
    }
}

// ─── PyGraph ────────────────────────────────────────────────────────

/// Directed graph over `num_nodes` nodes given as parallel edge lists.
#[pyclass(name = "Graph")]
#[derive(Clone)]
struct PyGraph {
    inner: Graph,
}

#[pymethods]
impl PyGraph {
    #[new]
    fn new(num_nodes: usize, src: Vec<usize>, dst: Vec<usize>) -> PyResult<Self> {
        Ok(Self {
            inner: Graph::new(num_nodes, src, dst).map_err(to_py_err)?,
        })
    }

    fn num_nodes(&self) -> usize {
        self.inner.num_nodes()
    }

    fn num_edges(&self) -> usize {
        self.inner.num_edges()
    }

    /// Content hash; equal for graphs with the same node count and edge set.
    fn fingerprint(&self) -> u64 {
        self.inner.fingerprint()
    }

    fn edges(&self) -> (Vec<usize>, Vec<usize>) {
        let (src, dst) = self.inner.edges();
        (src.to_vec(), dst.to_vec())
    }

    fn add_edge(&mut self, src: usize, dst: usize) -> PyResult<()> {
        self.inner.add_edge(src, dst).map_err(to_py_err)
    }

    fn add_self_loops(&mut self) {
        self.inner.add_self_loops();
    }

    fn remove_self_loops(&mut self) {
        self.inner.remove_self_loops();
    }

    fn __repr__(&self) -> String {
        format!(
            "Graph(num_nodes={}, num_edges={})",
            self.inner.num_nodes(),
            self.inner.num_edges()
        )
    }
}

/// Dense diffusion operator Φ = exp(D⁻¹A − I) as a list of rows.
#[pyfunction]
fn diffusion_operator(graph: &PyGraph) -> PyResult<Vec<Vec<f64>>> {
    let phi = bronx_diffusion::diffusion_operator(&graph.inner).map_err(to_py_err)?;
    Ok(phi.to_rows())
}

/// Element-wise weighted logistic loss.
#[pyfunction]
#[pyo3(signature = (labels, logits, pos_weight = 1.0))]
fn weighted_cross_entropy_with_logits(
    labels: Vec<f64>,
    logits: Vec<f64>,
    pos_weight: f64,
) -> PyResult<Vec<f64>> {
    wce_with_logits(&labels, &logits, pos_weight).map_err(to_py_err)
}

// ─── PyGraphSvgp ────────────────────────────────────────────────────

fn build_kernel(
    name: &str,
    variance: f64,
    lengthscale: f64,
    diffusion: &Arc<GraphDiffusion>,
    config: &BronxConfig,
) -> PyResult<Box<dyn Kernel>> {
    let diffusion_kernel = || DiffusionKernel::new(diffusion.clone(), config.kernel_cache_capacity);
    let rbf = || RbfKernel::new(variance, lengthscale).map_err(to_py_err);
    Ok(match name {
        "rbf" => Box::new(rbf()?),
        "linear" => Box::new(LinearKernel::new(variance).map_err(to_py_err)?),
        "diffusion" => Box::new(diffusion_kernel()),
        "composite" => Box::new(CompositeKernel::new(
            diffusion_kernel(),
            Some(Box::new(rbf()?)),
        )),
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown kernel '{other}' (expected rbf, linear, diffusion or composite)"
            )))
        }
    })
}

fn build_likelihood(
    name: &str,
    noise: f64,
    callback: Option<PyObject>,
    config: &BronxConfig,
) -> PyResult<Box<dyn Likelihood>> {
    if let Some(cb) = callback {
        return Ok(Box::new(ExternalLikelihood::new(move |loc, var, targets| {
            Python::with_gil(|py| {
                let (loc, var) = (loc.to_rows(), var.to_rows());
                let result = match targets {
                    Targets::Classes(c) => cb.call1(py, (loc, var, c.clone())),
                    Targets::Real(y) => cb.call1(py, (loc, var, y.to_rows())),
                }
                .and_then(|r| r.extract::<f64>(py));
                result.map_err(|e| {
                    log::warn!("log-likelihood callback failed: {e}");
                    BronxError::Numerical(format!("log-likelihood callback failed: {e}"))
                })
            })
        })));
    }
    Ok(match name {
        "softmax" => Box::new(SoftmaxLikelihood::new(config.mc_samples, config.seed)),
        "gaussian" => Box::new(GaussianLikelihood::new(noise).map_err(to_py_err)?),
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown likelihood '{other}' (expected softmax or gaussian)"
            )))
        }
    })
}

fn covariance_into_dict(dict: &Bound<'_, PyDict>, cov: &PredictiveCovariance) -> PyResult<()> {
    match cov {
        PredictiveCovariance::Variance(v) => dict.set_item("var", v.to_rows()),
        PredictiveCovariance::Full(blocks) => {
            let cov: Vec<Vec<Vec<f64>>> = blocks.iter().map(|b| b.to_rows()).collect();
            dict.set_item("cov", cov)
        }
    }
}

/// Sparse variational GP over graph nodes.
///
/// Inducing points are all nodes. Parameters are exposed as nested lists
/// so an external optimiser can read and replace them between steps.
#[pyclass(name = "GraphSVGP")]
struct PyGraphSvgp {
    inner: GraphVariationalSparseGp,
}

#[pymethods]
impl PyGraphSvgp {
    /// Args:
    ///     graph: Graph over N nodes.
    ///     features: N rows of node features.
    ///     train_idx: labelled node indices.
    ///     targets: class index per labelled node, or L rows of reals.
    ///     latent_dim: number of latent functions (classes).
    ///     kernel: "rbf", "linear", "diffusion" or "composite".
    ///     likelihood: "softmax" or "gaussian".
    ///     log_likelihood_callback: Optional Callable[[loc, var, y], float]
    ///         replacing the built-in likelihood; `y` is the class index
    ///         list or the L rows of real targets.
    #[new]
    #[pyo3(signature = (
        graph,
        features,
        train_idx,
        targets,
        latent_dim,
        config = None,
        kernel = "rbf",
        likelihood = "softmax",
        variance = 1.0,
        lengthscale = 1.0,
        noise = 1.0,
        log_likelihood_callback = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        graph: &PyGraph,
        features: Vec<Vec<f64>>,
        train_idx: Vec<usize>,
        targets: &Bound<'_, PyAny>,
        latent_dim: usize,
        config: Option<PyBronxConfig>,
        kernel: &str,
        likelihood: &str,
        variance: f64,
        lengthscale: f64,
        noise: f64,
        log_likelihood_callback: Option<PyObject>,
    ) -> PyResult<Self> {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        let diffusion = Arc::new(GraphDiffusion::new(cfg.diffusion_cache_capacity));
        let data = TrainingData {
            features: to_matrix(features, 0)?,
            train_idx,
            targets: extract_targets(targets)?,
        };
        let kernel = build_kernel(kernel, variance, lengthscale, &diffusion, &cfg)?;
        let likelihood = build_likelihood(likelihood, noise, log_likelihood_callback, &cfg)?;
        let inner = GraphVariationalSparseGp::new(
            Arc::new(graph.inner.clone()),
            data,
            kernel,
            likelihood,
            latent_dim,
            &cfg,
        )
        .map_err(to_py_err)?
        .with_diffusion(diffusion);
        Ok(Self { inner })
    }

    /// ELBO terms at the training nodes.
    ///
    /// Returns: dict(log_likelihood, kl_divergence, elbo, loss, loc, var)
    fn model<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let trace = self.inner.model().map_err(to_py_err)?;
        let dict = PyDict::new(py);
        dict.set_item("log_likelihood", trace.log_likelihood)?;
        dict.set_item("kl_divergence", trace.kl_divergence)?;
        dict.set_item("elbo", trace.elbo())?;
        dict.set_item("loss", trace.loss())?;
        dict.set_item("loc", trace.conditional.loc.to_rows())?;
        covariance_into_dict(&dict, &trace.conditional.covariance)?;
        Ok(dict)
    }

    /// Posterior marginals at `query`.
    ///
    /// Returns: dict(loc, var) or dict(loc, cov) when `full_cov`.
    #[pyo3(signature = (query, full_cov = false))]
    fn forward<'py>(
        &mut self,
        py: Python<'py>,
        query: Vec<usize>,
        full_cov: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let out = self.inner.forward(&query, full_cov).map_err(to_py_err)?;
        let dict = PyDict::new(py);
        dict.set_item("loc", out.loc.to_rows())?;
        covariance_into_dict(&dict, &out.covariance)?;
        Ok(dict)
    }

    /// Argmax class per query node.
    fn predict(&mut self, query: Vec<usize>) -> PyResult<Vec<usize>> {
        self.inner.predict_labels(&query).map_err(to_py_err)
    }

    /// Prior Cholesky factor of Φ K Φᵀ + jitter I.
    fn prior_scale_tril(&self) -> PyResult<Vec<Vec<f64>>> {
        let prior = self.inner.prior().map_err(to_py_err)?;
        Ok(prior.scale_tril.to_rows())
    }

    #[getter]
    fn mode(&self) -> &'static str {
        match self.inner.mode() {
            Mode::Prior => "prior",
            Mode::Posterior => "posterior",
        }
    }

    #[getter]
    fn variational_loc(&self) -> Vec<Vec<f64>> {
        self.inner.params().loc().to_rows()
    }

    #[setter]
    fn set_variational_loc(&mut self, rows: Vec<Vec<f64>>) -> PyResult<()> {
        let n = self.inner.num_inducing();
        let loc = to_matrix(rows, n)?;
        let scale = self.inner.params().scale_tril().to_vec();
        *self.inner.params_mut() = VariationalParams::from_parts(loc, scale).map_err(to_py_err)?;
        Ok(())
    }

    #[getter]
    fn variational_scale_tril(&self) -> Vec<Vec<Vec<f64>>> {
        self.inner
            .params()
            .scale_tril()
            .iter()
            .map(|s| s.to_rows())
            .collect()
    }

    #[setter]
    fn set_variational_scale_tril(&mut self, blocks: Vec<Vec<Vec<f64>>>) -> PyResult<()> {
        let n = self.inner.num_inducing();
        let scale = blocks
            .into_iter()
            .map(|b| to_matrix(b, n))
            .collect::<PyResult<Vec<_>>>()?;
        let loc = self.inner.params().loc().clone();
        *self.inner.params_mut() = VariationalParams::from_parts(loc, scale).map_err(to_py_err)?;
        Ok(())
    }

    #[getter]
    fn projection(&self) -> Vec<Vec<f64>> {
        self.inner.projection().to_rows()
    }

    #[setter]
    fn set_projection(&mut self, rows: Vec<Vec<f64>>) -> PyResult<()> {
        let current = self.inner.projection().shape();
        let w = to_matrix(rows, current.1)?;
        if w.shape() != current {
            return Err(PyValueError::new_err(format!(
                "projection must be {}x{}, got {}x{}",
                current.0,
                current.1,
                w.rows(),
                w.cols()
            )));
        }
        *self.inner.projection_mut() = w;
        Ok(())
    }

    #[getter]
    fn likelihood_parameters(&self) -> Vec<f64> {
        self.inner.likelihood().parameters()
    }

    #[setter]
    fn set_likelihood_parameters(&mut self, params: Vec<f64>) -> PyResult<()> {
        self.inner
            .likelihood_mut()
            .load_parameters(&params)
            .map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "GraphSVGP(num_inducing={}, latent_dim={})",
            self.inner.num_inducing(),
            self.inner.latent_dim()
        )
    }
}

// ─── PyEarlyStopping ────────────────────────────────────────────────

/// Python parameter snapshot; cloning takes a new reference under the GIL.
struct Snapshot(PyObject);

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        Python::with_gil(|py| Snapshot(self.0.clone_ref(py)))
    }
}

/// Patience-based early stopping over a list of losses.
#[pyclass(name = "EarlyStopping")]
struct PyEarlyStopping {
    inner: EarlyStopping<Snapshot>,
}

#[pymethods]
impl PyEarlyStopping {
    #[new]
    #[pyo3(signature = (patience = 10))]
    fn new(patience: usize) -> Self {
        Self {
            inner: EarlyStopping::new(patience),
        }
    }

    /// Record one evaluation. Returns True when training should stop.
    fn __call__(&mut self, losses: Vec<f64>, params: PyObject) -> PyResult<bool> {
        self.inner
            .step(&losses, &Snapshot(params))
            .map_err(to_py_err)
    }

    #[getter]
    fn params(&self, py: Python<'_>) -> Option<PyObject> {
        self.inner.best_params().map(|s| s.0.clone_ref(py))
    }

    #[getter]
    fn best_losses(&self) -> Option<Vec<f64>> {
        self.inner.best_losses().map(|l| l.to_vec())
    }

    #[getter]
    fn counter(&self) -> usize {
        self.inner.counter()
    }
}

// ─── Module Registration ────────────────────────────────────────────

/// Bronx kernel — graph diffusion variational GP core for Python.
///
/// - `BronxConfig` — configuration
/// - `Graph` — directed edge-list graph
/// - `GraphSVGP` — sparse variational GP over graph nodes
/// - `EarlyStopping` — multi-loss patience tracker
/// - `diffusion_operator`, `weighted_cross_entropy_with_logits`
#[pymodule]
fn bronx_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBronxConfig>()?;
    m.add_class::<PyGraph>()?;
    m.add_class::<PyGraphSvgp>()?;
    m.add_class::<PyEarlyStopping>()?;
    m.add_function(wrap_pyfunction!(diffusion_operator, m)?)?;
    m.add_function(wrap_pyfunction!(weighted_cross_entropy_with_logits, m)?)?;
    Ok(())
}
