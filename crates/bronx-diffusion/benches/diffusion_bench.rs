// ─────────────────────────────────────────────────────────────────────
// Bronx — Diffusion Operator Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the diffusion hot path:
//!   - normalisation of the adjacency
//!   - dense matrix exponential (cold operator build)
//!   - cached operator lookup
//!   - Cholesky of a diffusion-smoothed covariance

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bronx_diffusion::{
    cholesky, diffusion_operator, matrix_exp, normalised_adjacency, Graph, GraphDiffusion,
};

const N: usize = 64;

// ── Helpers ───────────────────────────────────────────────────────────

/// Ring with a chord every eighth node.
fn make_graph() -> Graph {
    let mut pairs: Vec<(usize, usize)> = (0..N).map(|i| (i, (i + 1) % N)).collect();
    pairs.extend((0..N).step_by(8).map(|i| (i, (i + N / 2) % N)));
    Graph::undirected(N, &pairs).unwrap()
}

// ── Operator benchmarks ──────────────────────────────────────────────

fn bench_normalised_adjacency(c: &mut Criterion) {
    let g = make_graph();
    c.bench_function("normalised_adjacency_64", |b| {
        b.iter(|| normalised_adjacency(black_box(&g)))
    });
}

fn bench_matrix_exp(c: &mut Criterion) {
    let g = make_graph();
    let mut generator = normalised_adjacency(&g);
    generator.add_diagonal(-1.0);
    c.bench_function("matrix_exp_64x64", |b| {
        b.iter(|| matrix_exp(black_box(&generator)).unwrap())
    });
}

fn bench_operator_cold(c: &mut Criterion) {
    let g = make_graph();
    c.bench_function("diffusion_operator_cold_64", |b| {
        b.iter(|| diffusion_operator(black_box(&g)).unwrap())
    });
}

fn bench_operator_cached(c: &mut Criterion) {
    let g = make_graph();
    let diffusion = GraphDiffusion::default();
    diffusion.operator(&g).unwrap();
    c.bench_function("diffusion_operator_cached_64", |b| {
        b.iter(|| diffusion.operator(black_box(&g)).unwrap())
    });
}

// ── Factorisation benchmarks ─────────────────────────────────────────

fn bench_cholesky(c: &mut Criterion) {
    let phi = diffusion_operator(&make_graph()).unwrap();
    let mut kuu = phi.matmul(&phi.transpose()).unwrap();
    kuu.add_diagonal(1e-6);
    c.bench_function("cholesky_phi_phi_t_64", |b| {
        b.iter(|| cholesky(black_box(&kuu)).unwrap())
    });
}

criterion_group!(
    operator,
    bench_normalised_adjacency,
    bench_matrix_exp,
    bench_operator_cold,
    bench_operator_cached,
);

criterion_group!(factorisation, bench_cholesky);

criterion_main!(operator, factorisation);
