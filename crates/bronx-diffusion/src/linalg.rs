// ─────────────────────────────────────────────────────────────────────
// Bronx — Dense Factorisations and Solves
// ─────────────────────────────────────────────────────────────────────
//! Cholesky factorisation, triangular solves and LU with partial
//! pivoting over row-major [`Matrix`] buffers.

use bronx_types::{BronxError, BronxResult, Matrix};

fn require_square(a: &Matrix, what: &str) -> BronxResult<usize> {
    if !a.is_square() {
        return Err(BronxError::Shape(format!(
            "{what} needs a square matrix, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    Ok(a.rows())
}

/// Lower Cholesky factor `L` with `L Lᵀ = a`.
///
/// Only the lower triangle of `a` is read. Fails with
/// [`BronxError::NotPositiveDefinite`] on the first non-positive (or
/// non-finite) pivot; there is no retry with larger jitter.
pub fn cholesky(a: &Matrix) -> BronxResult<Matrix> {
    let n = require_square(a, "cholesky")?;
    let mut l = Matrix::zeros(n, n);

    for j in 0..n {
        let mut d = a[(j, j)];
        for k in 0..j {
            d -= l[(j, k)] * l[(j, k)];
        }
        if !(d > 0.0 && d.is_finite()) {
            log::warn!("cholesky: non-positive pivot {d:e} at row {j}");
            return Err(BronxError::NotPositiveDefinite { row: j, pivot: d });
        }
        let ljj = d.sqrt();
        l[(j, j)] = ljj;

        for i in (j + 1)..n {
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = s / ljj;
        }
    }
    Ok(l)
}

/// Solve `l · x = b` for lower-triangular `l` by forward substitution.
///
/// `b` may have any number of columns; each is solved independently.
pub fn solve_lower_triangular(l: &Matrix, b: &Matrix) -> BronxResult<Matrix> {
    let n = require_square(l, "solve_lower_triangular")?;
    if b.rows() != n {
        return Err(BronxError::Shape(format!(
            "triangular solve of {n}x{n} against {}x{}",
            b.rows(),
            b.cols()
        )));
    }
    let m = b.cols();
    let mut x = b.clone();

    for i in 0..n {
        let lii = l[(i, i)];
        if lii == 0.0 {
            return Err(BronxError::Singular(format!("zero diagonal at row {i}")));
        }
        for k in 0..i {
            let lik = l[(i, k)];
            if lik == 0.0 {
                continue;
            }
            for c in 0..m {
                let xk = x[(k, c)];
                x[(i, c)] -= lik * xk;
            }
        }
        for c in 0..m {
            x[(i, c)] /= lii;
        }
    }
    Ok(x)
}

/// Sum of `log L[i,i]` over the diagonal of a triangular factor.
pub fn log_diag_sum(l: &Matrix) -> f64 {
    l.diag().iter().map(|d| d.abs().ln()).sum()
}

/// Solve `a · x = b` by LU decomposition with partial pivoting.
pub fn lu_solve(a: &Matrix, b: &Matrix) -> BronxResult<Matrix> {
    let n = require_square(a, "lu_solve")?;
    if b.rows() != n {
        return Err(BronxError::Shape(format!(
            "lu_solve of {n}x{n} against {}x{}",
            b.rows(),
            b.cols()
        )));
    }
    let m = b.cols();
    let mut lu = a.clone();
    let mut x = b.clone();

    for col in 0..n {
        // Partial pivot: largest magnitude in the column at or below the diagonal.
        let mut pivot_row = col;
        let mut pivot_abs = lu[(col, col)].abs();
        for r in (col + 1)..n {
            let v = lu[(r, col)].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = r;
            }
        }
        if pivot_abs < f64::MIN_POSITIVE || !pivot_abs.is_finite() {
            return Err(BronxError::Singular(format!(
                "LU pivot {pivot_abs:e} in column {col}"
            )));
        }
        if pivot_row != col {
            for c in 0..n {
                let tmp = lu[(col, c)];
                lu[(col, c)] = lu[(pivot_row, c)];
                lu[(pivot_row, c)] = tmp;
            }
            for c in 0..m {
                let tmp = x[(col, c)];
                x[(col, c)] = x[(pivot_row, c)];
                x[(pivot_row, c)] = tmp;
            }
        }

        let pivot = lu[(col, col)];
        for r in (col + 1)..n {
            let factor = lu[(r, col)] / pivot;
            if factor == 0.0 {
                continue;
            }
            lu[(r, col)] = factor;
            for c in (col + 1)..n {
                let v = lu[(col, c)];
                lu[(r, c)] -= factor * v;
            }
            for c in 0..m {
                let v = x[(col, c)];
                x[(r, c)] -= factor * v;
            }
        }
    }

    // Back substitution on the upper factor.
    for i in (0..n).rev() {
        for k in (i + 1)..n {
            let u = lu[(i, k)];
            if u == 0.0 {
                continue;
            }
            for c in 0..m {
                let v = x[(k, c)];
                x[(i, c)] -= u * v;
            }
        }
        let d = lu[(i, i)];
        for c in 0..m {
            x[(i, c)] /= d;
        }
    }
    Ok(x)
}
