// ─────────────────────────────────────────────────────────────────────
// Bronx — Dense Matrix Exponential
// ─────────────────────────────────────────────────────────────────────
//! Scaling-and-squaring with diagonal Padé approximants.
//!
//! Degree selection follows Higham, "The Scaling and Squaring Method for
//! the Matrix Exponential Revisited" (SIAM J. Matrix Anal. Appl., 2005):
//! the smallest degree in {3, 5, 7, 9} whose 1-norm threshold covers
//! `‖A‖₁`, otherwise degree 13 after scaling `A` by `2⁻ˢ`.

use bronx_types::{BronxError, BronxResult, Matrix};

use crate::linalg::lu_solve;

/// Padé coefficients b_0..b_m for the orders used below.
const PADE_3: [f64; 4] = [120.0, 60.0, 12.0, 1.0];
const PADE_5: [f64; 6] = [30240.0, 15120.0, 3360.0, 420.0, 30.0, 1.0];
const PADE_7: [f64; 8] = [
    17297280.0, 8648640.0, 1995840.0, 277200.0, 25200.0, 1512.0, 56.0, 1.0,
];
const PADE_9: [f64; 10] = [
    17643225600.0,
    8821612800.0,
    2075673600.0,
    302702400.0,
    30270240.0,
    2162160.0,
    110880.0,
    3960.0,
    90.0,
    1.0,
];
const PADE_13: [f64; 14] = [
    64764752532480000.0,
    32382376266240000.0,
    7771770303897600.0,
    1187353796428800.0,
    129060195264000.0,
    10559470521600.0,
    670442572800.0,
    33522128640.0,
    1323241920.0,
    40840800.0,
    960960.0,
    16380.0,
    182.0,
    1.0,
];

/// 1-norm thresholds θ_m for m = 3, 5, 7, 9, 13.
const THETA_3: f64 = 1.495585217958292e-2;
const THETA_5: f64 = 2.539398330063230e-1;
const THETA_7: f64 = 9.504178996162932e-1;
const THETA_9: f64 = 2.097847961257068e0;
const THETA_13: f64 = 5.371920351148152e0;

/// `Σ c_k · P_k` for same-shaped matrices, skipping zero coefficients.
fn linear_combination(terms: &[(f64, &Matrix)], n: usize) -> Matrix {
    let mut out = Matrix::zeros(n, n);
    for &(c, m) in terms {
        if c == 0.0 {
            continue;
        }
        for (o, &v) in out.as_mut_slice().iter_mut().zip(m.as_slice()) {
            *o += c * v;
        }
    }
    out
}

/// Numerator/denominator pieces (U, V) for Padé orders 3..9.
fn pade_low(a: &Matrix, b: &[f64]) -> BronxResult<(Matrix, Matrix)> {
    let n = a.rows();
    let ident = Matrix::identity(n);
    let a2 = a.matmul(a)?;

    // Even powers A^0, A^2, A^4, ... up to the order needed.
    let mut powers = vec![ident, a2.clone()];
    while powers.len() * 2 < b.len() {
        let next = powers[powers.len() - 1].matmul(&a2)?;
        powers.push(next);
    }

    let odd: Vec<(f64, &Matrix)> = powers
        .iter()
        .enumerate()
        .filter(|(k, _)| 2 * k + 1 < b.len())
        .map(|(k, p)| (b[2 * k + 1], p))
        .collect();
    let even: Vec<(f64, &Matrix)> = powers
        .iter()
        .enumerate()
        .filter(|(k, _)| 2 * k < b.len())
        .map(|(k, p)| (b[2 * k], p))
        .collect();

    let u = a.matmul(&linear_combination(&odd, n))?;
    let v = linear_combination(&even, n);
    Ok((u, v))
}

/// Numerator/denominator pieces (U, V) for the order-13 approximant.
fn pade_13(a: &Matrix) -> BronxResult<(Matrix, Matrix)> {
    let n = a.rows();
    let b = &PADE_13;
    let ident = Matrix::identity(n);
    let a2 = a.matmul(a)?;
    let a4 = a2.matmul(&a2)?;
    let a6 = a4.matmul(&a2)?;

    let u_inner = a6.matmul(&linear_combination(
        &[(b[13], &a6), (b[11], &a4), (b[9], &a2)],
        n,
    ))?;
    let u_outer = linear_combination(
        &[
            (1.0, &u_inner),
            (b[7], &a6),
            (b[5], &a4),
            (b[3], &a2),
            (b[1], &ident),
        ],
        n,
    );
    let u = a.matmul(&u_outer)?;

    let v_inner = a6.matmul(&linear_combination(
        &[(b[12], &a6), (b[10], &a4), (b[8], &a2)],
        n,
    ))?;
    let v = linear_combination(
        &[
            (1.0, &v_inner),
            (b[6], &a6),
            (b[4], &a4),
            (b[2], &a2),
            (b[0], &ident),
        ],
        n,
    );
    Ok((u, v))
}

/// Dense matrix exponential `exp(a)`.
pub fn matrix_exp(a: &Matrix) -> BronxResult<Matrix> {
    if !a.is_square() {
        return Err(BronxError::Shape(format!(
            "matrix_exp needs a square matrix, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    if !a.is_finite() {
        return Err(BronxError::Numerical(
            "matrix_exp input contains NaN/Inf".into(),
        ));
    }
    let n = a.rows();
    if n == 0 {
        return Ok(Matrix::zeros(0, 0));
    }

    let norm = a.norm_one();
    let (u, v, squarings) = if norm <= THETA_3 {
        let (u, v) = pade_low(a, &PADE_3)?;
        (u, v, 0)
    } else if norm <= THETA_5 {
        let (u, v) = pade_low(a, &PADE_5)?;
        (u, v, 0)
    } else if norm <= THETA_7 {
        let (u, v) = pade_low(a, &PADE_7)?;
        (u, v, 0)
    } else if norm <= THETA_9 {
        let (u, v) = pade_low(a, &PADE_9)?;
        (u, v, 0)
    } else {
        let s = (norm / THETA_13).log2().ceil().max(0.0) as i32;
        let scaled = a.scale(2f64.powi(-s));
        let (u, v) = pade_13(&scaled)?;
        (u, v, s)
    };

    // Solve (V - U) R = (V + U).
    let p = v.add(&u)?;
    let q = v.sub(&u)?;
    let mut r = lu_solve(&q, &p)?;

    for _ in 0..squarings {
        r = r.matmul(&r)?;
    }

    if !r.is_finite() {
        log::warn!("matrix_exp produced non-finite entries (norm {norm:e})");
        return Err(BronxError::Numerical(
            "matrix_exp result contains NaN/Inf".into(),
        ));
    }
    Ok(r)
}
