use anyhow::{anyhow, bail, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Solves dense square systems `A x = b`.
///
/// Newton-Raphson hands its Jacobian here every iteration; the linear power
/// flow hands its reduced susceptance matrix once per snapshot.
pub trait LinearSystemBackend: Send + Sync {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;

    fn name(&self) -> &'static str;
}

const PIVOT_EPS: f64 = 1e-12;

fn check_shape(matrix: &[Vec<f64>], rhs: &[f64]) -> Result<usize> {
    let n = matrix.len();
    if rhs.len() != n {
        bail!("rhs length ({}) does not match matrix dimension {}", rhs.len(), n);
    }
    if matrix.iter().any(|row| row.len() != n) {
        bail!("matrix must be square");
    }
    Ok(n)
}

/// Gaussian elimination with partial pivoting and back substitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_shape(matrix, rhs)?;
        let mut a = matrix.to_vec();
        let mut b = rhs.to_vec();

        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
                .unwrap_or(col);
            if a[pivot][col].abs() < PIVOT_EPS {
                bail!("singular matrix (column {col})");
            }
            a.swap(col, pivot);
            b.swap(col, pivot);

            for row in col + 1..n {
                let factor = a[row][col] / a[col][col];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    a[row][k] -= factor * a[col][k];
                }
                b[row] -= factor * b[col];
            }
        }

        let mut x = vec![0.0; n];
        for row in (0..n).rev() {
            let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
            x[row] = (b[row] - tail) / a[row][row];
        }
        Ok(x)
    }

    fn name(&self) -> &'static str {
        "gauss"
    }
}

/// LU with partial pivoting from `faer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_shape(matrix, rhs)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        let solution: Vec<f64> = (0..n).map(|i| sol.read(i, 0)).collect();
        // faer does not report singularity; it surfaces as non-finite entries.
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("singular matrix"));
        }
        Ok(solution)
    }

    fn name(&self) -> &'static str {
        "faer"
    }
}
