//! Full AC power flow by Newton-Raphson on the polar power equations.
//!
//! ```text
//! P_i = Σ_j V_i V_j (G_ij cos θ_ij + B_ij sin θ_ij)
//! Q_i = Σ_j V_i V_j (G_ij sin θ_ij − B_ij cos θ_ij)
//!
//! J · [Δθ; ΔV] = [ΔP; ΔQ]     θ for non-slack buses, V for PQ buses
//! ```
//!
//! The iteration stops when max(|ΔP|, |ΔQ|) drops below the tolerance (p.u.).

use super::{BusType, LineData, SnapshotSolution, Topology};
use netsim_core::LinearSystemBackend;
use num_complex::{Complex64, ComplexFloat};
use tracing::debug;

/// Dense bus admittance matrix, `(G_ij, B_ij)` per entry.
pub(crate) type YBus = Vec<Vec<(f64, f64)>>;

/// Build Y_bus from the π-model of every line.
pub(crate) fn build_y_bus(n: usize, lines: &[LineData]) -> YBus {
    let mut y_bus = vec![vec![(0.0, 0.0); n]; n];
    for line in lines {
        let (i, j) = (line.from, line.to);
        let y_series = series_admittance(line);
        let y_shunt = Complex64::new(0.0, line.b / 2.0);

        let y_off = -y_series;
        y_bus[i][j].0 += y_off.re;
        y_bus[i][j].1 += y_off.im;
        y_bus[j][i].0 += y_off.re;
        y_bus[j][i].1 += y_off.im;

        let y_diag = y_series + y_shunt;
        y_bus[i][i].0 += y_diag.re;
        y_bus[i][i].1 += y_diag.im;
        y_bus[j][j].0 += y_diag.re;
        y_bus[j][j].1 += y_diag.im;
    }
    y_bus
}

fn series_admittance(line: &LineData) -> Complex64 {
    Complex64::new(line.r, line.x).recip()
}

/// P and Q injections (p.u.) of the current voltage state.
pub(crate) fn compute_power(y_bus: &YBus, v_mag: &[f64], v_ang: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = v_mag.len();
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            let (g_ij, b_ij) = y_bus[i][j];
            if g_ij == 0.0 && b_ij == 0.0 {
                continue;
            }
            let theta_ij = v_ang[i] - v_ang[j];
            let (sin, cos) = theta_ij.sin_cos();
            p[i] += v_mag[i] * v_mag[j] * (g_ij * cos + b_ij * sin);
            q[i] += v_mag[i] * v_mag[j] * (g_ij * sin - b_ij * cos);
        }
    }
    (p, q)
}

pub(crate) struct NewtonOutcome {
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch: f64,
}

pub(crate) struct NewtonSettings<'a> {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub solver: &'a dyn LinearSystemBackend,
}

/// Iterate until the mismatch is below tolerance or the budget is spent.
///
/// A singular Jacobian or a non-finite state counts as divergence.
pub(crate) fn newton_raphson(
    y_bus: &YBus,
    bus_types: &[BusType],
    p_spec: &[f64],
    q_spec: &[f64],
    v_mag: &mut [f64],
    v_ang: &mut [f64],
    settings: &NewtonSettings<'_>,
) -> NewtonOutcome {
    let p_buses: Vec<usize> = (0..bus_types.len())
        .filter(|&i| bus_types[i] != BusType::Slack)
        .collect();
    let q_buses: Vec<usize> = (0..bus_types.len())
        .filter(|&i| bus_types[i] == BusType::PQ)
        .collect();
    let n_p = p_buses.len();

    if p_buses.is_empty() && q_buses.is_empty() {
        return NewtonOutcome {
            converged: true,
            iterations: 0,
            max_mismatch: 0.0,
        };
    }

    let mismatch_of = |v_mag: &[f64], v_ang: &[f64]| {
        let (p_calc, q_calc) = compute_power(y_bus, v_mag, v_ang);
        let mismatch: Vec<f64> = p_buses
            .iter()
            .map(|&i| p_spec[i] - p_calc[i])
            .chain(q_buses.iter().map(|&i| q_spec[i] - q_calc[i]))
            .collect();
        let max = mismatch.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
        (mismatch, max)
    };

    for iter in 0..settings.max_iterations {
        let (mismatch, max_mismatch) = mismatch_of(v_mag, v_ang);
        debug!(iteration = iter, max_mismatch, "newton-raphson step");
        if !max_mismatch.is_finite() {
            return NewtonOutcome {
                converged: false,
                iterations: iter,
                max_mismatch: f64::INFINITY,
            };
        }
        if max_mismatch < settings.tolerance {
            return NewtonOutcome {
                converged: true,
                iterations: iter,
                max_mismatch,
            };
        }

        let jacobian = build_jacobian(y_bus, v_mag, v_ang, &p_buses, &q_buses);
        let delta = match settings.solver.solve(&jacobian, &mismatch) {
            Ok(delta) => delta,
            Err(err) => {
                debug!(error = %err, "jacobian solve failed");
                return NewtonOutcome {
                    converged: false,
                    iterations: iter,
                    max_mismatch,
                };
            }
        };
        for (k, &i) in p_buses.iter().enumerate() {
            v_ang[i] += delta[k];
        }
        for (k, &i) in q_buses.iter().enumerate() {
            v_mag[i] += delta[n_p + k];
        }
    }

    let (_, max_mismatch) = mismatch_of(v_mag, v_ang);
    NewtonOutcome {
        converged: max_mismatch < settings.tolerance,
        iterations: settings.max_iterations,
        max_mismatch,
    }
}

fn build_jacobian(
    y_bus: &YBus,
    v_mag: &[f64],
    v_ang: &[f64],
    p_buses: &[usize],
    q_buses: &[usize],
) -> Vec<Vec<f64>> {
    let (p_calc, q_calc) = compute_power(y_bus, v_mag, v_ang);
    let n_p = p_buses.len();
    let n_vars = n_p + q_buses.len();
    let mut jacobian = vec![vec![0.0; n_vars]; n_vars];

    // J11: ∂P/∂θ
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jacobian[row][col] = dp_dtheta(y_bus, v_mag, v_ang, &q_calc, i, j);
        }
    }
    // J12: ∂P/∂V
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            jacobian[row][n_p + col] = dp_dv(y_bus, v_mag, v_ang, &p_calc, i, j);
        }
    }
    // J21: ∂Q/∂θ
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jacobian[n_p + row][col] = dq_dtheta(y_bus, v_mag, v_ang, &p_calc, i, j);
        }
    }
    // J22: ∂Q/∂V
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            jacobian[n_p + row][n_p + col] = dq_dv(y_bus, v_mag, v_ang, &q_calc, i, j);
        }
    }
    jacobian
}

fn dp_dtheta(y: &YBus, v_mag: &[f64], v_ang: &[f64], q: &[f64], i: usize, j: usize) -> f64 {
    let (g_ij, b_ij) = y[i][j];
    if i == j {
        -q[i] - b_ij * v_mag[i] * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        v_mag[i] * v_mag[j] * (g_ij * sin - b_ij * cos)
    }
}

fn dp_dv(y: &YBus, v_mag: &[f64], v_ang: &[f64], p: &[f64], i: usize, j: usize) -> f64 {
    let (g_ij, b_ij) = y[i][j];
    if i == j {
        p[i] / v_mag[i] + g_ij * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        v_mag[i] * (g_ij * cos + b_ij * sin)
    }
}

fn dq_dtheta(y: &YBus, v_mag: &[f64], v_ang: &[f64], p: &[f64], i: usize, j: usize) -> f64 {
    let (g_ij, b_ij) = y[i][j];
    if i == j {
        p[i] - g_ij * v_mag[i] * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        -v_mag[i] * v_mag[j] * (g_ij * cos + b_ij * sin)
    }
}

fn dq_dv(y: &YBus, v_mag: &[f64], v_ang: &[f64], q: &[f64], i: usize, j: usize) -> f64 {
    let (g_ij, b_ij) = y[i][j];
    if i == j {
        q[i] / v_mag[i] - b_ij * v_mag[i]
    } else {
        let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
        v_mag[i] * (g_ij * sin - b_ij * cos)
    }
}

/// Complex power entering a line at each end, p.u.: `(s_from, s_to)`.
fn line_power(line: &LineData, v_mag: &[f64], v_ang: &[f64]) -> (Complex64, Complex64) {
    let v_i = Complex64::from_polar(v_mag[line.from], v_ang[line.from]);
    let v_j = Complex64::from_polar(v_mag[line.to], v_ang[line.to]);
    let y_series = series_admittance(line);
    let y_shunt = Complex64::new(0.0, line.b / 2.0);
    let i_ij = y_series * (v_i - v_j) + y_shunt * v_i;
    let i_ji = y_series * (v_j - v_i) + y_shunt * v_j;
    (v_i * i_ij.conj(), v_j * i_ji.conj())
}

/// Solve one snapshot from a flat start.
pub(crate) fn solve_snapshot(
    topology: &Topology,
    y_bus: &YBus,
    p_spec: &[f64],
    q_spec: &[f64],
    settings: &NewtonSettings<'_>,
) -> SnapshotSolution {
    let n = topology.bus_types.len();
    let mut v_mag: Vec<f64> = (0..n)
        .map(|i| match topology.bus_types[i] {
            BusType::PQ => 1.0,
            BusType::Slack | BusType::PV => topology.v_set[i],
        })
        .collect();
    let mut v_ang = vec![0.0; n];

    let outcome = newton_raphson(
        y_bus,
        &topology.bus_types,
        p_spec,
        q_spec,
        &mut v_mag,
        &mut v_ang,
        settings,
    );
    let (p_bus, q_bus) = compute_power(y_bus, &v_mag, &v_ang);
    let line_flows = topology
        .lines
        .iter()
        .map(|line| {
            let (s0, s1) = line_power(line, &v_mag, &v_ang);
            [s0.re, s0.im, s1.re, s1.im]
        })
        .collect();

    SnapshotSolution {
        converged: outcome.converged,
        iterations: outcome.iterations,
        max_mismatch: outcome.max_mismatch,
        v_mag,
        v_ang,
        p_bus,
        q_bus: Some(q_bus),
        line_flows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_core::{FaerSolver, GaussSolver};

    fn line(from: usize, to: usize, r: f64, x: f64) -> LineData {
        LineData {
            component: 0,
            from,
            to,
            r,
            x,
            b: 0.0,
        }
    }

    #[test]
    fn y_bus_rows_sum_to_zero_without_shunts() {
        let lines = vec![line(0, 1, 0.01, 0.1), line(1, 2, 0.02, 0.2)];
        let y = build_y_bus(3, &lines);
        for row in &y {
            let g: f64 = row.iter().map(|e| e.0).sum();
            let b: f64 = row.iter().map(|e| e.1).sum();
            assert!(g.abs() < 1e-12 && b.abs() < 1e-12);
        }
    }

    #[test]
    fn two_bus_case_converges_with_both_backends() {
        let y = build_y_bus(2, &[line(0, 1, 0.01, 0.1)]);
        let types = [BusType::Slack, BusType::PQ];
        let p_spec = [0.0, -0.5];
        let q_spec = [0.0, -0.1];
        let gauss = GaussSolver;
        let faer = FaerSolver;
        for solver in [&gauss as &dyn LinearSystemBackend, &faer] {
            let mut v_mag = vec![1.0, 1.0];
            let mut v_ang = vec![0.0, 0.0];
            let settings = NewtonSettings {
                tolerance: 1e-8,
                max_iterations: 20,
                solver,
            };
            let outcome =
                newton_raphson(&y, &types, &p_spec, &q_spec, &mut v_mag, &mut v_ang, &settings);
            assert!(outcome.converged);
            assert!(outcome.iterations < 10);
            assert!(v_mag[1] < 1.0);
            assert!(v_ang[1] < 0.0);
            let (p, _) = compute_power(&y, &v_mag, &v_ang);
            // Slack covers the load plus series losses.
            assert!(p[0] > 0.5 && p[0] < 0.52);
        }
    }

    #[test]
    fn impossible_transfer_does_not_converge() {
        let y = build_y_bus(2, &[line(0, 1, 0.0, 1.0)]);
        let types = [BusType::Slack, BusType::PQ];
        let mut v_mag = vec![1.0, 1.0];
        let mut v_ang = vec![0.0, 0.0];
        let settings = NewtonSettings {
            tolerance: 1e-6,
            max_iterations: 30,
            solver: &FaerSolver,
        };
        // Far beyond the static transfer limit of |V|²/x = 1 p.u.
        let outcome = newton_raphson(
            &y,
            &types,
            &[0.0, -5.0],
            &[0.0, 0.0],
            &mut v_mag,
            &mut v_ang,
            &settings,
        );
        assert!(!outcome.converged);
    }

    #[test]
    fn lossless_line_flows_balance() {
        let l = line(0, 1, 0.0, 0.1);
        let (s0, s1) = line_power(&l, &[1.0, 1.0], &[0.0, -0.05]);
        assert!((s0.re + s1.re).abs() < 1e-12);
        assert!(s0.re > 0.0);
    }
}
