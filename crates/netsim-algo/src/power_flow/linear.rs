//! Linear (DC) power flow: `B'·θ = P` with `|V| = 1` and no losses.
//!
//! Line flows follow `P_ij = (θ_i − θ_j) / x_ij`. The slack bus of each
//! island is removed from the system, leaving a reduced susceptance matrix
//! that is nonsingular for every connected island.

use super::{BusType, SnapshotSolution, Topology};
use netsim_core::LinearSystemBackend;
use sprs::{CsMat, TriMat};

/// Susceptance matrix B' over all buses (CSR).
pub(crate) fn build_b_prime(topology: &Topology) -> CsMat<f64> {
    let n = topology.bus_types.len();
    let mut triplets = TriMat::new((n, n));
    for line in &topology.lines {
        let b = 1.0 / line.x;
        triplets.add_triplet(line.from, line.from, b);
        triplets.add_triplet(line.to, line.to, b);
        triplets.add_triplet(line.from, line.to, -b);
        triplets.add_triplet(line.to, line.from, -b);
    }
    triplets.to_csr()
}

/// Solve one snapshot. `p_spec` is in p.u.
pub(crate) fn solve_snapshot(
    topology: &Topology,
    b_prime: &CsMat<f64>,
    p_spec: &[f64],
    solver: &dyn LinearSystemBackend,
) -> SnapshotSolution {
    let n = topology.bus_types.len();
    let free: Vec<usize> = (0..n)
        .filter(|&i| topology.bus_types[i] != BusType::Slack)
        .collect();
    let mut position = vec![None; n];
    for (k, &i) in free.iter().enumerate() {
        position[i] = Some(k);
    }

    let mut reduced = vec![vec![0.0; free.len()]; free.len()];
    for (row, &i) in free.iter().enumerate() {
        if let Some(row_view) = b_prime.outer_view(i) {
            for (j, &b_ij) in row_view.iter() {
                if let Some(col) = position[j] {
                    reduced[row][col] = b_ij;
                }
            }
        }
    }
    let rhs: Vec<f64> = free.iter().map(|&i| p_spec[i]).collect();

    let mut v_ang = vec![0.0; n];
    let solved = if free.is_empty() {
        Ok(Vec::new())
    } else {
        solver.solve(&reduced, &rhs)
    };
    let converged = match solved {
        Ok(theta) if theta.iter().all(|v| v.is_finite()) => {
            for (k, &i) in free.iter().enumerate() {
                v_ang[i] = theta[k];
            }
            true
        }
        _ => false,
    };

    let mut p_bus = vec![0.0; n];
    for (i, row_view) in b_prime.outer_iterator().enumerate() {
        p_bus[i] = row_view.iter().map(|(j, b_ij)| b_ij * v_ang[j]).sum();
    }
    let max_mismatch = if converged {
        free.iter()
            .map(|&i| (p_spec[i] - p_bus[i]).abs())
            .fold(0.0, f64::max)
    } else {
        f64::INFINITY
    };
    let line_flows = topology
        .lines
        .iter()
        .map(|line| {
            let flow = (v_ang[line.from] - v_ang[line.to]) / line.x;
            [flow, 0.0, -flow, 0.0]
        })
        .collect();

    SnapshotSolution {
        converged,
        iterations: usize::from(converged),
        max_mismatch,
        v_mag: vec![1.0; n],
        v_ang,
        p_bus,
        q_bus: None,
        line_flows,
    }
}
