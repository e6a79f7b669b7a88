//! Transition counting and maximum-likelihood Markov state models on discrete
//! trajectories.

use super::error::EngineError;
use crate::core::io::table::float_repr;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use std::io::{self, Write};
use tracing::{debug, warn};

const REVERSIBLE_TOLERANCE: f64 = 1e-10;
const REVERSIBLE_MAX_ITERATIONS: usize = 100_000;
const STATIONARY_TOLERANCE: f64 = 1e-14;
const STATIONARY_MAX_ITERATIONS: usize = 1_000_000;

/// How transition pairs are harvested from a discrete trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// Every pair `(t, t + lag)`.
    #[default]
    Sliding,
    /// Sliding counts divided by the lag time.
    SlidingEffective,
    /// Non-overlapping pairs `(0, lag), (lag, 2 lag), ...`.
    Sample,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCounts {
    matrix: DMatrix<f64>,
    lag: usize,
}

impl TransitionCounts {
    pub fn estimate(
        dtrajs: &[Vec<usize>],
        n_states: usize,
        lag: usize,
        mode: CountMode,
    ) -> Result<Self, EngineError> {
        if lag == 0 {
            return Err(EngineError::InvalidInput("lag time must be at least 1".into()));
        }
        let mut matrix = DMatrix::<f64>::zeros(n_states, n_states);
        for dtraj in dtrajs {
            if let Some(&bad) = dtraj.iter().find(|&&s| s >= n_states) {
                return Err(EngineError::InvalidInput(format!(
                    "state {} is outside the {} clusters",
                    bad, n_states
                )));
            }
            if dtraj.len() <= lag {
                continue;
            }
            let step = match mode {
                CountMode::Sample => lag,
                CountMode::Sliding | CountMode::SlidingEffective => 1,
            };
            for t in (0..dtraj.len() - lag).step_by(step) {
                matrix[(dtraj[t], dtraj[t + lag])] += 1.0;
            }
        }
        if mode == CountMode::SlidingEffective {
            matrix /= lag as f64;
        }
        Ok(Self { matrix, lag })
    }

    pub fn from_matrix(matrix: DMatrix<f64>, lag: usize) -> Self {
        Self { matrix, lag }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn n_states(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn total(&self) -> f64 {
        self.matrix.sum()
    }
}

/// States of the largest strongly connected component of the count graph, sorted.
///
/// An edge `i -> j` exists when `c_ij > 0`. Components of equal size are ranked by
/// their lowest state.
pub fn largest_connected_set(counts: &DMatrix<f64>) -> Vec<usize> {
    let components = Tarjan::new(counts).run();
    components
        .into_iter()
        .map(|mut c| {
            c.sort_unstable();
            c
        })
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b[0].cmp(&a[0])))
        .unwrap_or_default()
}

struct Tarjan<'a> {
    counts: &'a DMatrix<f64>,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(counts: &'a DMatrix<f64>) -> Self {
        let n = counts.nrows();
        Self {
            counts,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<usize>> {
        for v in 0..self.counts.nrows() {
            if self.index[v].is_none() {
                self.visit(v);
            }
        }
        self.components
    }

    // Iterative depth-first search; each frame is (vertex, next neighbour to try).
    fn visit(&mut self, root: usize) {
        let n = self.counts.nrows();
        let mut frames = vec![(root, 0usize)];
        self.open(root);
        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            let mut descend = None;
            while frame.1 < n {
                let w = frame.1;
                frame.1 += 1;
                if self.counts[(v, w)] <= 0.0 {
                    continue;
                }
                match self.index[w] {
                    None => {
                        descend = Some(w);
                        break;
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
            }
            if let Some(w) = descend {
                self.open(w);
                frames.push((w, 0));
                continue;
            }
            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if Some(self.lowlink[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    fn open(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsmOptions {
    pub reversible: bool,
    pub allow_disconnected: bool,
}

/// Maximum-likelihood Markov state model.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovStateModel {
    transition_matrix: DMatrix<f64>,
    stationary: DVector<f64>,
    active_set: Vec<usize>,
    lag: usize,
    reversible: bool,
}

impl MarkovStateModel {
    pub fn estimate(counts: &TransitionCounts, options: MsmOptions) -> Result<Self, EngineError> {
        let n = counts.n_states();
        if n == 0 {
            return Err(EngineError::InvalidInput("cannot estimate a model without states".into()));
        }
        let active_set = if options.allow_disconnected {
            (0..n).collect()
        } else {
            largest_connected_set(counts.matrix())
        };
        if active_set.len() < n {
            debug!(active = active_set.len(), total = n, "Restricted to the largest connected set");
        }
        let c = counts.matrix().select_rows(&active_set).select_columns(&active_set);
        if c.sum() <= 0.0 {
            return Err(EngineError::InvalidInput("no transitions were counted".into()));
        }

        let (transition_matrix, stationary) = if options.reversible {
            let x = reversible_mle(&c)?;
            let row_sums: Vec<f64> = x.row_iter().map(|r| r.sum()).collect();
            let t = normalize_rows(&x);
            let total: f64 = row_sums.iter().sum();
            let pi = DVector::from_iterator(row_sums.len(), row_sums.iter().map(|s| s / total));
            (t, pi)
        } else {
            let t = normalize_rows(&c);
            let pi = stationary_by_power_iteration(&t);
            (t, pi)
        };

        Ok(Self {
            transition_matrix,
            stationary,
            active_set,
            lag: counts.lag(),
            reversible: options.reversible,
        })
    }

    pub fn n_states(&self) -> usize {
        self.transition_matrix.nrows()
    }

    /// Original cluster labels of the model states.
    pub fn active_set(&self) -> &[usize] {
        &self.active_set
    }

    pub fn transition_matrix(&self) -> &DMatrix<f64> {
        &self.transition_matrix
    }

    pub fn stationary_distribution(&self) -> &DVector<f64> {
        &self.stationary
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    /// Mean first passage time from state `i` to state `j`, in units of trajectory
    /// steps. Unreachable targets give infinity.
    pub fn mfpt(&self, i: usize, j: usize) -> Result<f64, EngineError> {
        let n = self.n_states();
        if i >= n || j >= n {
            return Err(EngineError::InvalidInput(format!(
                "state pair ({}, {}) outside a model with {} states",
                i, j, n
            )));
        }
        if i == j {
            return Ok(0.0);
        }
        let others: Vec<usize> = (0..n).filter(|&k| k != j).collect();
        let sub = self.transition_matrix.select_rows(&others).select_columns(&others);
        let a = DMatrix::<f64>::identity(n - 1, n - 1) - sub;
        let b = DVector::<f64>::from_element(n - 1, 1.0);
        let Some(m) = a.lu().solve(&b) else {
            return Ok(f64::INFINITY);
        };
        let row = others.iter().position(|&k| k == i).ok_or_else(|| {
            EngineError::Internal(format!("state {} missing from passage system", i))
        })?;
        let value = m[row];
        if !value.is_finite() || value < 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(value * self.lag as f64)
    }

    /// Eigenvalue moduli sorted in descending order.
    pub fn eigenvalues(&self) -> Vec<f64> {
        let mut moduli: Vec<f64> = if self.reversible {
            match self.reversible_spectrum() {
                Ok((values, _)) => values.iter().map(|v| v.abs()).collect(),
                Err(_) => self.complex_moduli(),
            }
        } else {
            self.complex_moduli()
        };
        moduli.sort_by(|a, b| b.total_cmp(a));
        moduli
    }

    fn complex_moduli(&self) -> Vec<f64> {
        self.transition_matrix
            .complex_eigenvalues()
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Implied timescales `-lag / ln|λ_i|` of the `k` slowest processes.
    ///
    /// Processes with `|λ| = 1` have infinite timescales; the result is shorter than
    /// `k` when the model has fewer than `k + 1` states.
    pub fn timescales(&self, k: usize) -> Vec<f64> {
        self.eigenvalues()
            .into_iter()
            .skip(1)
            .take(k)
            .map(|lambda| {
                if lambda >= 1.0 - f64::EPSILON {
                    f64::INFINITY
                } else if lambda <= 0.0 {
                    0.0
                } else {
                    -(self.lag as f64) / lambda.ln()
                }
            })
            .collect()
    }

    /// Eigenvalues and right eigenvectors of a reversible model, sorted by descending
    /// eigenvalue modulus. The eigenvectors are the columns of the returned matrix.
    pub fn reversible_spectrum(&self) -> Result<(Vec<f64>, DMatrix<f64>), EngineError> {
        if self.stationary.iter().any(|&p| p <= 0.0) {
            return Err(EngineError::LinearAlgebra(
                "stationary distribution has empty states, cannot symmetrise".into(),
            ));
        }
        let n = self.n_states();
        let sqrt_pi: Vec<f64> = self.stationary.iter().map(|p| p.sqrt()).collect();
        let s = DMatrix::from_fn(n, n, |i, j| {
            sqrt_pi[i] * self.transition_matrix[(i, j)] / sqrt_pi[j]
        });
        let s = (&s + s.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(s);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].abs().total_cmp(&eigen.eigenvalues[a].abs()));
        let values = order.iter().map(|&k| eigen.eigenvalues[k]).collect();
        let vectors = DMatrix::from_fn(n, n, |i, c| eigen.eigenvectors[(i, order[c])] / sqrt_pi[i]);
        Ok((values, vectors))
    }

    /// Distribution after `steps` applications of the transition matrix to the row
    /// vector `p0`.
    pub fn propagate(&self, p0: &DVector<f64>, steps: usize) -> Result<DVector<f64>, EngineError> {
        if p0.len() != self.n_states() {
            return Err(EngineError::InvalidInput(format!(
                "initial distribution has {} entries for {} states",
                p0.len(),
                self.n_states()
            )));
        }
        let t_transposed = self.transition_matrix.transpose();
        let mut p = p0.clone();
        for _ in 0..steps {
            p = &t_transposed * p;
        }
        Ok(p)
    }
}

fn normalize_rows(m: &DMatrix<f64>) -> DMatrix<f64> {
    let mut t = m.clone();
    for (i, mut row) in t.row_iter_mut().enumerate() {
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        } else {
            row.fill(0.0);
            row[i] = 1.0;
        }
    }
    t
}

/// Fixed-point iteration for the reversible count matrix `x` whose row-normalised
/// form is the reversible maximum-likelihood transition matrix.
fn reversible_mle(c: &DMatrix<f64>) -> Result<DMatrix<f64>, EngineError> {
    let n = c.nrows();
    let c_sym = c + c.transpose();
    let c_rows: Vec<f64> = c.row_iter().map(|r| r.sum()).collect();
    let mut x = &c_sym / c_sym.sum();

    for iteration in 0..REVERSIBLE_MAX_ITERATIONS {
        let x_rows: Vec<f64> = x.row_iter().map(|r| r.sum()).collect();
        let mut next = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let numerator = c_sym[(i, j)];
                if numerator == 0.0 {
                    continue;
                }
                let denominator = ratio(c_rows[i], x_rows[i]) + ratio(c_rows[j], x_rows[j]);
                if denominator > 0.0 {
                    next[(i, j)] = numerator / denominator;
                }
            }
        }
        let total = next.sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(EngineError::LinearAlgebra(
                "reversible estimator diverged".into(),
            ));
        }
        next /= total;
        let change = (&next - &x).amax();
        x = next;
        if change < REVERSIBLE_TOLERANCE {
            debug!(iterations = iteration + 1, "Reversible estimator converged");
            return Ok(x);
        }
    }
    warn!(
        iterations = REVERSIBLE_MAX_ITERATIONS,
        "Reversible estimator did not converge, using last iterate"
    );
    Ok(x)
}

fn ratio(count: f64, weight: f64) -> f64 {
    if weight > 0.0 { count / weight } else { 0.0 }
}

/// Left fixed point of `t`, iterated on the lazy chain `(I + T) / 2` so periodic
/// chains converge as well.
fn stationary_by_power_iteration(t: &DMatrix<f64>) -> DVector<f64> {
    let n = t.nrows();
    let lazy = (DMatrix::<f64>::identity(n, n) + t.transpose()) * 0.5;
    let mut p = DVector::<f64>::from_element(n, 1.0 / n as f64);
    for _ in 0..STATIONARY_MAX_ITERATIONS {
        let mut next = &lazy * &p;
        let total = next.sum();
        if total > 0.0 {
            next /= total;
        }
        let change = (&next - &p).amax();
        p = next;
        if change < STATIONARY_TOLERANCE {
            break;
        }
    }
    p
}

/// Writes the transition probabilities in the `msm_rates` layout.
pub fn write_rates(model: &MarkovStateModel, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "Markov State Models transition matrix")?;
    writeln!(writer, "Number of states = {}", model.n_states())?;
    let t = model.transition_matrix();
    for i in 0..model.n_states() {
        writeln!(writer, "state = {}", i)?;
        for j in 0..model.n_states() {
            writeln!(writer, "p_{}->{} = {}", i, j, float_repr(t[(i, j)]))?;
        }
    }
    Ok(())
}

/// Writes the mean first passage times in the `msm_mfpt` layout.
pub fn write_mfpt(model: &MarkovStateModel, writer: &mut impl Write) -> Result<(), EngineError> {
    writeln!(writer, "Markov State Models mean first passage time matrix")?;
    writeln!(writer, "Number of states = {}", model.n_states())?;
    for i in 0..model.n_states() {
        writeln!(writer, "state = {}", i)?;
        for j in 0..model.n_states() {
            writeln!(writer, "mfpt_{}->{} = {}", i, j, float_repr(model.mfpt(i, j)?))?;
        }
    }
    Ok(())
}
