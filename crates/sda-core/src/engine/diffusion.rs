use super::error::EngineError;
use crate::core::io::trajectory::TrajectoryRecord;
use nalgebra::Point3;
use std::ops::Range;

/// Dimensionality used in the Einstein relation `MSD = 2 d D t`.
pub const DIMENSIONS: f64 = 3.0;

/// Accumulates mean squared displacements over the trajectories of one density.
///
/// The first trajectory fixes the number of lags. Later trajectories that are shorter
/// only contribute to the lags they cover; longer ones are truncated. The mean is
/// taken over the number of trajectories added.
#[derive(Debug, Clone, Default)]
pub struct MsdAccumulator {
    sums: Option<Vec<f64>>,
    trajectories: usize,
}

impl MsdAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unwrapped trajectory.
    pub fn add(&mut self, unwrapped: &[Point3<f64>]) {
        let lags = unwrapped.len().saturating_sub(1);
        let sums = self.sums.get_or_insert_with(|| vec![0.0; lags]);
        self.trajectories += 1;
        let Some(origin) = unwrapped.first() else {
            return;
        };
        for (sum, p) in sums.iter_mut().zip(&unwrapped[1..]) {
            *sum += (p - origin).norm_squared();
        }
    }

    pub fn trajectories(&self) -> usize {
        self.trajectories
    }

    pub fn lags(&self) -> usize {
        self.sums.as_ref().map_or(0, Vec::len)
    }

    pub fn mean(&self) -> Vec<f64> {
        match &self.sums {
            Some(sums) if self.trajectories > 0 => {
                sums.iter().map(|s| s / self.trajectories as f64).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Times of lags `1..=lags` for a run printed every `freq_print` steps of `dt`.
pub fn lag_times(lags: usize, dt: f64, freq_print: i64) -> Vec<f64> {
    let step = dt * freq_print as f64;
    (1..=lags).map(|t| t as f64 * step).collect()
}

/// Half-open fit window with Python slice semantics: negative bounds count from the
/// end and out-of-range bounds are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitWindow {
    pub start: isize,
    pub end: isize,
}

impl FitWindow {
    pub fn new(start: isize, end: isize) -> Self {
        Self { start, end }
    }

    pub fn resolve(&self, len: usize) -> Range<usize> {
        let len_i = len as isize;
        let clamp = |i: isize| -> usize {
            let i = if i < 0 { i + len_i } else { i };
            i.clamp(0, len_i) as usize
        };
        let start = clamp(self.start);
        let end = clamp(self.end);
        start..end.max(start)
    }
}

impl Default for FitWindow {
    fn default() -> Self {
        Self::new(0, -1)
    }
}

/// Ordinary least-squares line `y = slope * x + intercept`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<(f64, f64), EngineError> {
    if x.len() != y.len() {
        return Err(EngineError::InvalidInput(format!(
            "cannot fit {} x values against {} y values",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(EngineError::InvalidInput(format!(
            "a linear fit needs at least two points, got {}",
            x.len()
        )));
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (&xi, &yi)| {
            let dx = xi - mean_x;
            (sxy + dx * (yi - mean_y), sxx + dx * dx)
        });
    if sxx == 0.0 {
        return Err(EngineError::InvalidInput(
            "all x values are identical, slope is undefined".into(),
        ));
    }
    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}

/// Diffusion coefficient from the slope of MSD against time inside `window`.
pub fn diffusion_coefficient(times: &[f64], msd: &[f64], window: FitWindow) -> Result<f64, EngineError> {
    let range = window.resolve(times.len().min(msd.len()));
    let (slope, _) = linear_fit(&times[range.clone()], &msd[range])?;
    Ok(slope / (2.0 * DIMENSIONS))
}

/// Positions of `solute` from frame `min_frame` on, in file order.
pub fn solute_positions(records: &[TrajectoryRecord], solute: u32, min_frame: i64) -> Vec<Point3<f64>> {
    records
        .iter()
        .filter(|r| r.solute == solute && r.frame >= min_frame)
        .map(|r| r.pose.position())
        .collect()
}

/// Crowder density in g/L encoded in an `assoc_<N>gL` folder name.
pub fn density_label(folder_name: &str) -> Option<i64> {
    folder_name
        .strip_prefix("assoc_")?
        .strip_suffix("gL")?
        .parse()
        .ok()
}
