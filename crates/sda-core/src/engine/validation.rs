use super::clustering::{KMeans, wcss};
use super::error::EngineError;
use super::msm::{CountMode, MarkovStateModel, MsmOptions, TransitionCounts};
use nalgebra::{DVector, Point3};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const SPECTRAL_KMEANS_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WcssPoint {
    pub clusters: usize,
    pub mean: f64,
    pub std: f64,
}

/// Within-cluster sum of squares for `k = 1..=max_clusters`.
///
/// Every `k` is fitted independently with `template`'s initialisation, seed and
/// iteration limit. Values of `k` larger than the number of points are skipped.
pub fn wcss_sweep(
    data: &[Point3<f64>],
    template: &KMeans,
    max_clusters: usize,
) -> Result<Vec<WcssPoint>, EngineError> {
    let upper = max_clusters.min(data.len());
    if upper < max_clusters {
        warn!(max_clusters, points = data.len(), "Sweep truncated to the number of points");
    }
    let ks: Vec<usize> = (1..=upper).collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = ks.iter();

    #[cfg(feature = "parallel")]
    let iterator = ks.par_iter();

    iterator
        .map(|&k| -> Result<WcssPoint, EngineError> {
            let estimator = KMeans {
                n_clusters: k,
                ..template.clone()
            };
            let model = estimator.fit(data)?;
            let (mean, std) = wcss(data, &model)
                .ok_or_else(|| EngineError::InvalidInput("no data to cluster".into()))?;
            debug!(k, mean, std, "WCSS evaluated");
            Ok(WcssPoint {
                clusters: k,
                mean,
                std,
            })
        })
        .collect()
}

fn reversible_model(
    dtrajs: &[Vec<usize>],
    n_states: usize,
    lag: usize,
) -> Result<MarkovStateModel, EngineError> {
    let counts = TransitionCounts::estimate(dtrajs, n_states, lag, CountMode::SlidingEffective)?;
    MarkovStateModel::estimate(
        &counts,
        MsmOptions {
            reversible: true,
            allow_disconnected: false,
        },
    )
}

/// Reversible models on effective counts, one per lag time.
pub fn models_over_lags(
    dtrajs: &[Vec<usize>],
    n_states: usize,
    lagtimes: &[usize],
) -> Result<Vec<MarkovStateModel>, EngineError> {
    lagtimes
        .iter()
        .map(|&lag| reversible_model(dtrajs, n_states, lag))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpliedTimescales {
    pub lag: usize,
    /// Always `count` entries; processes the model cannot resolve are NaN.
    pub timescales: Vec<f64>,
}

/// The `count` slowest implied timescales of each model.
pub fn implied_timescales(models: &[MarkovStateModel], count: usize) -> Vec<ImpliedTimescales> {
    models
        .iter()
        .map(|model| {
            let mut timescales = model.timescales(count);
            if timescales.len() < count {
                debug!(lag = model.lag(), states = model.n_states(), "Model resolves fewer timescales");
            }
            timescales.resize(count, f64::NAN);
            ImpliedTimescales {
                lag: model.lag(),
                timescales,
            }
        })
        .collect()
}

/// Crisp assignment of the model states to `n_sets` metastable sets.
///
/// The states are embedded with the leading `n_sets` right eigenvectors and grouped
/// with a deterministic k-means (farthest-point initialisation). With at least as many
/// sets as states every state is its own set.
pub fn metastable_memberships(
    model: &MarkovStateModel,
    n_sets: usize,
) -> Result<Vec<usize>, EngineError> {
    let n = model.n_states();
    if n_sets == 0 {
        return Err(EngineError::InvalidInput("need at least one metastable set".into()));
    }
    if n_sets >= n {
        return Ok((0..n).collect());
    }
    let (_, vectors) = model.reversible_spectrum()?;
    let embedding: Vec<DVector<f64>> = (0..n)
        .map(|i| DVector::from_iterator(n_sets, (0..n_sets).map(|c| vectors[(i, c)])))
        .collect();
    Ok(spectral_kmeans(&embedding, n_sets))
}

fn spectral_kmeans(points: &[DVector<f64>], k: usize) -> Vec<usize> {
    let mut centroids = vec![points[0].clone()];
    while centroids.len() < k {
        let farthest = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| (p - c).norm_squared())
                    .fold(f64::INFINITY, f64::min)
            })
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(i, _)| i);
        centroids.push(points[farthest].clone());
    }

    let mut assignments = vec![usize::MAX; points.len()];
    for _ in 0..SPECTRAL_KMEANS_ITERATIONS {
        let mut changed = false;
        for (assignment, p) in assignments.iter_mut().zip(points) {
            let best = centroids
                .iter()
                .enumerate()
                .map(|(c, centroid)| (c, (p - centroid).norm_squared()))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(c, _)| c);
            if *assignment != best {
                *assignment = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&DVector<f64>> = points
                .iter()
                .zip(&assignments)
                .filter(|&(_, &a)| a == c)
                .map(|(p, _)| p)
                .collect();
            if !members.is_empty() {
                let sum = members.iter().fold(DVector::zeros(centroid.len()), |acc, p| acc + *p);
                *centroid = sum / members.len() as f64;
            }
        }
    }
    assignments
}

#[derive(Debug, Clone, PartialEq)]
pub struct CkSet {
    pub set: usize,
    /// `(lag, probability)` from the test model propagated to the lag.
    pub predicted: Vec<(usize, f64)>,
    /// `(lag, probability)` from the model estimated at the lag.
    pub estimated: Vec<(usize, f64)>,
}

/// Chapman-Kolmogorov test of `models[0]` against the longer-lag models.
///
/// For every metastable set the stationary distribution restricted to the set is
/// propagated and the probability of still being inside the set is recorded. The
/// lag of every model must be a multiple of the test model's lag.
pub fn chapman_kolmogorov(models: &[MarkovStateModel], n_sets: usize) -> Result<Vec<CkSet>, EngineError> {
    let test = models
        .first()
        .ok_or_else(|| EngineError::InvalidInput("no models to test".into()))?;
    let base_lag = test.lag();
    let memberships = metastable_memberships(test, n_sets)?;
    let n_found = memberships.iter().max().map_or(0, |m| m + 1);
    info!(sets = n_found, lag = base_lag, "Metastable sets assigned");

    // Membership by original cluster label, so models with other active sets can use it.
    let label_count = models
        .iter()
        .flat_map(|m| m.active_set().iter().copied())
        .max()
        .map_or(0, |m| m + 1);
    let mut set_of_label = vec![None; label_count];
    for (state, &set) in memberships.iter().enumerate() {
        set_of_label[test.active_set()[state]] = Some(set);
    }

    let mut results = Vec::new();
    for set in 0..n_found {
        let in_set = |model: &MarkovStateModel| -> Vec<bool> {
            model
                .active_set()
                .iter()
                .map(|&label| set_of_label[label] == Some(set))
                .collect()
        };
        let Some(p0) = restricted_stationary(test, &in_set(test)) else {
            warn!(set, "Metastable set carries no stationary weight, skipped");
            continue;
        };

        let mut ck = CkSet {
            set,
            predicted: vec![(0, 1.0)],
            estimated: vec![(0, 1.0)],
        };
        for model in models {
            let lag = model.lag();
            if lag % base_lag != 0 {
                return Err(EngineError::InvalidInput(format!(
                    "lag {} is not a multiple of the test lag {}",
                    lag, base_lag
                )));
            }
            let predicted = test.propagate(&p0, lag / base_lag)?;
            ck.predicted.push((lag, mass_inside(&predicted, &in_set(test))));

            let mask = in_set(model);
            match restricted_stationary(model, &mask) {
                Some(start) => {
                    let estimated = model.propagate(&start, 1)?;
                    ck.estimated.push((lag, mass_inside(&estimated, &mask)));
                }
                None => ck.estimated.push((lag, f64::NAN)),
            }
        }
        results.push(ck);
    }
    Ok(results)
}

fn restricted_stationary(model: &MarkovStateModel, mask: &[bool]) -> Option<DVector<f64>> {
    let pi = model.stationary_distribution();
    let p = DVector::from_iterator(
        pi.len(),
        pi.iter().zip(mask).map(|(&p, &inside)| if inside { p } else { 0.0 }),
    );
    let total = p.sum();
    (total > 0.0).then(|| p / total)
}

fn mass_inside(p: &DVector<f64>, mask: &[bool]) -> f64 {
    p.iter().zip(mask).filter(|&(_, &inside)| inside).map(|(v, _)| v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn two_wells(len: usize) -> Vec<usize> {
        // Long stays in {0,1} then {2,3}, with random hopping inside each well.
        let mut rng = StdRng::seed_from_u64(7);
        (0..len)
            .map(|t| {
                let well = (t / 50) % 2;
                well * 2 + usize::from(rng.gen_bool(0.5))
            })
            .collect()
    }

    #[test]
    fn sweep_reports_every_k() {
        let data: Vec<Point3<f64>> = (0..30).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let sweep = wcss_sweep(&data, &KMeans::new(1).with_seed(1), 4).unwrap();
        assert_eq!(sweep.iter().map(|p| p.clusters).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(sweep[3].mean < sweep[0].mean);
    }

    #[test]
    fn sweep_is_truncated_to_point_count() {
        let data = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let sweep = wcss_sweep(&data, &KMeans::new(1), 5).unwrap();
        assert_eq!(sweep.len(), 2);
        assert!(sweep[1].mean.abs() < 1e-12);
    }

    #[test]
    fn timescales_are_padded_with_nan() {
        let dtrajs = vec![two_wells(1000)];
        let models = models_over_lags(&dtrajs, 4, &[1, 2]).unwrap();
        let its = implied_timescales(&models, 5);
        assert_eq!(its.len(), 2);
        assert_eq!(its[1].lag, 2);
        assert_eq!(its[0].timescales.len(), 5);
        assert!(its[0].timescales[0] > its[0].timescales[1]);
        assert!(its[0].timescales[3].is_nan());
    }

    #[test]
    fn spectral_sets_recover_the_wells() {
        let dtrajs = vec![two_wells(2000)];
        let models = models_over_lags(&dtrajs, 4, &[1]).unwrap();
        let sets = metastable_memberships(&models[0], 2).unwrap();
        assert_eq!(sets[0], sets[1]);
        assert_eq!(sets[2], sets[3]);
        assert_ne!(sets[0], sets[2]);
        assert_eq!(metastable_memberships(&models[0], 4).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn ck_test_of_markovian_wells_agrees() {
        let dtrajs = vec![two_wells(5000)];
        let models = models_over_lags(&dtrajs, 4, &[1, 2, 3]).unwrap();
        let ck = chapman_kolmogorov(&models, 2).unwrap();
        assert_eq!(ck.len(), 2);
        for set in &ck {
            assert_eq!(set.predicted.len(), 4);
            assert_eq!(set.predicted[0], (0, 1.0));
            for (p, e) in set.predicted.iter().zip(&set.estimated) {
                assert_eq!(p.0, e.0);
                assert!(p.1 > 0.5 && e.1 > 0.5);
            }
        }
    }

    #[test]
    fn ck_test_rejects_non_multiple_lags() {
        let dtrajs = vec![two_wells(500)];
        let models = models_over_lags(&dtrajs, 4, &[2, 3]).unwrap();
        assert!(matches!(chapman_kolmogorov(&models, 2), Err(EngineError::InvalidInput(_))));
    }
}
