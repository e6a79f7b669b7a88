use super::config::ClusteringConfig;
use super::error::EngineError;
use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Strategy for placing the initial cluster centres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum KMeansInit {
    /// First centre uniformly at random, then each next one with probability
    /// proportional to the squared distance to the closest chosen centre.
    #[default]
    #[serde(rename = "kmeans++", alias = "kmeans-plus-plus")]
    KMeansPlusPlus,
    /// Distinct data points drawn uniformly at random.
    #[serde(rename = "uniform")]
    Uniform,
}

impl FromStr for KMeansInit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans++" | "kmeans-plus-plus" => Ok(KMeansInit::KMeansPlusPlus),
            "uniform" => Ok(KMeansInit::Uniform),
            other => Err(format!("unknown k-means initialisation '{}'", other)),
        }
    }
}

impl fmt::Display for KMeansInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KMeansInit::KMeansPlusPlus => write!(f, "kmeans++"),
            KMeansInit::Uniform => write!(f, "uniform"),
        }
    }
}

/// Lloyd's k-means on three-dimensional points.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub n_clusters: usize,
    pub init: KMeansInit,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            init: KMeansInit::KMeansPlusPlus,
            max_iter: 500,
            tolerance: 1e-5,
            seed: 13,
        }
    }

    pub fn with_init(mut self, init: KMeansInit) -> Self {
        self.init = init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn check(&self, data: &[Point3<f64>]) -> Result<(), EngineError> {
        if self.n_clusters == 0 {
            return Err(EngineError::InvalidInput("number of clusters must be at least 1".into()));
        }
        if self.n_clusters > data.len() {
            return Err(EngineError::InvalidInput(format!(
                "cannot place {} clusters on {} points",
                self.n_clusters,
                data.len()
            )));
        }
        Ok(())
    }

    /// Places the initial centres without any Lloyd iteration.
    pub fn initial_centers(&self, data: &[Point3<f64>]) -> Result<Vec<Point3<f64>>, EngineError> {
        self.check(data)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let centers = match self.init {
            KMeansInit::Uniform => sample(&mut rng, data.len(), self.n_clusters)
                .into_iter()
                .map(|i| data[i])
                .collect(),
            KMeansInit::KMeansPlusPlus => {
                let first = sample(&mut rng, data.len(), 1).index(0);
                let mut centers = vec![data[first]];
                let mut closest: Vec<f64> = data
                    .iter()
                    .map(|p| (p - data[first]).norm_squared())
                    .collect();
                while centers.len() < self.n_clusters {
                    let next = match WeightedIndex::new(&closest) {
                        Ok(dist) => dist.sample(&mut rng),
                        // Every point coincides with a centre already.
                        Err(_) => sample(&mut rng, data.len(), 1).index(0),
                    };
                    let center = data[next];
                    for (d, p) in closest.iter_mut().zip(data) {
                        *d = d.min((p - center).norm_squared());
                    }
                    centers.push(center);
                }
                centers
            }
        };
        Ok(centers)
    }

    /// Refines `centers` with Lloyd iterations.
    ///
    /// Clusters that lose all their points keep their previous centre. Iteration stops
    /// once the inertia changes by less than the tolerance or `max_iter` is reached.
    pub fn fit_from(
        &self,
        data: &[Point3<f64>],
        centers: Vec<Point3<f64>>,
    ) -> Result<KMeansModel, EngineError> {
        self.check(data)?;
        if centers.len() != self.n_clusters {
            return Err(EngineError::InvalidInput(format!(
                "expected {} initial centres, got {}",
                self.n_clusters,
                centers.len()
            )));
        }
        let mut model = KMeansModel {
            centers,
            inertias: Vec::new(),
        };
        let mut previous: Option<f64> = None;
        for iteration in 0..self.max_iter {
            let labels = model.transform(data);
            let inertia = model.inertia_with_labels(data, &labels);
            model.inertias.push(inertia);
            trace!(iteration, inertia, "k-means iteration");

            let mut sums = vec![Vector3::<f64>::zeros(); self.n_clusters];
            let mut counts = vec![0usize; self.n_clusters];
            for (p, &label) in data.iter().zip(&labels) {
                sums[label] += p.coords;
                counts[label] += 1;
            }
            for ((center, sum), &count) in model.centers.iter_mut().zip(&sums).zip(&counts) {
                if count > 0 {
                    *center = Point3::from(sum / count as f64);
                }
            }

            if previous.is_some_and(|prev| (prev - inertia).abs() < self.tolerance) {
                debug!(iterations = iteration + 1, inertia, "k-means converged");
                break;
            }
            previous = Some(inertia);
        }
        Ok(model)
    }

    /// Places centres with the configured strategy, then refines them.
    pub fn fit(&self, data: &[Point3<f64>]) -> Result<KMeansModel, EngineError> {
        let placed = self.initial_centers(data)?;
        self.fit_from(data, placed)
    }
}

impl From<&ClusteringConfig> for KMeans {
    fn from(config: &ClusteringConfig) -> Self {
        KMeans::new(config.num_clusters)
            .with_init(config.init)
            .with_seed(config.seed)
            .with_max_iter(config.max_iterations)
    }
}

/// Cluster centres of a fitted k-means estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    centers: Vec<Point3<f64>>,
    inertias: Vec<f64>,
}

impl KMeansModel {
    pub fn from_centers(centers: Vec<Point3<f64>>) -> Self {
        Self {
            centers,
            inertias: Vec::new(),
        }
    }

    pub fn centers(&self) -> &[Point3<f64>] {
        &self.centers
    }

    pub fn n_clusters(&self) -> usize {
        self.centers.len()
    }

    /// Inertia recorded at each Lloyd iteration.
    pub fn inertias(&self) -> &[f64] {
        &self.inertias
    }

    /// Index of the closest centre for every point; ties keep the lower index.
    pub fn transform(&self, points: &[Point3<f64>]) -> Vec<usize> {
        #[cfg(not(feature = "parallel"))]
        let iterator = points.iter();

        #[cfg(feature = "parallel")]
        let iterator = points.par_iter();

        iterator.map(|p| self.nearest(p).0).collect()
    }

    fn nearest(&self, p: &Point3<f64>) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (i, c) in self.centers.iter().enumerate() {
            let d = (p - c).norm_squared();
            if d < best.1 {
                best = (i, d);
            }
        }
        best
    }

    fn inertia_with_labels(&self, data: &[Point3<f64>], labels: &[usize]) -> f64 {
        data.iter()
            .zip(labels)
            .map(|(p, &l)| (p - self.centers[l]).norm_squared())
            .sum()
    }

    /// Sum of squared distances of every point to its closest centre.
    pub fn inertia(&self, data: &[Point3<f64>]) -> f64 {
        data.iter().map(|p| self.nearest(p).1).sum()
    }
}

/// Fits `estimator` on the concatenation of all trajectories and labels every frame.
pub fn discretize(
    trajectories: &[Vec<Point3<f64>>],
    estimator: &KMeans,
) -> Result<(KMeansModel, Vec<Vec<usize>>), EngineError> {
    let data: Vec<Point3<f64>> = trajectories.iter().flatten().copied().collect();
    let model = estimator.fit(&data)?;
    let dtrajs = trajectories.iter().map(|t| model.transform(t)).collect();
    Ok((model, dtrajs))
}

/// Mean and population standard deviation of the squared point-to-centre distances.
pub fn wcss(data: &[Point3<f64>], model: &KMeansModel) -> Option<(f64, f64)> {
    if data.is_empty() || model.n_clusters() == 0 {
        return None;
    }
    let squared: Vec<f64> = data.iter().map(|p| model.nearest(p).1).collect();
    let n = squared.len() as f64;
    let mean = squared.iter().sum::<f64>() / n;
    let variance = squared.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for i in 0..10 {
            let e = i as f64 * 0.1;
            points.push(Point3::new(e, 0.0, 0.0));
            points.push(Point3::new(100.0 + e, 0.0, 0.0));
        }
        points
    }

    #[test]
    fn init_parses_from_config_strings() {
        assert_eq!("kmeans++".parse::<KMeansInit>(), Ok(KMeansInit::KMeansPlusPlus));
        assert_eq!("Uniform".parse::<KMeansInit>(), Ok(KMeansInit::Uniform));
        assert!("random".parse::<KMeansInit>().is_err());
        assert_eq!(KMeansInit::Uniform.to_string(), "uniform");
    }

    #[test]
    fn separates_two_blobs() {
        let data = two_blobs();
        let model = KMeans::new(2).with_seed(3).fit(&data).unwrap();
        let labels = model.transform(&data);
        assert_ne!(labels[0], labels[1]);
        assert!(labels.iter().step_by(2).all(|&l| l == labels[0]));
        let mut xs: Vec<f64> = model.centers().iter().map(|c| c.x).collect();
        xs.sort_by(f64::total_cmp);
        assert!((xs[0] - 0.45).abs() < 1e-9);
        assert!((xs[1] - 100.45).abs() < 1e-9);
    }

    #[test]
    fn inertia_history_is_non_increasing() {
        let data = two_blobs();
        let model = KMeans::new(2)
            .with_init(KMeansInit::Uniform)
            .with_seed(11)
            .fit(&data)
            .unwrap();
        assert!(!model.inertias().is_empty());
        for pair in model.inertias().windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9);
        }
    }

    #[test]
    fn placement_only_keeps_data_points_as_centres() {
        let data = two_blobs();
        let estimator = KMeans::new(3).with_init(KMeansInit::Uniform).with_max_iter(0);
        let placed = estimator.fit(&data).unwrap();
        assert!(placed.inertias().is_empty());
        assert!(placed.centers().iter().all(|c| data.contains(c)));
        let refined = estimator.with_max_iter(100).fit_from(&data, placed.centers().to_vec()).unwrap();
        assert_eq!(refined.n_clusters(), 3);
    }

    #[test]
    fn same_seed_gives_same_centres() {
        let data = two_blobs();
        let a = KMeans::new(2).with_seed(5).initial_centers(&data).unwrap();
        let b = KMeans::new(2).with_seed(5).initial_centers(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_many_clusters_is_an_error() {
        let data = vec![Point3::origin()];
        assert!(matches!(KMeans::new(2).fit(&data), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_points_still_get_enough_centres() {
        let data = vec![Point3::new(1.0, 1.0, 1.0); 4];
        let centers = KMeans::new(3).initial_centers(&data).unwrap();
        assert_eq!(centers.len(), 3);
    }

    #[test]
    fn discretize_labels_each_trajectory() {
        let blobs = two_blobs();
        let trajectories = vec![blobs[..6].to_vec(), blobs[6..].to_vec()];
        let (model, dtrajs) = discretize(&trajectories, &KMeans::new(2)).unwrap();
        assert_eq!(model.n_clusters(), 2);
        assert_eq!(dtrajs[0].len(), 6);
        assert_eq!(dtrajs[1].len(), 14);
        assert_ne!(dtrajs[0][0], dtrajs[0][1]);
    }

    #[test]
    fn wcss_reports_mean_and_spread() {
        let model = KMeansModel::from_centers(vec![Point3::origin()]);
        let data = vec![Point3::new(1.0, 0.0, 0.0), Point3::new(3.0, 0.0, 0.0)];
        let (mean, std) = wcss(&data, &model).unwrap();
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 4.0).abs() < 1e-12);
        assert!(wcss(&[], &model).is_none());
    }
}
