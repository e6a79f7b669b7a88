use crate::engine::clustering::KMeansInit;
use crate::engine::diffusion::FitWindow;
use nalgebra::{Matrix3, Vector3};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

fn positive(parameter: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            parameter,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn nonzero(parameter: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidValue {
            parameter,
            reason: "must be at least 1".into(),
        })
    } else {
        Ok(value)
    }
}

// ---- Diffusion ----

#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionConfig {
    /// Directory holding the `assoc_<N>gL` run folders.
    pub root: PathBuf,
    pub rejected_frames: i64,
    pub solute_index: u32,
    pub fit_window: FitWindow,
    pub output_file: PathBuf,
    pub figures_folder: PathBuf,
}

#[derive(Default)]
pub struct DiffusionConfigBuilder {
    root: Option<PathBuf>,
    rejected_frames: Option<i64>,
    solute_index: Option<u32>,
    fit_start: Option<isize>,
    fit_end: Option<isize>,
    output_file: Option<PathBuf>,
    figures_folder: Option<PathBuf>,
}

impl DiffusionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, path: PathBuf) -> Self {
        self.root = Some(path);
        self
    }
    pub fn rejected_frames(mut self, frames: i64) -> Self {
        self.rejected_frames = Some(frames);
        self
    }
    pub fn solute_index(mut self, index: u32) -> Self {
        self.solute_index = Some(index);
        self
    }
    pub fn fit_start(mut self, start: isize) -> Self {
        self.fit_start = Some(start);
        self
    }
    pub fn fit_end(mut self, end: isize) -> Self {
        self.fit_end = Some(end);
        self
    }
    pub fn output_file(mut self, path: PathBuf) -> Self {
        self.output_file = Some(path);
        self
    }
    pub fn figures_folder(mut self, path: PathBuf) -> Self {
        self.figures_folder = Some(path);
        self
    }

    pub fn build(self) -> Result<DiffusionConfig, ConfigError> {
        let rejected_frames = self.rejected_frames.unwrap_or(10);
        if rejected_frames < 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "rejected_frames",
                reason: "must not be negative".into(),
            });
        }
        Ok(DiffusionConfig {
            root: self.root.ok_or(ConfigError::MissingParameter("root"))?,
            rejected_frames,
            solute_index: self.solute_index.unwrap_or(1),
            fit_window: FitWindow::new(self.fit_start.unwrap_or(0), self.fit_end.unwrap_or(-1)),
            output_file: self
                .output_file
                .unwrap_or_else(|| PathBuf::from("diff_coeff.txt")),
            figures_folder: self
                .figures_folder
                .unwrap_or_else(|| PathBuf::from("images_diff")),
        })
    }
}

// ---- Encounter extraction and frame alignment ----

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterConfig {
    pub sda_input: PathBuf,
    pub protein_pdb: PathBuf,
    pub ligand_pdb: PathBuf,
    /// Protein-ligand centre distance above which the buffered frames are dropped.
    pub cutoff: f64,
    /// Directory the `folder_<ftrajectories>*` outputs are created in.
    pub workdir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub sda_input: PathBuf,
    pub workdir: PathBuf,
    /// Ligand structure for the ligand-centre tool; unused by plain alignment.
    pub ligand_pdb: Option<PathBuf>,
    pub protein_pdb: Option<PathBuf>,
}

// ---- Clustering and MSM ----

#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub num_clusters: usize,
    pub init: KMeansInit,
    pub seed: u64,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsmConfig {
    pub folder_xyz: PathBuf,
    pub output_folder: PathBuf,
    /// Only files whose name contains this text are loaded.
    pub file_filter: String,
    pub clustering: ClusteringConfig,
    pub lagtime: usize,
    pub reversible: bool,
    pub allow_disconnected: bool,
}

#[derive(Default)]
pub struct MsmConfigBuilder {
    folder_xyz: Option<PathBuf>,
    output_folder: Option<PathBuf>,
    file_filter: Option<String>,
    num_clusters: Option<usize>,
    init: Option<KMeansInit>,
    seed: Option<u64>,
    max_iterations: Option<usize>,
    lagtime: Option<usize>,
    reversible: Option<bool>,
    allow_disconnected: Option<bool>,
}

impl MsmConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder_xyz(mut self, path: PathBuf) -> Self {
        self.folder_xyz = Some(path);
        self
    }
    pub fn output_folder(mut self, path: PathBuf) -> Self {
        self.output_folder = Some(path);
        self
    }
    pub fn file_filter(mut self, filter: impl Into<String>) -> Self {
        self.file_filter = Some(filter.into());
        self
    }
    pub fn num_clusters(mut self, n: usize) -> Self {
        self.num_clusters = Some(n);
        self
    }
    pub fn init(mut self, init: KMeansInit) -> Self {
        self.init = Some(init);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }
    pub fn lagtime(mut self, lag: usize) -> Self {
        self.lagtime = Some(lag);
        self
    }
    pub fn reversible(mut self, flag: bool) -> Self {
        self.reversible = Some(flag);
        self
    }
    pub fn allow_disconnected(mut self, flag: bool) -> Self {
        self.allow_disconnected = Some(flag);
        self
    }

    pub fn build(self) -> Result<MsmConfig, ConfigError> {
        Ok(MsmConfig {
            folder_xyz: self.folder_xyz.ok_or(ConfigError::MissingParameter("folder_xyz"))?,
            output_folder: self
                .output_folder
                .ok_or(ConfigError::MissingParameter("output_folder"))?,
            file_filter: self.file_filter.unwrap_or_else(|| "trajectories_1".to_string()),
            clustering: ClusteringConfig {
                num_clusters: nonzero(
                    "num_clusters",
                    self.num_clusters
                        .ok_or(ConfigError::MissingParameter("num_clusters"))?,
                )?,
                init: self.init.unwrap_or(KMeansInit::KMeansPlusPlus),
                seed: self.seed.unwrap_or(13),
                max_iterations: self.max_iterations.unwrap_or(500),
            },
            lagtime: nonzero("lagtime", self.lagtime.unwrap_or(1))?,
            reversible: self.reversible.unwrap_or(false),
            allow_disconnected: self.allow_disconnected.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Prefix of the `<prefix>_<n>_xyz` input folders.
    pub folder_prefix: PathBuf,
    pub encounter_runs: Vec<u32>,
    pub output_folder: PathBuf,
    pub clustering: ClusteringConfig,
    /// The WCSS sweep covers `1..=max_clusters`.
    pub max_clusters: usize,
    pub lagtimes: Vec<usize>,
    pub metastable_sets: usize,
}

#[derive(Default)]
pub struct ValidationConfigBuilder {
    folder_prefix: Option<PathBuf>,
    encounter_runs: Option<Vec<u32>>,
    output_folder: Option<PathBuf>,
    num_clusters: Option<usize>,
    seed: Option<u64>,
    max_iterations: Option<usize>,
    max_clusters: Option<usize>,
    lagtimes: Option<Vec<usize>>,
    metastable_sets: Option<usize>,
}

impl ValidationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder_prefix(mut self, prefix: PathBuf) -> Self {
        self.folder_prefix = Some(prefix);
        self
    }
    pub fn encounter_runs(mut self, runs: Vec<u32>) -> Self {
        self.encounter_runs = Some(runs);
        self
    }
    pub fn output_folder(mut self, path: PathBuf) -> Self {
        self.output_folder = Some(path);
        self
    }
    pub fn num_clusters(mut self, n: usize) -> Self {
        self.num_clusters = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }
    pub fn max_clusters(mut self, n: usize) -> Self {
        self.max_clusters = Some(n);
        self
    }
    pub fn lagtimes(mut self, lags: Vec<usize>) -> Self {
        self.lagtimes = Some(lags);
        self
    }
    pub fn metastable_sets(mut self, n: usize) -> Self {
        self.metastable_sets = Some(n);
        self
    }

    pub fn build(self) -> Result<ValidationConfig, ConfigError> {
        let encounter_runs = self
            .encounter_runs
            .ok_or(ConfigError::MissingParameter("encounter_runs"))?;
        if encounter_runs.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "encounter_runs",
                reason: "at least one run is required".into(),
            });
        }
        let lagtimes = self.lagtimes.unwrap_or_else(|| (1..=7).collect());
        if lagtimes.is_empty() || lagtimes.contains(&0) {
            return Err(ConfigError::InvalidValue {
                parameter: "lagtimes",
                reason: "must be a non-empty list of positive lag times".into(),
            });
        }
        Ok(ValidationConfig {
            folder_prefix: self
                .folder_prefix
                .ok_or(ConfigError::MissingParameter("folder_prefix"))?,
            encounter_runs,
            output_folder: self
                .output_folder
                .ok_or(ConfigError::MissingParameter("output_folder"))?,
            clustering: ClusteringConfig {
                num_clusters: nonzero("num_clusters", self.num_clusters.unwrap_or(6))?,
                init: KMeansInit::Uniform,
                seed: self.seed.unwrap_or(1),
                max_iterations: self.max_iterations.unwrap_or(50_000),
            },
            max_clusters: nonzero("max_clusters", self.max_clusters.unwrap_or(19))?,
            lagtimes,
            metastable_sets: nonzero("metastable_sets", self.metastable_sets.unwrap_or(6))?,
        })
    }
}

// ---- Crowder contacts and reaction distances ----

#[derive(Debug, Clone, PartialEq)]
pub struct ContactsConfig {
    pub sda_input: PathBuf,
    pub trajectory: PathBuf,
    pub molecule_pdb: PathBuf,
    pub crowder_pdb: PathBuf,
    /// Solute number of the monitored molecule in the trajectory.
    pub molecule_solute: u32,
    /// Centre distance below which atom contacts are evaluated.
    pub prescreen_distance: f64,
    pub contact_distance: f64,
    pub output_folder: PathBuf,
}

#[derive(Default)]
pub struct ContactsConfigBuilder {
    sda_input: Option<PathBuf>,
    trajectory: Option<PathBuf>,
    molecule_pdb: Option<PathBuf>,
    crowder_pdb: Option<PathBuf>,
    molecule_solute: Option<u32>,
    prescreen_distance: Option<f64>,
    contact_distance: Option<f64>,
    output_folder: Option<PathBuf>,
}

impl ContactsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sda_input(mut self, path: PathBuf) -> Self {
        self.sda_input = Some(path);
        self
    }
    pub fn trajectory(mut self, path: PathBuf) -> Self {
        self.trajectory = Some(path);
        self
    }
    pub fn molecule_pdb(mut self, path: PathBuf) -> Self {
        self.molecule_pdb = Some(path);
        self
    }
    pub fn crowder_pdb(mut self, path: PathBuf) -> Self {
        self.crowder_pdb = Some(path);
        self
    }
    pub fn molecule_solute(mut self, solute: u32) -> Self {
        self.molecule_solute = Some(solute);
        self
    }
    pub fn prescreen_distance(mut self, distance: f64) -> Self {
        self.prescreen_distance = Some(distance);
        self
    }
    pub fn contact_distance(mut self, distance: f64) -> Self {
        self.contact_distance = Some(distance);
        self
    }
    pub fn output_folder(mut self, path: PathBuf) -> Self {
        self.output_folder = Some(path);
        self
    }

    pub fn build(self) -> Result<ContactsConfig, ConfigError> {
        Ok(ContactsConfig {
            sda_input: self.sda_input.ok_or(ConfigError::MissingParameter("sda_input"))?,
            trajectory: self.trajectory.ok_or(ConfigError::MissingParameter("trajectory"))?,
            molecule_pdb: self
                .molecule_pdb
                .ok_or(ConfigError::MissingParameter("molecule_pdb"))?,
            crowder_pdb: self
                .crowder_pdb
                .ok_or(ConfigError::MissingParameter("crowder_pdb"))?,
            molecule_solute: self
                .molecule_solute
                .ok_or(ConfigError::MissingParameter("molecule_solute"))?,
            prescreen_distance: positive(
                "prescreen_distance",
                self.prescreen_distance
                    .ok_or(ConfigError::MissingParameter("prescreen_distance"))?,
            )?,
            contact_distance: positive(
                "contact_distance",
                self.contact_distance
                    .ok_or(ConfigError::MissingParameter("contact_distance"))?,
            )?,
            output_folder: self
                .output_folder
                .ok_or(ConfigError::MissingParameter("output_folder"))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionConfig {
    pub sda_input: PathBuf,
    pub trajectory: PathBuf,
    pub reaction_file: PathBuf,
    /// Protein structure, PQR or PDB.
    pub protein: PathBuf,
    pub output_folder: PathBuf,
    pub bins: usize,
}

// ---- Complex construction ----

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    pub first_molecule: PathBuf,
    pub second_molecule: PathBuf,
    pub max_bounded: usize,
    pub num_replica: usize,
    pub step: f64,
    pub clash_threshold: f64,
    pub seed: Option<u64>,
    /// Keep each molecule's chains (renamed on conflict) instead of merging into chain A.
    pub keep_chains: bool,
    pub output_root: PathBuf,
}

#[derive(Default)]
pub struct AssemblyConfigBuilder {
    first_molecule: Option<PathBuf>,
    second_molecule: Option<PathBuf>,
    max_bounded: Option<usize>,
    num_replica: Option<usize>,
    step: Option<f64>,
    clash_threshold: Option<f64>,
    seed: Option<u64>,
    keep_chains: bool,
    output_root: Option<PathBuf>,
}

impl AssemblyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_molecule(mut self, path: PathBuf) -> Self {
        self.first_molecule = Some(path);
        self
    }
    pub fn second_molecule(mut self, path: PathBuf) -> Self {
        self.second_molecule = Some(path);
        self
    }
    pub fn max_bounded(mut self, n: usize) -> Self {
        self.max_bounded = Some(n);
        self
    }
    pub fn num_replica(mut self, n: usize) -> Self {
        self.num_replica = Some(n);
        self
    }
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }
    pub fn clash_threshold(mut self, threshold: f64) -> Self {
        self.clash_threshold = Some(threshold);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn keep_chains(mut self, flag: bool) -> Self {
        self.keep_chains = flag;
        self
    }
    pub fn output_root(mut self, path: PathBuf) -> Self {
        self.output_root = Some(path);
        self
    }

    pub fn build(self) -> Result<AssemblyConfig, ConfigError> {
        Ok(AssemblyConfig {
            first_molecule: self
                .first_molecule
                .ok_or(ConfigError::MissingParameter("first_molecule"))?,
            second_molecule: self
                .second_molecule
                .ok_or(ConfigError::MissingParameter("second_molecule"))?,
            max_bounded: self.max_bounded.ok_or(ConfigError::MissingParameter("max_bounded"))?,
            num_replica: self.num_replica.ok_or(ConfigError::MissingParameter("num_replica"))?,
            step: positive("step", self.step.unwrap_or(1.0))?,
            clash_threshold: positive("clash_threshold", self.clash_threshold.unwrap_or(1.5))?,
            seed: self.seed,
            keep_chains: self.keep_chains,
            output_root: self.output_root.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HydroConfig {
    pub folder: PathBuf,
    pub max_bounded: usize,
    pub d_zero: f64,
    pub output_prefix: PathBuf,
}

// ---- Structure transform ----

#[derive(Debug, Clone, PartialEq)]
pub enum RotationSpec {
    None,
    /// Row-major 3x3 matrix.
    Matrix(Matrix3<f64>),
    /// Extrinsic x-y-z angles in degrees.
    EulerXyzDegrees(Vector3<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target_com: Vector3<f64>,
    pub rotation: RotationSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffusion_builder_applies_defaults() {
        let config = DiffusionConfigBuilder::new().root(PathBuf::from("runs")).build().unwrap();
        assert_eq!(config.rejected_frames, 10);
        assert_eq!(config.solute_index, 1);
        assert_eq!(config.fit_window, FitWindow::new(0, -1));
        assert_eq!(config.output_file, PathBuf::from("diff_coeff.txt"));
    }

    #[test]
    fn diffusion_builder_requires_root() {
        let err = DiffusionConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("root"));
    }

    #[test]
    fn msm_builder_requires_cluster_count() {
        let err = MsmConfigBuilder::new()
            .folder_xyz("xyz".into())
            .output_folder("msm".into())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("num_clusters"));

        let config = MsmConfigBuilder::new()
            .folder_xyz("xyz".into())
            .output_folder("msm".into())
            .num_clusters(4)
            .build()
            .unwrap();
        assert_eq!(config.clustering.seed, 13);
        assert_eq!(config.clustering.max_iterations, 500);
        assert_eq!(config.clustering.init, KMeansInit::KMeansPlusPlus);
        assert_eq!(config.file_filter, "trajectories_1");
        assert!(!config.reversible);
    }

    #[test]
    fn zero_lagtime_is_rejected() {
        let err = MsmConfigBuilder::new()
            .folder_xyz("xyz".into())
            .output_folder("msm".into())
            .num_clusters(4)
            .lagtime(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { parameter: "lagtime", .. }));
    }

    #[test]
    fn validation_builder_defaults_follow_uniform_clustering() {
        let config = ValidationConfigBuilder::new()
            .folder_prefix("folder_trajectories".into())
            .encounter_runs(vec![3, 6])
            .output_folder("validate".into())
            .build()
            .unwrap();
        assert_eq!(config.clustering.init, KMeansInit::Uniform);
        assert_eq!(config.clustering.num_clusters, 6);
        assert_eq!(config.lagtimes, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(config.max_clusters, 19);
        assert_eq!(config.metastable_sets, 6);
    }

    #[test]
    fn contact_distances_must_be_positive() {
        let err = ContactsConfigBuilder::new()
            .sda_input("sda.in".into())
            .trajectory("trajectories_1".into())
            .molecule_pdb("p2.pdb".into())
            .crowder_pdb("crowder.pdb".into())
            .molecule_solute(2)
            .prescreen_distance(30.0)
            .contact_distance(-1.0)
            .output_folder("out".into())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "contact_distance",
                ..
            }
        ));
    }

    #[test]
    fn assembly_builder_uses_unit_step_and_clash_threshold() {
        let config = AssemblyConfigBuilder::new()
            .first_molecule("a.pdb".into())
            .second_molecule("b.pdb".into())
            .max_bounded(3)
            .num_replica(2)
            .build()
            .unwrap();
        assert_eq!(config.step, 1.0);
        assert_eq!(config.clash_threshold, 1.5);
        assert_eq!(config.seed, None);
    }
}
