use super::{check_figure, files_containing, recreate_dir};
use crate::core::io::figures::{self, Labels, Network};
use crate::core::io::pdb::write_pseudo_atoms_to_path;
use crate::core::io::xyz::read_points_from_path;
use crate::engine::clustering::{KMeans, KMeansModel, discretize};
use crate::engine::config::MsmConfig;
use crate::engine::error::EngineError;
use crate::engine::msm::{CountMode, MarkovStateModel, MsmOptions, TransitionCounts, write_mfpt, write_rates};
use crate::engine::progress::{Progress, ProgressReporter};
use itertools::Itertools;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Transitions at or below this probability are left out of the network figure.
const NETWORK_EDGE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct MsmResult {
    pub model: MarkovStateModel,
    pub clustering: KMeansModel,
    pub trajectories: usize,
    pub frames: usize,
    pub output_folder: PathBuf,
}

/// Clusters the ligand tracks, estimates a maximum-likelihood MSM and writes its reports.
#[instrument(skip_all, name = "msm_build_workflow")]
pub fn run(config: &MsmConfig, reporter: &ProgressReporter) -> Result<MsmResult, EngineError> {
    info!(
        "Building MSM: {} clusters ({}), lag {}, reversible = {}, allow_disconnected = {}.",
        config.clustering.num_clusters,
        config.clustering.init,
        config.lagtime,
        config.reversible,
        config.allow_disconnected
    );

    // === Phase 1: Load ligand tracks ===
    let data = reporter.phase("Loading tracks", || load_tracks(&config.folder_xyz, &config.file_filter))?;
    let frames: usize = data.iter().map(Vec::len).sum();
    info!("Loaded {} tracks with {} frames.", data.len(), frames);

    // === Phase 2: Clustering ===
    let estimator = KMeans::from(&config.clustering);
    let (clustering, dtrajs) = reporter.phase("Clustering", || discretize(&data, &estimator))?;
    recreate_dir(&config.output_folder)?;
    write_clusters(&config.output_folder, &clustering)?;

    // === Phase 3: Markov state model ===
    reporter.report(Progress::PhaseStart {
        name: "Estimating MSM",
    });
    let counts = TransitionCounts::estimate(&dtrajs, clustering.n_clusters(), config.lagtime, CountMode::Sliding)?;
    let model = MarkovStateModel::estimate(
        &counts,
        MsmOptions {
            reversible: config.reversible,
            allow_disconnected: config.allow_disconnected,
        },
    )?;
    reporter.report(Progress::PhaseFinish);
    if !config.allow_disconnected && model.n_states() != config.clustering.num_clusters {
        return Err(EngineError::DisconnectedStates {
            found: model.n_states(),
            expected: config.clustering.num_clusters,
        });
    }

    // === Phase 4: Reports ===
    reporter.phase("Writing reports", || write_reports(&config.output_folder, &model, &clustering))?;

    info!("MSM with {} states written to {}.", model.n_states(), config.output_folder.display());
    Ok(MsmResult {
        model,
        clustering,
        trajectories: data.len(),
        frames,
        output_folder: config.output_folder.clone(),
    })
}

/// Every point file in `folder` whose name contains `filter`, in file-name order.
pub fn load_tracks(folder: &Path, filter: &str) -> Result<Vec<Vec<Point3<f64>>>, EngineError> {
    let files = files_containing(folder, filter)?;
    if files.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "no files matching '{}' in {}",
            filter,
            folder.display()
        )));
    }
    files
        .iter()
        .map(|file| -> Result<Vec<Point3<f64>>, EngineError> {
            let points = read_points_from_path(file).map_err(|e| EngineError::format(file, e))?;
            debug!(file = %file.display(), frames = points.len(), "Track loaded");
            Ok(points)
        })
        .collect()
}

fn write_clusters(folder: &Path, clustering: &KMeansModel) -> Result<(), EngineError> {
    for (i, center) in clustering.centers().iter().enumerate() {
        write_pseudo_atoms_to_path(std::slice::from_ref(center), folder.join(format!("cluster_{}.pdb", i)))?;
    }
    let inertias: Vec<(f64, f64)> = clustering
        .inertias()
        .iter()
        .enumerate()
        .map(|(i, &inertia)| ((i + 1) as f64, inertia))
        .collect();
    let figure = folder.join("inertia_kmean_clust.svg");
    check_figure(
        &figure,
        figures::log_log_line(
            &figure,
            Labels {
                title: "KMeans inertia during training",
                x: "iteration",
                y: "inertia",
            },
            &inertias,
        ),
    )
}

fn write_reports(folder: &Path, model: &MarkovStateModel, clustering: &KMeansModel) -> Result<(), EngineError> {
    let mut rates = BufWriter::new(File::create(folder.join("msm_rates"))?);
    write_rates(model, &mut rates)?;
    rates.flush()?;

    let mut mfpt = BufWriter::new(File::create(folder.join("msm_mfpt"))?);
    write_mfpt(model, &mut mfpt)?;
    mfpt.flush()?;

    let figure = folder.join("msm_network.svg");
    check_figure(
        &figure,
        figures::network(
            &figure,
            Labels {
                title: "Markov state model",
                x: "x [Ang]",
                y: "y [Ang]",
            },
            &transition_network(model, clustering),
        ),
    )
}

/// States placed at their cluster centres' x/y, sized by stationary weight.
fn transition_network(model: &MarkovStateModel, clustering: &KMeansModel) -> Network {
    let nodes = model
        .active_set()
        .iter()
        .map(|&state| {
            let c = clustering.centers()[state];
            (c.x, c.y)
        })
        .collect();
    let pi = model.stationary_distribution();
    let max_weight = pi.max();
    let weights = pi
        .iter()
        .map(|&w| if max_weight > 0.0 { w / max_weight } else { 0.0 })
        .collect();
    let t = model.transition_matrix();
    let edges = (0..model.n_states())
        .cartesian_product(0..model.n_states())
        .filter(|&(i, j)| i != j && t[(i, j)] > NETWORK_EDGE_THRESHOLD)
        .map(|(i, j)| (i, j, t[(i, j)]))
        .collect();
    Network { nodes, weights, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::xyz::write_points_to_path;
    use crate::engine::config::MsmConfigBuilder;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::fs;
    use tempfile::tempdir;

    /// Points hopping between two wells at x = 0 and x = 20.
    fn two_well_track(seed: u64, len: usize) -> Vec<Point3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut well = 0.0;
        (0..len)
            .map(|_| {
                if rng.gen_bool(0.1) {
                    well = 20.0 - well;
                }
                Point3::new(well + rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0)
            })
            .collect()
    }

    fn write_tracks(folder: &Path) {
        for n in 1..=3 {
            write_points_to_path(&two_well_track(n, 200), folder.join(format!("trajectories_1_{}_xyz", n))).unwrap();
        }
        // Not matched by the default filter.
        write_points_to_path(&[Point3::new(500.0, 0.0, 0.0)], folder.join("trajectories_2_1_xyz")).unwrap();
    }

    #[test]
    fn builds_two_state_model_and_reports() {
        let dir = tempdir().unwrap();
        let xyz = dir.path().join("xyz");
        fs::create_dir(&xyz).unwrap();
        write_tracks(&xyz);
        let out = dir.path().join("msm");
        let config = MsmConfigBuilder::new()
            .folder_xyz(xyz)
            .output_folder(out.clone())
            .num_clusters(2)
            .build()
            .unwrap();

        let result = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.trajectories, 3);
        assert_eq!(result.frames, 600);
        assert_eq!(result.model.n_states(), 2);
        let t = result.model.transition_matrix();
        assert!(t[(0, 0)] > 0.8 && t[(1, 1)] > 0.8);

        let rates = fs::read_to_string(out.join("msm_rates")).unwrap();
        assert!(rates.starts_with("Markov State Models transition matrix\nNumber of states = 2\nstate = 0\n"));
        let mfpt = fs::read_to_string(out.join("msm_mfpt")).unwrap();
        assert!(mfpt.contains("mfpt_0->0 = 0.0"));
        assert!(out.join("cluster_0.pdb").exists());
        assert!(out.join("cluster_1.pdb").exists());
        assert!(out.join("msm_network.svg").exists());
    }

    #[test]
    fn disconnected_states_are_reported() {
        let dir = tempdir().unwrap();
        let xyz = dir.path().join("xyz");
        fs::create_dir(&xyz).unwrap();
        // Two tracks that never visit each other's region.
        let a: Vec<Point3<f64>> = (0..50).map(|i| Point3::new((i % 2) as f64, 0.0, 0.0)).collect();
        let b: Vec<Point3<f64>> = (0..50).map(|i| Point3::new(100.0 + (i % 2) as f64, 0.0, 0.0)).collect();
        write_points_to_path(&a, xyz.join("trajectories_1_1_xyz")).unwrap();
        write_points_to_path(&b, xyz.join("trajectories_1_2_xyz")).unwrap();
        let config = MsmConfigBuilder::new()
            .folder_xyz(xyz)
            .output_folder(dir.path().join("msm"))
            .num_clusters(2)
            .build()
            .unwrap();
        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(EngineError::DisconnectedStates { found: 1, expected: 2 })
        ));
    }

    #[test]
    fn missing_tracks_are_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(load_tracks(dir.path(), "trajectories_1"), Err(EngineError::InvalidInput(_))));
    }
}
