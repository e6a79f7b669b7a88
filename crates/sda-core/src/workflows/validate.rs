use super::msm::load_tracks;
use super::{check_figure, recreate_dir};
use crate::core::io::figures::{self, CkPanel, Labels, Series};
use crate::core::io::table::{self, float_repr};
use crate::engine::clustering::{KMeans, discretize};
use crate::engine::config::ValidationConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::validation::{
    CkSet, ImpliedTimescales, WcssPoint, chapman_kolmogorov, implied_timescales, models_over_lags, wcss_sweep,
};
use nalgebra::Point3;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub wcss: Vec<WcssPoint>,
    pub timescales: Vec<ImpliedTimescales>,
    pub ck_sets: Vec<CkSet>,
    pub output_folder: PathBuf,
}

/// Checks the clustering and lag-time choices of an MSM over several encounter runs.
///
/// Writes `wcss_analysis`, `implied_timescales` and `ck_test`, each as an SVG
/// figure and a `.txt` table, into the output folder.
#[instrument(skip_all, name = "msm_validation_workflow")]
pub fn run(config: &ValidationConfig, reporter: &ProgressReporter) -> Result<ValidationResult, EngineError> {
    // === Phase 1: Load ligand tracks of every run ===
    let data = reporter.phase("Loading tracks", || -> Result<Vec<Vec<Point3<f64>>>, EngineError> {
        let mut tracks = Vec::new();
        for &run in &config.encounter_runs {
            let folder = run_folder(&config.folder_prefix, run);
            let loaded = load_tracks(&folder, "")?;
            info!("Run {}: {} tracks from {}.", run, loaded.len(), folder.display());
            tracks.extend(loaded);
        }
        Ok(tracks)
    })?;
    recreate_dir(&config.output_folder)?;

    // === Phase 2: WCSS over the number of clusters ===
    let estimator = KMeans::from(&config.clustering);
    let pooled: Vec<Point3<f64>> = data.iter().flatten().copied().collect();
    let wcss = reporter.phase("WCSS sweep", || wcss_sweep(&pooled, &estimator, config.max_clusters))?;
    write_wcss(&config.output_folder, &wcss)?;

    // === Phase 3: Implied timescales ===
    let (_, dtrajs) = reporter.phase("Clustering", || discretize(&data, &estimator))?;
    let models = reporter.phase("Estimating models", || {
        models_over_lags(&dtrajs, config.clustering.num_clusters, &config.lagtimes)
    })?;
    let timescales = implied_timescales(&models, config.clustering.num_clusters.saturating_sub(1));
    write_timescales(&config.output_folder, &timescales)?;

    // === Phase 4: Chapman-Kolmogorov test ===
    let ck_sets = reporter.phase("Chapman-Kolmogorov test", || {
        chapman_kolmogorov(&models, config.metastable_sets)
    })?;
    write_ck(&config.output_folder, &ck_sets)?;

    info!("Validation results written to {}.", config.output_folder.display());
    Ok(ValidationResult {
        wcss,
        timescales,
        ck_sets,
        output_folder: config.output_folder.clone(),
    })
}

/// `<prefix>_<run>_xyz`
fn run_folder(prefix: &Path, run: u32) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!("_{}_xyz", run));
    PathBuf::from(name)
}

fn write_table(path: &Path, rows: Vec<Vec<String>>) -> Result<(), EngineError> {
    table::write_rows_to_path(path, rows).map_err(|e| EngineError::format(path, e))
}

fn write_wcss(folder: &Path, wcss: &[WcssPoint]) -> Result<(), EngineError> {
    write_table(
        &folder.join("wcss_analysis.txt"),
        wcss.iter()
            .map(|p| vec![p.clusters.to_string(), float_repr(p.mean), float_repr(p.std)])
            .collect(),
    )?;
    let points: Vec<(f64, f64, f64)> = wcss.iter().map(|p| (p.clusters as f64, p.mean, p.std)).collect();
    let figure = folder.join("wcss_analysis.svg");
    check_figure(
        &figure,
        figures::error_bars(
            &figure,
            Labels {
                title: "Within-cluster sum of squares",
                x: "Number of clusters",
                y: "WCSS [Ang^2]",
            },
            &points,
        ),
    )
}

fn write_timescales(folder: &Path, timescales: &[ImpliedTimescales]) -> Result<(), EngineError> {
    write_table(
        &folder.join("implied_timescales.txt"),
        timescales
            .iter()
            .map(|its| {
                std::iter::once(its.lag.to_string())
                    .chain(its.timescales.iter().map(|t| float_repr(*t)))
                    .collect()
            })
            .collect(),
    )?;

    let count = timescales.first().map_or(0, |its| its.timescales.len());
    let series: Vec<Series> = (0..count)
        .map(|k| Series {
            label: format!("process {}", k + 1),
            points: timescales
                .iter()
                .map(|its| (its.lag as f64, its.timescales[k]))
                .collect(),
        })
        .collect();
    let figure = folder.join("implied_timescales.svg");
    check_figure(
        &figure,
        figures::multi_line(
            &figure,
            Labels {
                title: "Implied timescales",
                x: "lag time [steps]",
                y: "timescale [steps]",
            },
            &series,
        ),
    )
}

fn write_ck(folder: &Path, sets: &[CkSet]) -> Result<(), EngineError> {
    let mut rows = Vec::new();
    for set in sets {
        for (&(lag, predicted), &(_, estimated)) in set.predicted.iter().zip(&set.estimated) {
            rows.push(vec![
                set.set.to_string(),
                lag.to_string(),
                float_repr(predicted),
                float_repr(estimated),
            ]);
        }
    }
    write_table(&folder.join("ck_test.txt"), rows)?;

    let as_f64 = |points: &[(usize, f64)]| points.iter().map(|&(lag, p)| (lag as f64, p)).collect();
    let panels: Vec<CkPanel> = sets
        .iter()
        .map(|set| CkPanel {
            set: set.set,
            predicted: as_f64(&set.predicted),
            estimated: as_f64(&set.estimated),
        })
        .collect();
    let figure = folder.join("ck_test.svg");
    check_figure(&figure, figures::ck_grid(&figure, "lag time [steps]", &panels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::xyz::write_points_to_path;
    use crate::engine::config::ValidationConfigBuilder;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::fs;
    use tempfile::tempdir;

    fn two_well_track(seed: u64, len: usize) -> Vec<Point3<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut well = 0.0;
        (0..len)
            .map(|_| {
                if rng.gen_bool(0.05) {
                    well = 30.0 - well;
                }
                Point3::new(well + rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0)
            })
            .collect()
    }

    #[test]
    fn run_folder_appends_run_suffix() {
        assert_eq!(
            run_folder(Path::new("work/folder_traj"), 3),
            PathBuf::from("work/folder_traj_3_xyz")
        );
    }

    #[test]
    fn writes_all_three_analyses() {
        let dir = tempdir().unwrap();
        for run in [1u32, 2] {
            let folder = dir.path().join(format!("folder_traj_{}_xyz", run));
            fs::create_dir(&folder).unwrap();
            for n in 1..=2u64 {
                let track = two_well_track(u64::from(run) * 10 + n, 300);
                write_points_to_path(&track, folder.join(format!("traj_{}_{}_xyz", run, n))).unwrap();
            }
        }
        let out = dir.path().join("validate");
        let config = ValidationConfigBuilder::new()
            .folder_prefix(dir.path().join("folder_traj"))
            .encounter_runs(vec![1, 2])
            .output_folder(out.clone())
            .num_clusters(2)
            .max_clusters(3)
            .lagtimes(vec![1, 2, 3])
            .metastable_sets(2)
            .build()
            .unwrap();

        let result = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.wcss.len(), 3);
        assert!(result.wcss[1].mean < result.wcss[0].mean);
        assert_eq!(result.timescales.len(), 3);
        assert_eq!(result.timescales[0].timescales.len(), 1);
        assert_eq!(result.ck_sets.len(), 2);

        let its = fs::read_to_string(out.join("implied_timescales.txt")).unwrap();
        assert_eq!(its.lines().count(), 3);
        assert!(its.starts_with("1 "));
        // Lag 0 plus one entry per lag time, for each set.
        let ck = fs::read_to_string(out.join("ck_test.txt")).unwrap();
        assert_eq!(ck.lines().count(), 2 * 4);
        for name in ["wcss_analysis.svg", "implied_timescales.svg", "ck_test.svg", "wcss_analysis.txt"] {
            assert!(out.join(name).exists(), "{} missing", name);
        }
    }

    #[test]
    fn missing_run_folder_is_an_error() {
        let dir = tempdir().unwrap();
        let config = ValidationConfigBuilder::new()
            .folder_prefix(dir.path().join("folder_traj"))
            .encounter_runs(vec![1])
            .output_folder(dir.path().join("validate"))
            .build()
            .unwrap();
        assert!(run(&config, &ProgressReporter::new()).is_err());
    }
}
