use super::{check_figure, files_containing, load_sda_input};
use crate::core::io::figures::{self, Labels};
use crate::core::io::sda_input::crowd_input_path;
use crate::core::io::table::{self, float_repr};
use crate::core::io::trajectory::{Trajectory, TrajectoryLayout};
use crate::engine::config::DiffusionConfig;
use crate::engine::diffusion::{MsdAccumulator, density_label, diffusion_coefficient, lag_times, solute_positions};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::unwrap::unwrap_positions;
use nalgebra::Point3;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const FIGURE_NAME: &str = "diff_coeff_vs_dens.svg";

#[derive(Debug, Clone, PartialEq)]
pub struct DensityCoefficient {
    /// Crowder density in g/L.
    pub density: i64,
    /// Diffusion coefficient in Å²/ps.
    pub coefficient: f64,
    pub trajectories: usize,
}

#[derive(Debug, Clone)]
pub struct DiffusionResult {
    /// Sorted by density.
    pub coefficients: Vec<DensityCoefficient>,
    pub output_file: PathBuf,
    pub figure: PathBuf,
}

/// One unwrapped trajectory and the time between its printed frames.
struct LoadedRun {
    unwrapped: Vec<Point3<f64>>,
    frame_time: f64,
    dt: f64,
    freq_print: i64,
}

#[instrument(skip_all, name = "diffusion_workflow")]
pub fn run(config: &DiffusionConfig, reporter: &ProgressReporter) -> Result<DiffusionResult, EngineError> {
    // === Phase 1: Locate density folders ===
    let folders = reporter.phase("Scanning runs", || density_folders(&config.root))?;
    if folders.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "no assoc_<N>gL folders in {}",
            config.root.display()
        )));
    }
    info!("Found {} density folder(s).", folders.len());

    // === Phase 2: Mean squared displacement and fit per density ===
    reporter.report(Progress::PhaseStart {
        name: "Fitting diffusion coefficients",
    });
    reporter.report(Progress::TaskStart {
        total_steps: folders.len() as u64,
    });
    let mut coefficients = Vec::with_capacity(folders.len());
    for (density, folder) in &folders {
        if let Some(point) = fit_folder(*density, folder, config)? {
            info!("Diffusion coefficient at {} g/L: {:.4}", density, point.coefficient);
            coefficients.push(point);
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Write table and figure ===
    reporter.report(Progress::PhaseStart { name: "Writing results" });
    table::write_rows_to_path(
        &config.output_file,
        coefficients
            .iter()
            .map(|c| vec![c.density.to_string(), float_repr(c.coefficient)]),
    )
    .map_err(|e| EngineError::format(&config.output_file, e))?;

    fs::create_dir_all(&config.figures_folder)?;
    let figure = config.figures_folder.join(FIGURE_NAME);
    let points: Vec<(f64, f64)> = coefficients
        .iter()
        .map(|c| (c.density as f64, c.coefficient))
        .collect();
    check_figure(
        &figure,
        figures::scatter_line(
            &figure,
            Labels {
                title: "Diffusion coefficient",
                x: "Densities [g/L]",
                y: "Diffusion coefficients [Ang^2/ps]",
            },
            &points,
        ),
    )?;
    reporter.report(Progress::PhaseFinish);

    Ok(DiffusionResult {
        coefficients,
        output_file: config.output_file.clone(),
        figure,
    })
}

/// `assoc_<N>gL` sub-folders of `root`, sorted by density.
fn density_folders(root: &Path) -> Result<Vec<(i64, PathBuf)>, EngineError> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !name.contains("assoc_") {
            continue;
        }
        match density_label(&name) {
            Some(density) => folders.push((density, path)),
            None => warn!(folder = %name, "Folder name does not encode a density, skipping"),
        }
    }
    folders.sort_by_key(|(density, _)| *density);
    Ok(folders)
}

fn fit_folder(
    density: i64,
    folder: &Path,
    config: &DiffusionConfig,
) -> Result<Option<DensityCoefficient>, EngineError> {
    let files = files_containing(folder, "trajectories")?;
    if files.is_empty() {
        warn!(folder = %folder.display(), "No trajectory files, skipping density");
        return Ok(None);
    }

    #[cfg(not(feature = "parallel"))]
    let iterator = files.iter();

    #[cfg(feature = "parallel")]
    let iterator = files.par_iter();

    let runs: Vec<LoadedRun> = iterator
        .map(|file| load_run(folder, file, config))
        .collect::<Result<_, _>>()?;

    let mut accumulator = MsdAccumulator::new();
    for run in &runs {
        accumulator.add(&run.unwrapped);
    }
    let reference = &runs[0];
    if runs.iter().any(|r| r.frame_time != reference.frame_time) {
        warn!(density, "Trajectories of one density use different print intervals, using the first");
    }

    let times = lag_times(accumulator.lags(), reference.dt, reference.freq_print);
    let msd = accumulator.mean();
    debug!(density, trajectories = accumulator.trajectories(), lags = msd.len(), "MSD accumulated");
    let coefficient = diffusion_coefficient(&times, &msd, config.fit_window)?;
    Ok(Some(DensityCoefficient {
        density,
        coefficient,
        trajectories: accumulator.trajectories(),
    }))
}

fn load_run(folder: &Path, file: &Path, config: &DiffusionConfig) -> Result<LoadedRun, EngineError> {
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let input_path = crowd_input_path(folder, &file_name);
    let input = load_sda_input(&input_path)?;
    let dt = input.dt().map_err(|e| EngineError::format(&input_path, e))?;
    let freq_print = input.freq_print().map_err(|e| EngineError::format(&input_path, e))?;
    let bounds = input.bounds().map_err(|e| EngineError::format(&input_path, e))?;

    let trajectory =
        Trajectory::from_path(file, TrajectoryLayout::Frame).map_err(|e| EngineError::format(file, e))?;
    let positions = solute_positions(
        &trajectory.records,
        config.solute_index,
        config.rejected_frames * freq_print,
    );
    if positions.len() < 2 {
        warn!(file = %file.display(), frames = positions.len(), "Too few frames after equilibration");
    }
    Ok(LoadedRun {
        unwrapped: unwrap_positions(&positions, &bounds),
        frame_time: dt * freq_print as f64,
        dt,
        freq_print,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::DiffusionConfigBuilder;
    use tempfile::tempdir;

    /// Squared displacements 9, 18, 27, 36 over the first four lags: MSD = 9 t, so D = 1.5.
    const LINEAR: [(f64, f64, f64); 6] = [
        (0.0, 0.0, 0.0),
        (3.0, 0.0, 0.0),
        (3.0, 3.0, 0.0),
        (3.0, 3.0, 3.0),
        (6.0, 0.0, 0.0),
        (9.0, 0.0, 0.0),
    ];

    /// One frame per ps (`dt1 * freq_print`), solute 1 displaced from (10, 20, 30).
    fn write_run(folder: &Path, index: usize, displacements: &[(f64, f64, f64)]) {
        fs::write(
            folder.join(format!("sdamm_crowd{}.in", index)),
            "dt1 = 0.5\nfreq_print = 2\nxmin = 0\nxmax = 100\nymin = 0\nymax = 100\nzmin = 0\nzmax = 100\n",
        )
        .unwrap();
        let mut text = String::from("header\nheader\n");
        for (frame, (dx, dy, dz)) in displacements.iter().enumerate() {
            text.push_str(&format!(
                "{} 1 {} {} {} 1 0 0 0 1 0\n",
                frame * 2,
                10.0 + dx,
                20.0 + dy,
                30.0 + dz
            ));
            text.push_str(&format!("{} 2 50.0 50.0 50.0 1 0 0 0 1 0\n", frame * 2));
        }
        fs::write(folder.join(format!("trajectories{}", index)), text).unwrap();
    }

    fn config_for(root: &Path) -> DiffusionConfigBuilder {
        DiffusionConfigBuilder::new()
            .root(root.to_path_buf())
            .rejected_frames(0)
            .output_file(root.join("diff.txt"))
            .figures_folder(root.join("images"))
    }

    #[test]
    fn linear_msd_gives_exact_coefficient_per_density() {
        let root = tempdir().unwrap();
        let doubled: Vec<(f64, f64, f64)> = LINEAR.iter().map(|&(x, y, z)| (2.0 * x, 2.0 * y, 2.0 * z)).collect();
        for (name, displacements) in [("assoc_100gL", LINEAR.to_vec()), ("assoc_0gL", doubled)] {
            let folder = root.path().join(name);
            fs::create_dir(&folder).unwrap();
            write_run(&folder, 1, &displacements);
            write_run(&folder, 2, &displacements);
        }
        fs::create_dir(root.path().join("assoc_notes")).unwrap();

        let config = config_for(root.path()).build().unwrap();
        let result = run(&config, &ProgressReporter::new()).unwrap();

        let densities: Vec<i64> = result.coefficients.iter().map(|c| c.density).collect();
        assert_eq!(densities, vec![0, 100]);
        assert_eq!(result.coefficients[0].trajectories, 2);
        // Doubling every displacement quadruples the MSD slope.
        assert_eq!(result.coefficients[0].coefficient, 6.0);
        assert_eq!(result.coefficients[1].coefficient, 1.5);

        let table = fs::read_to_string(&result.output_file).unwrap();
        assert_eq!(table, "0 6.0\n100 1.5\n");
        assert!(result.figure.exists());
    }

    #[test]
    fn fit_window_selects_the_fitted_lags() {
        let root = tempdir().unwrap();
        let folder = root.path().join("assoc_50gL");
        fs::create_dir(&folder).unwrap();
        write_run(&folder, 1, &LINEAR);

        // The default window drops the last lag, where the MSD jumps from 36 to 81.
        let default = run(&config_for(root.path()).build().unwrap(), &ProgressReporter::new()).unwrap();
        assert_eq!(fs::read_to_string(&default.output_file).unwrap(), "50 1.5\n");

        // Lags 4 and 5 only: slope 45, D = 7.5.
        let tail = config_for(root.path()).fit_start(3).fit_end(isize::MAX).build().unwrap();
        let tail = run(&tail, &ProgressReporter::new()).unwrap();
        assert_eq!(tail.coefficients[0].coefficient, 7.5);
        assert_eq!(fs::read_to_string(&tail.output_file).unwrap(), "50 7.5\n");

        // Negative bounds count from the end: lags 3 and 4 give slope 9 again.
        let middle = config_for(root.path()).fit_start(-3).fit_end(-1).build().unwrap();
        let middle = run(&middle, &ProgressReporter::new()).unwrap();
        assert_eq!(fs::read_to_string(&middle.output_file).unwrap(), "50 1.5\n");
    }

    #[test]
    fn missing_runs_are_an_error() {
        let root = tempdir().unwrap();
        let config = DiffusionConfigBuilder::new()
            .root(root.path().to_path_buf())
            .build()
            .unwrap();
        assert!(matches!(run(&config, &ProgressReporter::new()), Err(EngineError::InvalidInput(_))));
    }
}
