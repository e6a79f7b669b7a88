use super::check_figure;
use crate::core::io::figures::{self, Labels};
use crate::core::io::table::{self, float_repr};
use crate::engine::config::HydroConfig;
use crate::engine::error::EngineError;
use crate::engine::hydro::{HydroPoint, bounded_folder, read_bounded_values, summarize};
use crate::engine::progress::ProgressReporter;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct HydroResult {
    pub series: Vec<HydroPoint>,
    pub table: PathBuf,
    pub figure: PathBuf,
}

/// Summarises HydroPro diffusion coefficients of the bounded complexes against the
/// number of bound molecules. Writes `<prefix>.txt` and `<prefix>.svg`.
#[instrument(skip_all, name = "hydro_plot_workflow")]
pub fn run(config: &HydroConfig, reporter: &ProgressReporter) -> Result<HydroResult, EngineError> {
    let groups = reporter.phase("Reading coefficients", || -> Result<Vec<Vec<f64>>, EngineError> {
        (1..=config.max_bounded)
            .map(|bound| {
                let folder = bounded_folder(&config.folder, bound);
                let values = read_bounded_values(&folder)?;
                debug!(bound, replicas = values.len(), "Coefficients read");
                Ok(values)
            })
            .collect()
    })?;
    let series = summarize(config.d_zero, &groups)?;

    if let Some(parent) = config.output_prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let table_path = with_extension(&config.output_prefix, "txt");
    table::write_rows_to_path(
        &table_path,
        series.iter().map(|p| {
            vec![p.bound.to_string(), float_repr(p.mean), float_repr(p.std)]
        }),
    )
    .map_err(|e| EngineError::format(&table_path, e))?;

    let figure = with_extension(&config.output_prefix, "svg");
    let points: Vec<(f64, f64, f64)> = series.iter().map(|p| (p.bound as f64, p.mean, p.std)).collect();
    check_figure(
        &figure,
        figures::error_bars(
            &figure,
            Labels {
                title: "HydroPro diffusion coefficients",
                x: "bound molecules",
                y: "D [cm^2/s]",
            },
            &points,
        ),
    )?;

    info!("Summary of {} bounded folders written to {}.", config.max_bounded, table_path.display());
    Ok(HydroResult {
        series,
        table: table_path,
        figure,
    })
}

/// Appends an extension without replacing any dot already in the prefix.
fn with_extension(prefix: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
