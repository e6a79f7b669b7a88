use super::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};

/// Mean diffusion coefficient of the complexes with `bound` extra molecules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HydroPoint {
    pub bound: usize,
    pub mean: f64,
    pub std: f64,
}

/// Folder holding the per-replica results for `bound` extra molecules.
pub fn bounded_folder(root: &Path, bound: usize) -> PathBuf {
    root.join(format!("{}_bounded", bound))
}

/// Reads the leading number of every file in `folder`, in file-name order.
pub fn read_bounded_values(folder: &Path) -> Result<Vec<f64>, EngineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
        .iter()
        .map(|file| {
            let text = fs::read_to_string(file)?;
            let token = text.split_whitespace().next().ok_or_else(|| {
                EngineError::InvalidInput(format!("{} is empty", file.display()))
            })?;
            token.parse::<f64>().map_err(|e| EngineError::format(file, e))
        })
        .collect()
}

/// Series starting at the free molecule (`d_zero`, zero spread) followed by the mean
/// and population standard deviation of every group.
pub fn summarize(d_zero: f64, groups: &[Vec<f64>]) -> Result<Vec<HydroPoint>, EngineError> {
    let mut series = vec![HydroPoint {
        bound: 0,
        mean: d_zero,
        std: 0.0,
    }];
    for (i, values) in groups.iter().enumerate() {
        if values.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "no diffusion coefficients for {} bound molecules",
                i + 1
            )));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        series.push(HydroPoint {
            bound: i + 1,
            mean,
            std: variance.sqrt(),
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn series_starts_with_free_molecule() {
        let series = summarize(10.0, &[vec![8.0, 6.0], vec![5.0]]).unwrap();
        assert_eq!(
            series,
            vec![
                HydroPoint { bound: 0, mean: 10.0, std: 0.0 },
                HydroPoint { bound: 1, mean: 7.0, std: 1.0 },
                HydroPoint { bound: 2, mean: 5.0, std: 0.0 },
            ]
        );
        assert!(summarize(1.0, &[vec![]]).is_err());
    }

    #[test]
    fn reads_one_value_per_file() {
        let dir = tempdir().unwrap();
        let folder = bounded_folder(dir.path(), 1);
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("2_rep.txt"), "4.5e-7\n").unwrap();
        fs::write(folder.join("1_rep.txt"), "  5.0e-7  extra\n").unwrap();
        assert_eq!(read_bounded_values(&folder).unwrap(), vec![5.0e-7, 4.5e-7]);

        fs::write(folder.join("3_rep.txt"), "n/a\n").unwrap();
        assert!(matches!(read_bounded_values(&folder), Err(EngineError::Format { .. })));
    }
}
