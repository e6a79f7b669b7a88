use crate::core::utils::geometry::BoxBounds;
use nalgebra::Vector3;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdaInputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Missing key '{0}' in SDA input file")]
    MissingKey(&'static str),
    #[error("Invalid value '{value}' for key '{key}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Parameters of an SDA input file (`sda.in`, `sdamm_crowd<N>.in`).
///
/// The file is free text. Every line containing `=` contributes an entry keyed by
/// the first token before the `=`, valued by the last whitespace token of the line.
/// Entries keep file order; a repeated key resolves to its last occurrence.
#[derive(Debug, Clone, Default)]
pub struct SdaInput {
    entries: Vec<(String, String)>,
}

impl SdaInput {
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
                continue;
            }
            let Some((lhs, _)) = line.split_once('=') else {
                continue;
            };
            let (Some(key), Some(value)) = (lhs.split_whitespace().next(), line.split_whitespace().last())
            else {
                continue;
            };
            entries.push((key.to_string(), value.to_string()));
        }
        Self { entries }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SdaInputError> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Raw value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &'static str) -> Result<T, SdaInputError> {
        let raw = self.get(key).ok_or(SdaInputError::MissingKey(key))?;
        raw.parse().map_err(|_| SdaInputError::InvalidValue {
            key,
            value: raw.to_string(),
        })
    }

    /// Time step `dt1` in picoseconds.
    pub fn dt(&self) -> Result<f64, SdaInputError> {
        self.parsed("dt1")
    }

    pub fn freq_print(&self) -> Result<i64, SdaInputError> {
        self.parsed("freq_print")
    }

    pub fn total_solutes(&self) -> Result<usize, SdaInputError> {
        self.parsed("total_solutes")
    }

    pub fn complexes_file(&self) -> Result<PathBuf, SdaInputError> {
        self.get("fcomplexes")
            .map(PathBuf::from)
            .ok_or(SdaInputError::MissingKey("fcomplexes"))
    }

    pub fn trajectories_file(&self) -> Result<PathBuf, SdaInputError> {
        self.get("ftrajectories")
            .map(PathBuf::from)
            .ok_or(SdaInputError::MissingKey("ftrajectories"))
    }

    pub fn bounds(&self) -> Result<BoxBounds, SdaInputError> {
        Ok(BoxBounds::new(
            Vector3::new(self.parsed("xmin")?, self.parsed("ymin")?, self.parsed("zmin")?),
            Vector3::new(self.parsed("xmax")?, self.parsed("ymax")?, self.parsed("zmax")?),
        ))
    }

    /// Side of the simulation box along x, used as the cubic box length.
    pub fn box_length(&self) -> Result<f64, SdaInputError> {
        let min: f64 = self.parsed("xmin")?;
        let max: f64 = self.parsed("xmax")?;
        Ok(max - min)
    }

    pub fn box_lengths(&self) -> Result<Vector3<f64>, SdaInputError> {
        Ok(self.bounds()?.lengths())
    }
}

/// Locates the per-trajectory input of a crowded run: `trajectories12` pairs with
/// `<folder>/sdamm_crowd12.in`.
pub fn crowd_input_path(folder: &Path, trajectory_file_name: &str) -> PathBuf {
    let suffix = trajectory_file_name.replace("trajectories", "");
    folder.join(format!("sdamm_crowd{}.in", suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
! SDA input
dt1 = 0.5
freq_print = 100
xmin = 0.0
xmax = 240.0
ymin = 0.0
ymax = 240.0
zmin = -10.0
zmax = 230.0
total_solutes = 12
fcomplexes = complexes
ftrajectories = trajectories
nrun = 1000
";

    #[test]
    fn reads_typed_parameters() {
        let input = SdaInput::parse(SAMPLE);
        assert_eq!(input.dt().unwrap(), 0.5);
        assert_eq!(input.freq_print().unwrap(), 100);
        assert_eq!(input.total_solutes().unwrap(), 12);
        assert_eq!(input.box_length().unwrap(), 240.0);
        assert_eq!(input.box_lengths().unwrap(), Vector3::new(240.0, 240.0, 240.0));
        assert_eq!(input.trajectories_file().unwrap(), PathBuf::from("trajectories"));
        assert_eq!(input.get("nrun"), Some("1000"));
    }

    #[test]
    fn missing_and_invalid_keys_are_reported() {
        let input = SdaInput::parse("dt1 = fast\n");
        assert!(matches!(input.freq_print(), Err(SdaInputError::MissingKey("freq_print"))));
        assert!(matches!(
            input.dt(),
            Err(SdaInputError::InvalidValue { key: "dt1", .. })
        ));
    }

    #[test]
    fn later_entries_override_earlier_ones() {
        let input = SdaInput::parse("xmax = 10\nxmin = 0\nxmax = 20\n");
        assert_eq!(input.box_length().unwrap(), 20.0);
        assert_eq!(input.entries().count(), 3);
    }

    #[test]
    fn crowd_input_path_strips_trajectory_prefix() {
        let path = crowd_input_path(Path::new("assoc_100gL"), "trajectories7");
        assert_eq!(path, PathBuf::from("assoc_100gL/sdamm_crowd7.in"));
    }
}
