mod defaults;

pub use defaults::DefaultsConfig;

use crate::cli::{DiffusionArgs, MsmBuildArgs, MsmValidateArgs};
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParseError};
use sdatools::engine::clustering::KMeansInit;
use sdatools::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDiffusionConfig {
    rejected_frames: Option<i64>,
    solute_index: Option<u32>,
    fit_start: Option<isize>,
    fit_end: Option<isize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMsmConfig {
    num_clusters: Option<usize>,
    lagtime: Option<usize>,
    seed: Option<u64>,
    max_iterations: Option<usize>,
    reversible: Option<bool>,
    allow_disconnected: Option<bool>,
    init: Option<KMeansInit>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialValidationConfig {
    num_clusters: Option<usize>,
    seed: Option<u64>,
    max_iterations: Option<usize>,
    max_clusters: Option<usize>,
    lagtimes: Option<Vec<usize>>,
    metastable_sets: Option<usize>,
}

/// Tool settings read from a TOML file, layered as
/// defaults < file < command-line flags < `-S key=value`.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialToolConfig {
    diffusion: Option<PartialDiffusionConfig>,
    msm: Option<PartialMsmConfig>,
    validation: Option<PartialValidationConfig>,
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn set<T: FromStr>(slot: &mut Option<T>, key: &str, value: &str) -> std::result::Result<(), ParseError> {
    *slot = Some(parser::parse_value(key, value)?);
    Ok(())
}

impl PartialToolConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// The file's settings, or none when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    pub fn diffusion_config(mut self, args: &DiffusionArgs) -> Result<core_config::DiffusionConfig> {
        let defaults = DefaultsConfig::default();
        let partial = self.diffusion.get_or_insert_with(Default::default);
        overlay(&mut partial.rejected_frames, args.rejected_frames);
        overlay(&mut partial.solute_index, args.solute_index);
        overlay(&mut partial.fit_start, args.fit_start);
        overlay(&mut partial.fit_end, args.fit_end);
        self.apply_set_values(&args.set_values)?;

        let partial = self.diffusion.unwrap_or_default();
        let config = core_config::DiffusionConfigBuilder::new()
            .root(args.root.clone())
            .rejected_frames(partial.rejected_frames.unwrap_or(defaults.rejected_frames))
            .solute_index(partial.solute_index.unwrap_or(defaults.solute_index))
            .fit_start(partial.fit_start.unwrap_or(defaults.fit_start))
            .fit_end(partial.fit_end.unwrap_or(defaults.fit_end))
            .output_file(args.output.clone())
            .figures_folder(args.figures_folder.clone())
            .build()?;
        Ok(config)
    }

    pub fn msm_config(mut self, args: &MsmBuildArgs) -> Result<core_config::MsmConfig> {
        let defaults = DefaultsConfig::default();
        let init = args
            .init
            .as_deref()
            .map(KMeansInit::from_str)
            .transpose()
            .map_err(CliError::Argument)?;
        let reversible = if args.reversible.reversible {
            Some(true)
        } else if args.reversible.no_reversible {
            Some(false)
        } else {
            None
        };
        let allow_disconnected = if args.allow_disconnected.allow_disconnected {
            Some(true)
        } else if args.allow_disconnected.no_allow_disconnected {
            Some(false)
        } else {
            None
        };

        let partial = self.msm.get_or_insert_with(Default::default);
        overlay(&mut partial.num_clusters, args.num_clusters);
        overlay(&mut partial.lagtime, args.lagtime);
        overlay(&mut partial.seed, args.seed);
        overlay(&mut partial.max_iterations, args.max_iterations);
        overlay(&mut partial.init, init);
        overlay(&mut partial.reversible, reversible);
        overlay(&mut partial.allow_disconnected, allow_disconnected);
        self.apply_set_values(&args.set_values)?;

        let partial = self.msm.unwrap_or_default();
        let num_clusters = partial.num_clusters.ok_or_else(|| {
            CliError::Config(
                "`msm.num-clusters` is required in the config file or via --num-clusters.".to_string(),
            )
        })?;
        let config = core_config::MsmConfigBuilder::new()
            .folder_xyz(args.folder_xyz.clone())
            .output_folder(args.output.clone())
            .file_filter(args.filter.clone())
            .num_clusters(num_clusters)
            .lagtime(partial.lagtime.unwrap_or(defaults.msm_lagtime))
            .seed(partial.seed.unwrap_or(defaults.msm_seed))
            .max_iterations(partial.max_iterations.unwrap_or(defaults.msm_max_iterations))
            .init(partial.init.unwrap_or(defaults.msm_init))
            .reversible(partial.reversible.unwrap_or(defaults.msm_reversible))
            .allow_disconnected(partial.allow_disconnected.unwrap_or(defaults.msm_allow_disconnected))
            .build()?;
        Ok(config)
    }

    pub fn validation_config(mut self, args: &MsmValidateArgs) -> Result<core_config::ValidationConfig> {
        let defaults = DefaultsConfig::default();
        let partial = self.validation.get_or_insert_with(Default::default);
        overlay(&mut partial.num_clusters, args.num_clusters);
        overlay(&mut partial.seed, args.seed);
        overlay(&mut partial.max_iterations, args.max_iterations);
        overlay(&mut partial.max_clusters, args.max_clusters);
        overlay(&mut partial.lagtimes, args.lagtimes.clone());
        overlay(&mut partial.metastable_sets, args.metastable_sets);
        self.apply_set_values(&args.set_values)?;

        let partial = self.validation.unwrap_or_default();
        let config = core_config::ValidationConfigBuilder::new()
            .folder_prefix(args.folder_prefix.clone())
            .encounter_runs(args.runs.clone())
            .output_folder(args.output.clone())
            .num_clusters(partial.num_clusters.unwrap_or(defaults.validation_num_clusters))
            .seed(partial.seed.unwrap_or(defaults.validation_seed))
            .max_iterations(partial.max_iterations.unwrap_or(defaults.validation_max_iterations))
            .max_clusters(partial.max_clusters.unwrap_or(defaults.validation_max_clusters))
            .lagtimes(partial.lagtimes.unwrap_or(defaults.validation_lagtimes))
            .metastable_sets(partial.metastable_sets.unwrap_or(defaults.validation_metastable_sets))
            .build()?;
        Ok(config)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = parser::split_assignment(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
            self.apply_set_value(key, value)
                .map_err(|e| CliError::Config(e.to_string()))?;
            debug!(key, value, "Applied configuration override");
        }
        Ok(())
    }

    fn apply_set_value(&mut self, key: &str, value: &str) -> std::result::Result<(), SetError> {
        match key {
            "diffusion.rejected-frames" => {
                set(&mut self.diffusion.get_or_insert_with(Default::default).rejected_frames, key, value)?
            }
            "diffusion.solute-index" => {
                set(&mut self.diffusion.get_or_insert_with(Default::default).solute_index, key, value)?
            }
            "diffusion.fit-start" => set(&mut self.diffusion.get_or_insert_with(Default::default).fit_start, key, value)?,
            "diffusion.fit-end" => set(&mut self.diffusion.get_or_insert_with(Default::default).fit_end, key, value)?,
            "msm.num-clusters" => set(&mut self.msm.get_or_insert_with(Default::default).num_clusters, key, value)?,
            "msm.lagtime" => set(&mut self.msm.get_or_insert_with(Default::default).lagtime, key, value)?,
            "msm.seed" => set(&mut self.msm.get_or_insert_with(Default::default).seed, key, value)?,
            "msm.max-iterations" => set(&mut self.msm.get_or_insert_with(Default::default).max_iterations, key, value)?,
            "msm.reversible" => set(&mut self.msm.get_or_insert_with(Default::default).reversible, key, value)?,
            "msm.allow-disconnected" => {
                set(&mut self.msm.get_or_insert_with(Default::default).allow_disconnected, key, value)?
            }
            "msm.init" => set(&mut self.msm.get_or_insert_with(Default::default).init, key, value)?,
            "validation.num-clusters" => {
                set(&mut self.validation.get_or_insert_with(Default::default).num_clusters, key, value)?
            }
            "validation.seed" => set(&mut self.validation.get_or_insert_with(Default::default).seed, key, value)?,
            "validation.max-iterations" => {
                set(&mut self.validation.get_or_insert_with(Default::default).max_iterations, key, value)?
            }
            "validation.max-clusters" => {
                set(&mut self.validation.get_or_insert_with(Default::default).max_clusters, key, value)?
            }
            "validation.lagtimes" => {
                self.validation.get_or_insert_with(Default::default).lagtimes = Some(parser::parse_list(key, value)?)
            }
            "validation.metastable-sets" => {
                set(&mut self.validation.get_or_insert_with(Default::default).metastable_sets, key, value)?
            }
            _ => return Err(SetError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum SetError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unsupported configuration key for --set: '{0}'")]
    UnknownKey(String),
}
