use super::{files_containing, recreate_dir};
use crate::core::io::pdb::PdbFile;
use crate::core::io::read_structure;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Structure;
use crate::engine::assembly::{ChainLayout, combine};
use crate::engine::config::AssemblyConfig;
use crate::engine::error::EngineError;
use crate::engine::hydro::bounded_folder;
use crate::engine::progress::{Progress, ProgressReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct AssemblyResult {
    /// Complexes written per `<i>_bounded` folder, in order of `i`.
    pub folders: Vec<(PathBuf, usize)>,
}

/// Builds the `<i>_bounded` series: complexes carrying `i` copies of the second molecule.
///
/// The first folder holds `num_replica` first/second combinations; every later folder
/// docks one more second molecule onto each complex of the previous folder.
#[instrument(skip_all, name = "assembly_workflow")]
pub fn run(config: &AssemblyConfig, reporter: &ProgressReporter) -> Result<AssemblyResult, EngineError> {
    let first = read_structure(&config.first_molecule).map_err(|e| EngineError::format(&config.first_molecule, e))?;
    let second =
        read_structure(&config.second_molecule).map_err(|e| EngineError::format(&config.second_molecule, e))?;
    let layout = if config.keep_chains {
        ChainLayout::Separate
    } else {
        ChainLayout::Single('A')
    };
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    info!(
        "Assembling up to {} bound molecules, {} replicas, step {} Ang.",
        config.max_bounded, config.num_replica, config.step
    );

    reporter.report(Progress::PhaseStart {
        name: "Assembling complexes",
    });
    reporter.report(Progress::TaskStart {
        total_steps: config.max_bounded as u64,
    });
    let mut folders = Vec::with_capacity(config.max_bounded);
    for bound in 1..=config.max_bounded {
        let folder = bounded_folder(&config.output_root, bound);
        let written = if bound == 1 {
            recreate_dir(&folder)?;
            for n in 1..=config.num_replica {
                let complex = combine(&first, &second, config.step, config.clash_threshold, layout, &mut rng)?;
                write_complex(&complex, &folder, n)?;
            }
            config.num_replica
        } else {
            let previous = files_containing(&bounded_folder(&config.output_root, bound - 1), "_rep.pdb")?;
            recreate_dir(&folder)?;
            for (i, path) in previous.iter().enumerate() {
                let base = read_structure(path).map_err(|e| EngineError::format(path, e))?;
                let complex = combine(&second, &base, config.step, config.clash_threshold, layout, &mut rng)?;
                write_complex(&complex, &folder, i + 1)?;
            }
            previous.len()
        };
        debug!(bound, complexes = written, "Bounded folder written");
        folders.push((folder, written));
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        "Wrote {} complexes into {}.",
        folders.iter().map(|(_, n)| n).sum::<usize>(),
        config.output_root.display()
    );
    Ok(AssemblyResult { folders })
}

fn write_complex(complex: &Structure, folder: &Path, n: usize) -> Result<(), EngineError> {
    let path = folder.join(format!("{}_rep.pdb", n));
    PdbFile::write_to_path(complex, &path).map_err(|e| EngineError::format(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::AssemblyConfigBuilder;
    use std::fs;
    use tempfile::tempdir;

    const MOLECULE: &str = "\
ATOM      1  C1  MOL A   1       0.000   0.000   0.000  1.00  0.00           C
ATOM      2  C2  MOL A   2       1.500   0.000   0.000  1.00  0.00           C
END
";

    fn config(root: &Path, seed: Option<u64>) -> AssemblyConfig {
        fs::write(root.join("mol.pdb"), MOLECULE).unwrap();
        AssemblyConfigBuilder::new()
            .first_molecule(root.join("mol.pdb"))
            .second_molecule(root.join("mol.pdb"))
            .max_bounded(3)
            .num_replica(2)
            .seed(seed)
            .output_root(root.join("complexes"))
            .build()
            .unwrap()
    }

    fn atom_lines(path: &Path) -> usize {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with("ATOM") || l.starts_with("HETATM"))
            .count()
    }

    #[test]
    fn each_folder_adds_one_molecule() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), Some(5));
        let result = run(&config, &ProgressReporter::new()).unwrap();

        let counts: Vec<usize> = result.folders.iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![2, 2, 2]);
        let root = dir.path().join("complexes");
        assert_eq!(atom_lines(&root.join("1_bounded/1_rep.pdb")), 4);
        assert_eq!(atom_lines(&root.join("2_bounded/2_rep.pdb")), 6);
        assert_eq!(atom_lines(&root.join("3_bounded/1_rep.pdb")), 8);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        run(&config(a.path(), Some(11)), &ProgressReporter::new()).unwrap();
        run(&config(b.path(), Some(11)), &ProgressReporter::new()).unwrap();
        let read = |root: &Path| fs::read_to_string(root.join("complexes/2_bounded/1_rep.pdb")).unwrap();
        assert_eq!(read(a.path()), read(b.path()));
    }

    #[test]
    fn stale_replicas_are_removed() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), Some(1));
        let stale = dir.path().join("complexes/1_bounded");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("9_rep.pdb"), "END\n").unwrap();
        run(&config, &ProgressReporter::new()).unwrap();
        assert!(!stale.join("9_rep.pdb").exists());
    }
}
