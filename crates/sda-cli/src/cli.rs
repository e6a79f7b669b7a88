use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "sdatools - post-processing, encounter extraction and Markov state models for SDA Brownian-dynamics runs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Directory the `folder_<ftrajectories>*` outputs and inputs are resolved against.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub workdir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit diffusion coefficients over the `assoc_<N>gL` folders of a crowded-run directory.
    Diffusion(DiffusionArgs),
    /// Extract or select encounter sub-trajectories of an association run.
    Encounters(EncountersArgs),
    /// Rewrite encounter files with the protein fixed at the origin.
    Align(AlignArgs),
    /// Track the ligand centre in the protein frame for every encounter file.
    Xyz(XyzArgs),
    /// Build or validate Markov state models of ligand diffusion.
    Msm(MsmArgs),
    /// Monitor molecule-crowder contacts or merge their arrays.
    Contacts(ContactsArgs),
    /// Minimum crowder distance to a protein's reaction atoms per frame.
    Distance(DistanceArgs),
    /// Build complexes carrying 1..N copies of a second molecule.
    Assemble(AssembleArgs),
    /// Plot HydroPro diffusion coefficients against the number of bound molecules.
    HydroPlot(HydroPlotArgs),
    /// Move a structure to a target centre of mass, optionally rotating it.
    Transform(TransformArgs),
    /// Crowder density in g/L from box size, molecular weight and molecule count.
    Density(DensityArgs),
    /// Number of molecules for a target density.
    Molecules(MoleculesArgs),
}

// ---- Diffusion ----

#[derive(Args, Debug)]
pub struct DiffusionArgs {
    /// Directory holding the `assoc_<N>gL` run folders.
    #[arg(default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Initial frames rejected as equilibration.
    #[arg(long, value_name = "INT")]
    pub rejected_frames: Option<i64>,

    /// Solute whose diffusion is measured.
    #[arg(long, value_name = "INT")]
    pub solute_index: Option<u32>,

    /// First MSD point of the linear fit; negative values count from the end.
    #[arg(long, value_name = "INT", allow_hyphen_values = true)]
    pub fit_start: Option<isize>,

    /// End of the fit window (exclusive); negative values count from the end.
    #[arg(long, value_name = "INT", allow_hyphen_values = true)]
    pub fit_end: Option<isize>,

    /// Output table of density and diffusion coefficient.
    #[arg(short, long, value_name = "PATH", default_value = "diff_coeff.txt")]
    pub output: PathBuf,

    /// Folder for the diffusion figure.
    #[arg(long, value_name = "DIR", default_value = "images_diff")]
    pub figures_folder: PathBuf,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S diffusion.rejected-frames=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

// ---- Encounters ----

#[derive(Args, Debug)]
pub struct EncountersArgs {
    #[command(subcommand)]
    pub command: EncountersCommands,
}

#[derive(Subcommand, Debug)]
pub enum EncountersCommands {
    /// Cut the approach of every encountered trajectory into `folder_<ftrajectories>`.
    Extract {
        /// SDA input file naming `fcomplexes` and `ftrajectories`.
        sda_input: PathBuf,
        /// Protein structure.
        protein_pdb: PathBuf,
        /// Ligand structure.
        ligand_pdb: PathBuf,
        /// Protein-ligand centre distance above which buffered frames are dropped.
        cutoff: f64,
    },
    /// Print the complexes files that contain at least one encounter.
    Select {
        /// Number of solutes of the run.
        total_solutes: usize,
        /// Text removed from each printed file name.
        strip: String,
        /// Complexes files to inspect.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

// ---- Reference frames ----

#[derive(Args, Debug)]
pub struct AlignArgs {
    /// SDA input file of the association run.
    pub sda_input: PathBuf,
}

#[derive(Args, Debug)]
pub struct XyzArgs {
    /// SDA input file of the association run.
    pub sda_input: PathBuf,
    /// Protein structure.
    pub protein_pdb: PathBuf,
    /// Ligand structure.
    pub ligand_pdb: PathBuf,
}

// ---- Markov state models ----

#[derive(Args, Debug)]
pub struct MsmArgs {
    #[command(subcommand)]
    pub command: MsmCommands,
}

#[derive(Subcommand, Debug)]
pub enum MsmCommands {
    /// Cluster the ligand tracks and estimate one Markov state model.
    Build(MsmBuildArgs),
    /// Sweep cluster counts and lag times and run a Chapman-Kolmogorov test.
    Validate(MsmValidateArgs),
}

#[derive(Args, Debug, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct Reversible {
    /// Constrain the model to detailed balance.
    #[arg(long)]
    pub reversible: bool,
    /// Estimate a non-reversible model.
    #[arg(long)]
    pub no_reversible: bool,
}

#[derive(Args, Debug, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct AllowDisconnected {
    /// Keep going when the count matrix is not connected (not recommended).
    #[arg(long)]
    pub allow_disconnected: bool,
    /// Fail when the count matrix is not connected.
    #[arg(long)]
    pub no_allow_disconnected: bool,
}

#[derive(Args, Debug)]
pub struct MsmBuildArgs {
    /// Folder holding the `*_xyz` ligand tracks.
    #[arg(long, required = true, value_name = "DIR")]
    pub folder_xyz: PathBuf,

    /// Output folder; replaced if it exists.
    #[arg(short, long = "folder-msm", required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Only tracks whose file name contains this text are used.
    #[arg(long, value_name = "TEXT", default_value = "trajectories_1")]
    pub filter: String,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_name = "INT")]
    pub num_clusters: Option<usize>,

    #[arg(long, value_name = "INT")]
    pub lagtime: Option<usize>,

    /// Seed of the k-means initialisation.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Maximum number of k-means iterations.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// k-means initialisation: `kmeans++` or `uniform`.
    #[arg(long, value_name = "NAME")]
    pub init: Option<String>,

    #[command(flatten)]
    pub reversible: Reversible,

    #[command(flatten)]
    pub allow_disconnected: AllowDisconnected,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S msm.num-clusters=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MsmValidateArgs {
    /// Prefix of the `<prefix>_<n>_xyz` folders, e.g. `folder_trajectories`.
    #[arg(long, required = true, value_name = "PREFIX")]
    pub folder_prefix: PathBuf,

    /// Encounter runs to pool, e.g. `--runs 1,2,3`.
    #[arg(long = "runs", required = true, value_name = "N", value_delimiter = ',', num_args = 1..)]
    pub runs: Vec<u32>,

    /// Output folder for the figures; replaced if it exists.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_name = "INT")]
    pub num_clusters: Option<usize>,

    /// Largest cluster count of the WCSS sweep.
    #[arg(long, value_name = "INT")]
    pub max_clusters: Option<usize>,

    /// Lag times of the implied-timescale and Chapman-Kolmogorov analyses.
    #[arg(long, value_name = "LAGS", value_delimiter = ',')]
    pub lagtimes: Option<Vec<usize>>,

    /// Number of metastable sets of the Chapman-Kolmogorov test.
    #[arg(long, value_name = "INT")]
    pub metastable_sets: Option<usize>,

    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S validation.max-clusters=10
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

// ---- Contacts ----

#[derive(Args, Debug)]
pub struct ContactsArgs {
    #[command(subcommand)]
    pub command: ContactsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ContactsCommands {
    /// Count contacts between one molecule and the crowders of a crowded run.
    Monitor(ContactsMonitorArgs),
    /// Concatenate the `.npy` arrays of a folder whose names contain a given text.
    Merge {
        /// Folder holding the arrays.
        #[arg(long, required = true, value_name = "DIR")]
        folder: PathBuf,
        /// Text the merged file names contain, e.g. `bounded_times`.
        #[arg(long, required = true, value_name = "TEXT")]
        files_name: String,
    },
}

#[derive(Args, Debug)]
pub struct ContactsMonitorArgs {
    #[arg(long, required = true, value_name = "PATH")]
    pub sda_input: PathBuf,

    /// Trajectory of the crowded run.
    #[arg(long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Structure of the monitored molecule.
    #[arg(long, required = true, value_name = "PATH")]
    pub molecule: PathBuf,

    /// Structure of one crowder.
    #[arg(long, required = true, value_name = "PATH")]
    pub crowder: PathBuf,

    /// Solute number of the monitored molecule in the trajectory.
    #[arg(long, required = true, value_name = "INT")]
    pub molecule_solute: u32,

    /// Centre distance below which atom contacts are evaluated.
    #[arg(long, required = true, value_name = "ANG")]
    pub prescreen_distance: f64,

    /// Atom-pair distance defining a contact.
    #[arg(long, required = true, value_name = "ANG")]
    pub contact_distance: f64,

    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,
}

// ---- Reaction distances ----

#[derive(Args, Debug)]
pub struct DistanceArgs {
    #[arg(long, required = true, value_name = "PATH")]
    pub sda_input: PathBuf,

    #[arg(long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Reaction criteria file naming the protein's reaction atoms.
    #[arg(long, required = true, value_name = "PATH")]
    pub reaction_file: PathBuf,

    /// Protein structure, PQR or PDB.
    #[arg(long, required = true, value_name = "PATH")]
    pub protein: PathBuf,

    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Number of histogram bins.
    #[arg(long, value_name = "INT", default_value_t = 50)]
    pub bins: usize,
}

// ---- Complexes ----

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[arg(long, required = true, value_name = "PATH")]
    pub first_molecule: PathBuf,

    #[arg(long, required = true, value_name = "PATH")]
    pub second_molecule: PathBuf,

    /// Largest number of bound second molecules.
    #[arg(long, required = true, value_name = "INT")]
    pub max_bounded: usize,

    /// Complexes built in the first folder.
    #[arg(long, required = true, value_name = "INT")]
    pub num_replica: usize,

    /// Displacement per placement step in Å.
    #[arg(long, value_name = "ANG")]
    pub step: Option<f64>,

    /// Heavy-atom distance below which two molecules clash, in Å.
    #[arg(long, value_name = "ANG")]
    pub clash_threshold: Option<f64>,

    /// Seed of the random placement directions.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Keep each molecule's chains instead of merging everything into chain A.
    #[arg(long)]
    pub keep_chains: bool,

    /// Directory receiving the `<i>_bounded` folders.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct HydroPlotArgs {
    /// Directory holding the `<i>_bounded` coefficient folders.
    #[arg(long = "diff-coeff-folder", required = true, value_name = "DIR")]
    pub folder: PathBuf,

    #[arg(long, required = true, value_name = "INT")]
    pub max_bounded: usize,

    /// Diffusion coefficient of the free first molecule.
    #[arg(long = "d-zero", required = true, value_name = "FLOAT", allow_hyphen_values = true)]
    pub d_zero: f64,

    /// Output prefix; `.txt` and `.svg` are appended.
    #[arg(short, long, value_name = "PREFIX", default_value = "diffusion_coefficients")]
    pub output: PathBuf,
}

// ---- Structure tools ----

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Input structure, PDB or PQR.
    pub input: PathBuf,
    /// Output PDB file.
    pub output: PathBuf,
    /// Target centre of mass.
    #[arg(required = true, num_args = 3, value_names = ["X", "Y", "Z"], allow_hyphen_values = true)]
    pub target_com: Vec<f64>,

    /// Extrinsic x-y-z rotation angles in degrees.
    #[arg(long, num_args = 3, value_names = ["RX", "RY", "RZ"], allow_hyphen_values = true)]
    pub euler_angles: Option<Vec<f64>>,

    /// Row-major 3x3 rotation matrix; takes precedence over the Euler angles.
    #[arg(long, num_args = 9, value_name = "M", allow_hyphen_values = true)]
    pub rotation_matrix: Option<Vec<f64>>,
}

#[derive(Args, Debug)]
pub struct DensityArgs {
    /// Box side length in Å.
    #[arg(short, long = "box-size", required = true, value_name = "ANG")]
    pub box_size: f64,
    /// Molecular weight in Da.
    #[arg(short, long, required = true, value_name = "DA")]
    pub molecular_weight: f64,
    /// Number of molecules in the box.
    #[arg(short, long, required = true, value_name = "INT")]
    pub num_molecules: u64,
}

#[derive(Args, Debug)]
pub struct MoleculesArgs {
    /// Density in g/L.
    #[arg(short, long, required = true, value_name = "G_PER_L")]
    pub density: f64,
    /// Molecular weight in Da.
    #[arg(short, long, required = true, value_name = "DA")]
    pub molecular_weight: f64,
    /// Box side length in Å.
    #[arg(short, long = "box-size", required = true, value_name = "ANG")]
    pub box_size: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["sdatools", "align", "sda.in", "-vv", "-j", "4", "--workdir", "runs"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
        assert_eq!(cli.workdir, PathBuf::from("runs"));
        assert!(matches!(cli.command, Commands::Align(AlignArgs { .. })));
    }

    #[test]
    fn validate_runs_accept_comma_lists() {
        let cli = Cli::parse_from([
            "sdatools",
            "msm",
            "validate",
            "--folder-prefix",
            "folder_trajectories",
            "--runs",
            "1,3,5",
            "-o",
            "out",
            "--lagtimes",
            "1,2,4",
        ]);
        let Commands::Msm(MsmArgs {
            command: MsmCommands::Validate(args),
        }) = cli.command
        else {
            panic!("expected msm validate");
        };
        assert_eq!(args.runs, vec![1, 3, 5]);
        assert_eq!(args.lagtimes, Some(vec![1, 2, 4]));
    }

    #[test]
    fn transform_takes_negative_coordinates() {
        let cli = Cli::parse_from(["sdatools", "transform", "in.pdb", "out.pdb", "-1.5", "0", "2"]);
        let Commands::Transform(args) = cli.command else {
            panic!("expected transform");
        };
        assert_eq!(args.target_com, vec![-1.5, 0.0, 2.0]);
        assert!(args.rotation_matrix.is_none());
    }

    #[test]
    fn reversible_flags_are_exclusive() {
        let result = Cli::try_parse_from([
            "sdatools",
            "msm",
            "build",
            "--folder-xyz",
            "xyz",
            "--folder-msm",
            "msm",
            "--reversible",
            "--no-reversible",
        ]);
        assert!(result.is_err());
    }
}
