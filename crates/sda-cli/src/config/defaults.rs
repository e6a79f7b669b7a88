use sdatools::engine::clustering::KMeansInit;

/// Built-in values used when neither the config file, the flags nor `-S` set a field.
pub struct DefaultsConfig {
    pub rejected_frames: i64,
    pub solute_index: u32,
    pub fit_start: isize,
    pub fit_end: isize,

    pub msm_lagtime: usize,
    pub msm_seed: u64,
    pub msm_max_iterations: usize,
    pub msm_init: KMeansInit,
    pub msm_reversible: bool,
    pub msm_allow_disconnected: bool,

    pub validation_num_clusters: usize,
    pub validation_seed: u64,
    pub validation_max_iterations: usize,
    pub validation_max_clusters: usize,
    pub validation_lagtimes: Vec<usize>,
    pub validation_metastable_sets: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            rejected_frames: 10,
            solute_index: 1,
            fit_start: 0,
            fit_end: -1,

            msm_lagtime: 1,
            msm_seed: 13,
            msm_max_iterations: 500,
            msm_init: KMeansInit::KMeansPlusPlus,
            msm_reversible: false,
            msm_allow_disconnected: false,

            validation_num_clusters: 6,
            validation_seed: 1,
            validation_max_iterations: 50_000,
            validation_max_clusters: 19,
            validation_lagtimes: (1..=7).collect(),
            validation_metastable_sets: 6,
        }
    }
}
