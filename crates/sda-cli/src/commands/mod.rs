pub mod assemble;
pub mod contacts;
pub mod density;
pub mod diffusion;
pub mod distance;
pub mod encounters;
pub mod frames;
pub mod hydro;
pub mod msm;
pub mod transform;
