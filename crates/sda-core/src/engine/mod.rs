//! # Engine Module
//!
//! Numerical algorithms behind the SDA tools. Everything here works on in-memory
//! records, point sets and matrices; file handling lives in [`crate::workflows`].
//!
//! ## Architecture
//!
//! - **Trajectory transforms** ([`unwrap`], [`reframe`], [`encounter`]) - single-pass
//!   rewrites of SDA trajectory records
//! - **Statistics** ([`diffusion`], [`contacts`], [`reaction`], [`hydro`]) - mean squared
//!   displacement fits, contact counting and distance monitoring
//! - **Markov modelling** ([`clustering`], [`msm`], [`validation`]) - k-means
//!   discretisation, maximum-likelihood transition matrices and their validation
//! - **Structure building** ([`assembly`], [`transform`], [`density`])
//! - **Configuration** ([`config`]), **Progress Monitoring** ([`progress`]) and
//!   **Error Handling** ([`error`])

pub mod assembly;
pub mod clustering;
pub mod config;
pub mod contacts;
pub mod density;
pub mod diffusion;
pub mod encounter;
pub mod error;
pub mod hydro;
pub mod msm;
pub mod progress;
pub mod reaction;
pub mod reframe;
pub mod transform;
pub mod unwrap;
pub mod validation;
