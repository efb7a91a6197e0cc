//! Football fixture prediction core: base predictors, weighted ensemble, temperature
//! calibration, Monte Carlo scorelines, uncertainty and consistency checks.
//!
//! Entry points live in [`engine`].

pub mod artifacts;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod consistency;
pub mod elo;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod goal_rate;
pub mod heuristic;
pub mod logging;
pub mod outcome;
pub mod predictor;
pub mod simulate;
pub mod uncertainty;
pub mod win_prob;

pub use engine::{Engine, PredictionResult, predict};
pub use error::EngineError;
