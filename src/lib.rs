//! # Quadrotor Ring Racing
//! This crate provides the episode engine of a ring-racing environment for quadrotor
//! reinforcement learning. A drone spawns inside a bounded flight volume and has to fly
//! through a randomly generated course of rings in order.
//! ## Features
//! - Rotor-level quadrotor dynamics behind the `FlightDynamics` trait
//! - Seeded ring course generation and ring passage detection
//! - Body-frame, normalized 29-float observation encoding
//! - Per-episode reward and termination policy with cross-episode statistics
//! - A `rayon` vectorized runner over many independent episodes
//! - Optional visualization with the `rerun` crate
pub mod config;
pub mod course;
pub mod dynamics;
pub mod geometry;
pub mod observation;
pub mod race;
pub mod render;
pub mod stats;
pub mod vec_env;

pub use course::{CourseGenerator, FlightVolume, Ring, RingOutcome};
pub use dynamics::{DroneParams, DroneState, FlightDynamics, Quadrotor, NUM_ROTORS};
pub use observation::{NextRing, OBS_SIZE};
pub use race::{DroneRace, StepResult};
pub use stats::{EpisodeSummary, Log, Termination};
pub use vec_env::VecDroneRace;

#[derive(thiserror::Error, Debug)]
/// Represents errors that can occur while building or running the race
pub enum SimulationError {
    /// Error related to Rerun visualization
    #[error("Rerun error: {0}")]
    RerunError(#[from] rerun::RecordingStreamError),
    /// Error related to normal distribution calculations
    #[error("Normal error: {0}")]
    NormalError(#[from] rand_distr::NormalError),
    /// Error related to parsing the YAML configuration
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    /// Error related to reading the configuration file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// The ring buffer could not be allocated
    #[error("Allocation error: {0}")]
    AllocationError(#[from] std::collections::TryReserveError),
    /// Configuration values that cannot produce a valid episode
    #[error("Config error: {0}")]
    ConfigError(String),
    /// Other general errors
    #[error("Other error: {0}")]
    OtherError(String),
}
