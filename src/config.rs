use crate::observation::NextRing;
use crate::SimulationError;
use nalgebra::Vector3;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub race: RaceConfig,
    pub flight_volume: FlightVolumeConfig,
    pub quadrotor: QuadrotorConfig,
    pub rollout: RolloutConfig,
    pub render: RenderConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SimulationConfig {
    /// Duration of one tick in seconds
    pub time_step: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { time_step: 0.02 }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RaceConfig {
    /// Number of rings in a course
    pub max_rings: usize,
    /// Move budget of one episode
    pub max_moves: u32,
    pub ring_radius: f32,
    /// Minimum distance between consecutive ring centers
    pub min_ring_spacing: f32,
    /// Largest ring normal elevation in radians
    pub max_ring_pitch: f32,
    /// Drone size is drawn uniformly from this range on every reset
    pub drone_size_range: [f32; 2],
    pub drone_mass: f32,
    pub next_ring: NextRing,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            max_rings: 5,
            max_moves: 1000,
            ring_radius: 2.0,
            min_ring_spacing: 8.0,
            max_ring_pitch: 0.3,
            drone_size_range: [0.05, 0.8],
            drone_mass: 0.1,
            next_ring: NextRing::Current,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct FlightVolumeConfig {
    /// Half extent of the flight volume along x, y and z
    pub half_extents: [f32; 3],
    /// Distance kept between spawn points and the volume walls
    pub spawn_margin: f32,
}

impl Default for FlightVolumeConfig {
    fn default() -> Self {
        Self {
            half_extents: [30.0, 30.0, 10.0],
            spawn_margin: 1.0,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct QuadrotorConfig {
    pub gravity: f32,
    pub max_rpm: f32,
    pub max_velocity: f32,
    pub max_angular_velocity: f32,
    /// Ratio of full-throttle thrust to weight, sets the thrust coefficient
    pub thrust_to_weight: f32,
    /// First order rotor response time in seconds
    pub motor_time_constant: f32,
    pub linear_drag: f32,
    pub angular_drag: f32,
    /// Reaction torque per unit of thrust
    pub yaw_torque_ratio: f32,
}

impl Default for QuadrotorConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            max_rpm: 750.0,
            max_velocity: 50.0,
            max_angular_velocity: 50.0,
            thrust_to_weight: 2.5,
            motor_time_constant: 0.02,
            linear_drag: 0.01,
            angular_drag: 1e-4,
            yaw_torque_ratio: 0.02,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RolloutConfig {
    pub num_envs: usize,
    pub seed: u64,
    /// Number of vectorized steps to run
    pub total_steps: usize,
    /// Vectorized steps between two statistics reports
    pub log_interval: usize,
    /// Standard deviation of the noise added to the hover command
    pub hover_noise_std: f32,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            num_envs: 64,
            seed: 42,
            total_steps: 20_000,
            log_interval: 1_000,
            hover_noise_std: 0.2,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    /// Index of the vectorized instance to visualize
    pub env_index: usize,
    pub every_n_steps: usize,
    pub trail_min_distance: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            env_index: 0,
            every_n_steps: 2,
            trail_min_distance: 0.05,
        }
    }
}

impl Config {
    pub fn from_yaml(filename: &str) -> Result<Self, SimulationError> {
        let mut contents = String::new();
        File::open(filename)?.read_to_string(&mut contents)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
    /// Checks that the configuration can produce valid episodes
    /// # Errors
    /// * Returns a ConfigError naming the first offending value
    pub fn validate(&self) -> Result<(), SimulationError> {
        let race = &self.race;
        let invalid = |msg: String| Err(SimulationError::ConfigError(msg));
        if race.max_rings == 0 {
            return invalid("race.max_rings must be positive".to_string());
        }
        if race.max_moves == 0 {
            return invalid("race.max_moves must be positive".to_string());
        }
        if self.simulation.time_step <= 0.0 {
            return invalid(format!(
                "simulation.time_step must be positive, got {}",
                self.simulation.time_step
            ));
        }
        if race.ring_radius <= 0.0 || race.drone_mass <= 0.0 {
            return invalid("race.ring_radius and race.drone_mass must be positive".to_string());
        }
        let [min_size, max_size] = race.drone_size_range;
        if min_size <= 0.0 || min_size > max_size {
            return invalid(format!(
                "race.drone_size_range must be a positive, non-empty range, got {:?}",
                race.drone_size_range
            ));
        }
        if self.flight_volume.half_extents.iter().any(|&e| e <= 0.0) {
            return invalid(format!(
                "flight_volume.half_extents must be positive, got {:?}",
                self.flight_volume.half_extents
            ));
        }
        let margins = self.spawn_margins();
        if margins.iter().any(|&m| m < 0.0) {
            return invalid(format!(
                "flight_volume.spawn_margin {} exceeds a half extent",
                self.flight_volume.spawn_margin
            ));
        }
        // Rejection sampling only terminates if a far enough point exists for any ring position
        if margins.norm() <= 2.0 * race.ring_radius {
            return invalid(format!(
                "spawn volume {:?} is too small for ring radius {}",
                margins.as_slice(),
                race.ring_radius
            ));
        }
        let ring_bounds = margins.map(|m| (m - race.ring_radius).max(0.0));
        if race.min_ring_spacing >= ring_bounds.norm() {
            return invalid(format!(
                "race.min_ring_spacing {} cannot be met inside ring bounds {:?}",
                race.min_ring_spacing,
                ring_bounds.as_slice()
            ));
        }
        let quad = &self.quadrotor;
        if [
            quad.gravity,
            quad.max_rpm,
            quad.max_velocity,
            quad.max_angular_velocity,
            quad.thrust_to_weight,
            quad.motor_time_constant,
        ]
        .iter()
        .any(|&v| v <= 0.0)
        {
            return invalid("quadrotor parameters must be positive".to_string());
        }
        Ok(())
    }
    /// Half extents of the volume drones may spawn in
    pub fn spawn_margins(&self) -> Vector3<f32> {
        Vector3::from(self.flight_volume.half_extents).add_scalar(-self.flight_volume.spawn_margin)
    }
}
