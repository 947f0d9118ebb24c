//! Many independent races stepped in parallel.
use crate::config::Config;
use crate::dynamics::NUM_ROTORS;
use crate::observation::OBS_SIZE;
use crate::race::{DroneRace, StepResult};
use crate::stats::Log;
use crate::SimulationError;
use rayon::prelude::*;

/// A batch of races sharing nothing but their configuration
pub struct VecDroneRace {
    envs: Vec<DroneRace>,
    observations: Vec<f32>,
}

impl VecDroneRace {
    /// Creates `num_envs` races, race `i` is seeded with `seed + i`
    /// # Errors
    /// * Returns a ConfigError if `num_envs` is zero or the configuration is invalid
    pub fn new(config: &Config, num_envs: usize, seed: u64) -> Result<Self, SimulationError> {
        if num_envs == 0 {
            return Err(SimulationError::ConfigError(
                "num_envs must be positive".to_string(),
            ));
        }
        let envs = (0..num_envs)
            .map(|i| DroneRace::from_config(config, seed.wrapping_add(i as u64)))
            .collect::<Result<Vec<_>, SimulationError>>()?;
        let mut vec_env = Self {
            envs,
            observations: vec![0.0; num_envs * OBS_SIZE],
        };
        vec_env.gather_observations();
        Ok(vec_env)
    }
    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }
    /// Resets every race
    pub fn reset(&mut self) {
        self.envs.par_iter_mut().for_each(|env| env.reset());
        self.gather_observations();
    }
    /// Steps every race with its own actions
    /// # Arguments
    /// * `actions` - One action per race
    /// # Returns
    /// * The step results in race order
    /// # Errors
    /// * Returns an OtherError if the number of actions does not match the number of races
    pub fn step(
        &mut self,
        actions: &[[f32; NUM_ROTORS]],
    ) -> Result<Vec<StepResult>, SimulationError> {
        if actions.len() != self.envs.len() {
            return Err(SimulationError::OtherError(format!(
                "Expected {} actions, got {}",
                self.envs.len(),
                actions.len()
            )));
        }
        let results = self
            .envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .zip(self.observations.par_chunks_mut(OBS_SIZE))
            .map(|((env, action), obs)| {
                let result = env.step(action);
                obs.copy_from_slice(env.observations());
                result
            })
            .collect();
        Ok(results)
    }
    /// Observations of every race, `OBS_SIZE` floats per race
    pub fn observations(&self) -> &[f32] {
        &self.observations
    }
    /// Sums the statistics of every race and clears them
    pub fn aggregate_logs(&mut self) -> Log {
        self.envs.iter_mut().fold(Log::default(), |mut total, env| {
            total.merge(&env.take_log());
            total
        })
    }
    pub fn envs(&self) -> &[DroneRace] {
        &self.envs
    }
    pub fn envs_mut(&mut self) -> &mut [DroneRace] {
        &mut self.envs
    }
    fn gather_observations(&mut self) {
        self.observations
            .par_chunks_mut(OBS_SIZE)
            .zip(self.envs.par_iter())
            .for_each(|(obs, env)| obs.copy_from_slice(env.observations()));
    }
}
