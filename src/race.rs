//! The per-instance episode state machine: reset, step, reward and termination.
use crate::config::Config;
use crate::course::{CourseGenerator, FlightVolume, Ring, RingOutcome};
use crate::dynamics::{FlightDynamics, Quadrotor, NUM_ROTORS};
use crate::observation::{compute_observations, NextRing, OBS_SIZE};
use crate::stats::{EpisodeSummary, Log, Termination};
use crate::SimulationError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Reward for leaving the flight volume
pub const OUT_OF_BOUNDS_REWARD: f32 = -1.0;

/// What the caller sees after one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// Reward of this tick, including the terminal reward
    pub reward: f32,
    /// Whether the episode ended on this tick, the race has already been reset
    pub terminal: bool,
    /// Why the episode ended, `None` while it continues
    pub termination: Option<Termination>,
}

/// One racing episode after another for a single drone
///
/// A terminating step resets the race before returning, so the observations read after
/// `step` always belong to a running episode.
pub struct DroneRace<D = Quadrotor> {
    observations: [f32; OBS_SIZE],
    log: Log,
    tick: u32,
    score: u32,
    episodic_return: f32,
    ring_idx: usize,
    rings: Vec<Ring>,
    max_moves: u32,
    moves_left: u32,
    drone: D,
    volume: FlightVolume,
    course: CourseGenerator,
    drone_size_range: [f32; 2],
    drone_mass: f32,
    next_ring: NextRing,
    rng: ChaCha8Rng,
}

impl DroneRace<Quadrotor> {
    /// Creates a race with the rotor-level quadrotor model of the configuration
    /// # Errors
    /// * Returns an error if the configuration is invalid or the course cannot be allocated
    pub fn from_config(config: &Config, seed: u64) -> Result<Self, SimulationError> {
        let quad = Quadrotor::new(&config.quadrotor, config.simulation.time_step)?;
        Self::new(config, quad, seed)
    }
}

impl<D: FlightDynamics> DroneRace<D> {
    /// Creates a race and resets it into its first episode
    /// # Arguments
    /// * `config` - The race configuration
    /// * `drone` - The dynamics model to fly
    /// * `seed` - Seed of the race random number generator
    /// # Returns
    /// * A new DroneRace instance
    /// # Errors
    /// * Returns a ConfigError if the configuration is invalid
    /// * Returns an AllocationError if the ring buffer cannot be allocated
    pub fn new(config: &Config, drone: D, seed: u64) -> Result<Self, SimulationError> {
        config.validate()?;
        let volume = FlightVolume::from_config(config)?;
        let course = CourseGenerator::from_config(config, &volume)?;
        let max_rings = config.race.max_rings;
        let mut rings = Vec::new();
        rings.try_reserve_exact(max_rings)?;
        rings.resize(max_rings, Ring::default());
        let mut race = Self {
            observations: [0.0; OBS_SIZE],
            log: Log::default(),
            tick: 0,
            score: 0,
            episodic_return: 0.0,
            ring_idx: 0,
            rings,
            max_moves: config.race.max_moves,
            moves_left: config.race.max_moves,
            drone,
            volume,
            course,
            drone_size_range: config.race.drone_size_range,
            drone_mass: config.race.drone_mass,
            next_ring: config.race.next_ring,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        race.reset();
        log::debug!(
            "Race created with {} rings, {} moves, seed {}",
            max_rings,
            race.max_moves,
            seed
        );
        Ok(race)
    }
    /// Starts a new episode on a fresh course
    pub fn reset(&mut self) {
        self.tick = 0;
        self.score = 0;
        self.episodic_return = 0.0;
        self.moves_left = self.max_moves;
        self.ring_idx = 0;
        self.course.generate(&mut self.rings, &mut self.rng);
        let [min_size, max_size] = self.drone_size_range;
        let size = self.rng.gen_range(min_size..=max_size);
        self.drone.init_drone(size, self.drone_mass);
        let first = self.rings[0];
        let spawn = loop {
            let candidate = self.volume.sample_spawn(&mut self.rng);
            if (candidate - first.position).norm() >= 2.0 * first.radius {
                break candidate;
            }
        };
        self.drone.place(spawn);
        self.compute_observations();
    }
    /// Advances the race by one tick
    /// # Arguments
    /// * `actions` - One command per rotor in `[-1, 1]`
    /// # Returns
    /// * The reward and terminal flag of the tick, the race is reset when it is terminal
    pub fn step(&mut self, actions: &[f32; NUM_ROTORS]) -> StepResult {
        self.tick += 1;
        self.drone.move_drone(actions);
        if !self.volume.contains(&self.drone.state().position) {
            self.episodic_return += OUT_OF_BOUNDS_REWARD;
            return self.terminate(OUT_OF_BOUNDS_REWARD, Termination::OutOfBounds);
        }
        let outcome = self.drone.check_ring(&self.rings[self.ring_idx]);
        let reward = outcome.reward();
        self.episodic_return += reward;
        match outcome {
            RingOutcome::Pass(_) => {
                self.score += 1;
                self.ring_idx += 1;
            }
            RingOutcome::Collision(_) => return self.terminate(reward, Termination::Collision),
            RingOutcome::Neutral => {}
        }
        self.moves_left -= 1;
        if self.moves_left == 0 {
            return self.terminate(reward, Termination::Timeout);
        }
        if self.ring_idx == self.rings.len() {
            return self.terminate(reward, Termination::CourseComplete);
        }
        let state = self.drone.state_mut();
        state.prev_position = state.position;
        self.compute_observations();
        StepResult {
            reward,
            terminal: false,
            termination: None,
        }
    }
    /// Records the finished episode and starts the next one
    fn terminate(&mut self, reward: f32, termination: Termination) -> StepResult {
        let summary = self.episode_summary(termination);
        log::trace!(
            "Tick: {},\tEpisode ended by {:?} with score {} and return {:.2}",
            summary.length,
            termination,
            summary.score,
            summary.episode_return
        );
        self.log.record(&summary);
        self.reset();
        StepResult {
            reward,
            terminal: true,
            termination: Some(termination),
        }
    }
    fn episode_summary(&self, termination: Termination) -> EpisodeSummary {
        EpisodeSummary {
            score: self.score,
            episode_return: self.episodic_return,
            length: self.tick,
            progress: self.ring_idx as f32 / self.rings.len() as f32,
            termination,
        }
    }
    fn compute_observations(&mut self) {
        let next_idx = self.next_ring.index(self.ring_idx, self.rings.len());
        compute_observations(
            &mut self.observations,
            self.drone.state(),
            self.drone.params(),
            &self.rings[self.ring_idx],
            &self.rings[next_idx],
            &self.volume.half_extents,
        );
    }
    /// Restarts the random number generator, the running episode is kept
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }
    pub fn observations(&self) -> &[f32; OBS_SIZE] {
        &self.observations
    }
    /// Ticks since the last reset
    pub fn tick(&self) -> u32 {
        self.tick
    }
    pub fn score(&self) -> u32 {
        self.score
    }
    /// Index of the ring to pass next
    pub fn ring_idx(&self) -> usize {
        self.ring_idx
    }
    pub fn max_rings(&self) -> usize {
        self.rings.len()
    }
    pub fn moves_left(&self) -> u32 {
        self.moves_left
    }
    pub fn max_moves(&self) -> u32 {
        self.max_moves
    }
    pub fn episodic_return(&self) -> f32 {
        self.episodic_return
    }
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }
    pub fn current_ring(&self) -> &Ring {
        &self.rings[self.ring_idx]
    }
    pub fn volume(&self) -> &FlightVolume {
        &self.volume
    }
    pub fn drone(&self) -> &D {
        &self.drone
    }
    /// Mutable access to the dynamics model, observations are refreshed on the next step
    pub fn drone_mut(&mut self) -> &mut D {
        &mut self.drone
    }
    /// Statistics of the episodes finished since the last `take_log`
    pub fn log(&self) -> &Log {
        &self.log
    }
    /// Returns the accumulated statistics and clears them
    pub fn take_log(&mut self) -> Log {
        std::mem::take(&mut self.log)
    }
}
