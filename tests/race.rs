use nalgebra::Vector3;
use quad_race::config::Config;
use quad_race::course::{COLLISION_REWARD, PASS_REWARD};
use quad_race::observation::compute_observations;
use quad_race::race::OUT_OF_BOUNDS_REWARD;
use quad_race::{
    DroneParams, DroneRace, DroneState, FlightDynamics, NextRing, Ring, RingOutcome, Termination,
    NUM_ROTORS, OBS_SIZE,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// What a scripted drone does on one tick
#[derive(Clone, Copy)]
struct Tick {
    /// Teleport target, the drone stays put when `None`
    position: Option<Vector3<f32>>,
    outcome: RingOutcome,
}

/// A drone that replays a script instead of integrating physics
struct ScriptedDrone {
    state: DroneState,
    params: DroneParams,
    script: VecDeque<Tick>,
    outcome: RingOutcome,
}

impl ScriptedDrone {
    fn new(script: Vec<Tick>) -> Self {
        Self {
            state: DroneState::default(),
            params: DroneParams {
                arm_len: 0.1,
                mass: 0.1,
                max_velocity: 50.0,
                max_angular_velocity: 50.0,
                max_rpm: 750.0,
                k_thrust: 1e-6,
            },
            script: script.into(),
            outcome: RingOutcome::Neutral,
        }
    }
}

impl FlightDynamics for ScriptedDrone {
    fn init_drone(&mut self, size: f32, mass: f32) {
        self.params.arm_len = size;
        self.params.mass = mass;
        self.state = DroneState::default();
        self.outcome = RingOutcome::Neutral;
    }

    fn move_drone(&mut self, _actions: &[f32; NUM_ROTORS]) {
        let tick = self.script.pop_front().unwrap_or(Tick {
            position: None,
            outcome: RingOutcome::Neutral,
        });
        if let Some(position) = tick.position {
            self.state.position = position;
        }
        self.outcome = tick.outcome;
    }

    fn state(&self) -> &DroneState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DroneState {
        &mut self.state
    }

    fn params(&self) -> &DroneParams {
        &self.params
    }

    fn check_ring(&self, _ring: &Ring) -> RingOutcome {
        self.outcome
    }
}

fn outcomes(outcomes: &[RingOutcome]) -> Vec<Tick> {
    outcomes
        .iter()
        .map(|&outcome| Tick {
            position: None,
            outcome,
        })
        .collect()
}

fn scripted_race(config: &Config, script: Vec<Tick>) -> DroneRace<ScriptedDrone> {
    DroneRace::new(config, ScriptedDrone::new(script), 3).unwrap()
}

const IDLE: [f32; NUM_ROTORS] = [0.0; NUM_ROTORS];

fn expected_observations<D: FlightDynamics>(race: &DroneRace<D>, next: usize) -> [f32; OBS_SIZE] {
    let mut expected = [0.0; OBS_SIZE];
    compute_observations(
        &mut expected,
        race.drone().state(),
        race.drone().params(),
        race.current_ring(),
        &race.rings()[next],
        &race.volume().half_extents,
    );
    expected
}

#[test]
fn test_out_of_bounds_on_first_step() {
    let script = vec![Tick {
        position: Some(Vector3::new(100.0, 0.0, 0.0)),
        outcome: RingOutcome::Neutral,
    }];
    let mut race = scripted_race(&Config::default(), script);
    let result = race.step(&IDLE);
    assert!(result.terminal);
    assert_eq!(result.reward, OUT_OF_BOUNDS_REWARD);
    assert_eq!(result.termination, Some(Termination::OutOfBounds));
    let log = race.log();
    assert_eq!(log.n, 1.0);
    assert_eq!(log.oob, 1.0);
    assert_eq!(log.collision_rate, 0.0);
    assert_eq!(log.timeout, 0.0);
    assert_eq!(log.episode_length, 1.0);
    assert_eq!(race.tick(), 0);
    assert_eq!(race.moves_left(), race.max_moves());
}

#[test]
fn test_out_of_bounds_ignores_ring_outcome() {
    let script = vec![Tick {
        position: Some(Vector3::new(0.0, 0.0, -11.0)),
        outcome: RingOutcome::Pass(PASS_REWARD),
    }];
    let mut race = scripted_race(&Config::default(), script);
    let result = race.step(&IDLE);
    assert_eq!(result.termination, Some(Termination::OutOfBounds));
    assert_eq!(race.log().score, 0.0);
    assert_eq!(race.log().episode_return, OUT_OF_BOUNDS_REWARD);
}

#[test]
fn test_timeout_without_passing_rings() {
    let mut config = Config::default();
    config.race.max_moves = 3;
    let mut race = scripted_race(&config, Vec::new());
    for moves_left in [2, 1] {
        let result = race.step(&IDLE);
        assert!(!result.terminal);
        assert_eq!(result.reward, 0.0);
        assert_eq!(race.moves_left(), moves_left);
    }
    let result = race.step(&IDLE);
    assert!(result.terminal);
    assert_eq!(result.reward, 0.0);
    assert_eq!(result.termination, Some(Termination::Timeout));
    let log = race.log();
    assert_eq!(log.timeout, 1.0);
    assert_eq!(log.oob, 0.0);
    assert_eq!(log.collision_rate, 0.0);
    assert_eq!(log.episode_length, 3.0);
    assert_eq!(log.perf, 0.0);
    assert_eq!(race.moves_left(), 3);
}

#[test]
fn test_passing_every_ring_completes_course() {
    let config = Config::default();
    let mut race = scripted_race(&config, outcomes(&[RingOutcome::Pass(PASS_REWARD); 5]));
    for ring_idx in 1..5 {
        let result = race.step(&IDLE);
        assert!(!result.terminal);
        assert_eq!(result.reward, PASS_REWARD);
        assert_eq!(race.ring_idx(), ring_idx);
        assert_eq!(race.score(), ring_idx as u32);
    }
    let result = race.step(&IDLE);
    assert!(result.terminal);
    assert_eq!(result.reward, PASS_REWARD);
    assert_eq!(result.termination, Some(Termination::CourseComplete));
    let log = race.log();
    assert_eq!(log.n, 1.0);
    assert_eq!(log.score, 5.0);
    assert_eq!(log.perf, 1.0);
    assert_eq!(log.episode_return, 5.0);
    assert_eq!(log.oob + log.collision_rate + log.timeout, 0.0);
    assert_eq!(race.ring_idx(), 0);
}

#[test]
fn test_last_ring_on_last_move_is_a_timeout() {
    let mut config = Config::default();
    config.race.max_rings = 2;
    config.race.max_moves = 2;
    let mut race = scripted_race(&config, outcomes(&[RingOutcome::Pass(PASS_REWARD); 2]));
    race.step(&IDLE);
    let result = race.step(&IDLE);
    assert_eq!(result.termination, Some(Termination::Timeout));
    assert_eq!(race.log().timeout, 1.0);
    assert_eq!(race.log().score, 2.0);
    assert_eq!(race.log().perf, 1.0);
}

#[test]
fn test_collision_resets_with_fresh_observations() {
    let script = outcomes(&[
        RingOutcome::Pass(PASS_REWARD),
        RingOutcome::Collision(COLLISION_REWARD),
    ]);
    let mut race = scripted_race(&Config::default(), script);
    race.step(&IDLE);
    let result = race.step(&IDLE);
    assert!(result.terminal);
    assert_eq!(result.reward, COLLISION_REWARD);
    assert_eq!(result.termination, Some(Termination::Collision));
    let log = race.log();
    assert_eq!(log.collision_rate, 1.0);
    assert_eq!(log.score, 1.0);
    assert_eq!(log.episode_return, 0.0);
    assert!((log.perf - 0.2).abs() < 1e-6);
    assert_eq!(race.ring_idx(), 0);
    assert_eq!(race.tick(), 0);
    assert_eq!(*race.observations(), expected_observations(&race, 0));
}

#[test]
fn test_next_ring_slots() {
    let mut race = scripted_race(&Config::default(), Vec::new());
    let obs = *race.observations();
    assert_eq!(obs[0..6], obs[6..12]);

    let mut config = Config::default();
    config.race.next_ring = NextRing::Lookahead;
    race = scripted_race(&config, outcomes(&[RingOutcome::Pass(PASS_REWARD); 4]));
    assert_eq!(*race.observations(), expected_observations(&race, 1));
    for _ in 0..4 {
        race.step(&IDLE);
    }
    // the last ring is its own lookahead
    assert_eq!(race.ring_idx(), 4);
    assert_eq!(*race.observations(), expected_observations(&race, 4));
}

#[test]
fn test_every_episode_terminates_once() {
    let mut race = DroneRace::from_config(&Config::default(), 11).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut terminals = 0;
    for _ in 0..5000 {
        let hover = race.drone().hover_action();
        let actions = [(); NUM_ROTORS].map(|_| hover + rng.gen_range(-0.5..0.5));
        let result = race.step(&actions);
        assert_eq!(result.terminal, result.termination.is_some());
        if let Some(termination) = result.termination {
            terminals += 1;
            let (oob, collision, timeout) = termination.flags();
            assert!(oob + collision + timeout <= 1.0);
            assert_eq!(race.tick(), 0);
        }
        let obs = race.observations();
        assert_eq!(obs.len(), OBS_SIZE);
        assert!(obs.iter().all(|v| v.is_finite()));
        let quat_norm = obs[21..25].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((quat_norm - 1.0).abs() < 1e-4);
        assert!(race.ring_idx() < race.max_rings());
    }
    let log = race.log();
    assert_eq!(log.n, terminals as f32);
    assert!(log.oob + log.collision_rate + log.timeout <= log.n);
}

#[test]
fn test_independent_instances() {
    let config = Config::default();
    let mut a = DroneRace::from_config(&config, 21).unwrap();
    let mut b = DroneRace::from_config(&config, 21).unwrap();
    let mut other = DroneRace::from_config(&config, 22).unwrap();
    let hover = a.drone().hover_action();
    for _ in 0..100 {
        other.step(&[1.0; NUM_ROTORS]);
        a.step(&[hover; NUM_ROTORS]);
    }
    for _ in 0..100 {
        b.step(&[hover; NUM_ROTORS]);
    }
    assert_eq!(a.observations(), b.observations());
    assert_eq!(a.log(), b.log());
}
