//! Runs a vectorized batch of ring races with a noisy hover policy and reports the
//! episode statistics.
//!
//! Usage: `quad_race [config.yaml]`, the configuration defaults to `config/race.yaml`.
use quad_race::config::Config;
use quad_race::render::RaceViewer;
use quad_race::{Log, SimulationError, VecDroneRace, NUM_ROTORS};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

fn main() -> Result<(), SimulationError> {
    env_logger::builder()
        .parse_env(env_logger::Env::default().default_filter_or("info"))
        .init();
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/race.yaml".to_string());
    let config = Config::from_yaml(&config_path)?;
    log::info!("Loaded configuration from {}", config_path);
    let rollout = &config.rollout;
    let mut vec_env = VecDroneRace::new(&config, rollout.num_envs, rollout.seed)?;
    let mut viewer = if config.render.enabled {
        if config.render.env_index >= vec_env.num_envs() {
            return Err(SimulationError::ConfigError(format!(
                "render.env_index {} is out of range for {} races",
                config.render.env_index,
                vec_env.num_envs()
            )));
        }
        let race = &vec_env.envs()[config.render.env_index];
        Some(RaceViewer::spawn(race.volume(), config.render.trail_min_distance)?)
    } else {
        None
    };
    let noise = Normal::new(0.0, rollout.hover_noise_std)?;
    let mut rng = ChaCha8Rng::seed_from_u64(rollout.seed);
    let mut actions = vec![[0.0; NUM_ROTORS]; vec_env.num_envs()];
    let mut total = Log::default();
    let every_n_steps = config.render.every_n_steps.max(1);
    let log_interval = rollout.log_interval.max(1);
    for step in 0..rollout.total_steps {
        // the hover command follows the drone size, which changes on every reset
        for (action, race) in actions.iter_mut().zip(vec_env.envs()) {
            let hover = race.drone().hover_action();
            *action = [(); NUM_ROTORS].map(|_| hover + noise.sample(&mut rng));
        }
        let results = vec_env.step(&actions)?;
        if let Some(viewer) = viewer.as_mut() {
            let index = config.render.env_index;
            let terminal = results[index].terminal;
            if terminal || step % every_n_steps == 0 {
                viewer.log_race(step, &vec_env.envs()[index], terminal)?;
            }
        }
        if (step + 1) % log_interval == 0 {
            let log = vec_env.aggregate_logs();
            total.merge(&log);
            let summary = log
                .mean()
                .fields()
                .iter()
                .map(|(name, value)| format!("{}: {:.3}", name, value))
                .collect::<Vec<_>>()
                .join(",\t");
            log::info!("Step: {},\t{}", step + 1, summary);
        }
    }
    total.merge(&vec_env.aggregate_logs());
    println!("{}", serde_yaml::to_string(&total.mean())?);
    Ok(())
}
