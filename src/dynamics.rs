//! Flight dynamics seen by the race engine, and the rotor-level quadrotor that implements it.
use crate::config::QuadrotorConfig;
use crate::course::{Ring, RingOutcome};
use crate::geometry::{clamp_norm, quat_rotate};
use crate::SimulationError;
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Number of rotors, and of entries in an action vector
pub const NUM_ROTORS: usize = 4;

/// Physical state of a drone as published by a dynamics model
#[derive(Debug, Clone, PartialEq)]
pub struct DroneState {
    /// Current position in the world frame
    pub position: Vector3<f32>,
    /// Current velocity in the world frame
    pub velocity: Vector3<f32>,
    /// Current angular velocity in the body frame
    pub angular_velocity: Vector3<f32>,
    /// Body to world rotation
    pub orientation: UnitQuaternion<f32>,
    /// Rotor speeds in RPM, within `[0, max_rpm]`
    pub rpms: [f32; NUM_ROTORS],
    /// Position at the end of the previous tick
    pub prev_position: Vector3<f32>,
}

impl Default for DroneState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            rpms: [0.0; NUM_ROTORS],
            prev_position: Vector3::zeros(),
        }
    }
}

/// Static parameters of a drone, fixed between two `init_drone` calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroneParams {
    /// Distance from the center to each rotor in m
    pub arm_len: f32,
    /// Mass in kg
    pub mass: f32,
    /// Largest speed in m/s
    pub max_velocity: f32,
    /// Largest body rate per axis in rad/s
    pub max_angular_velocity: f32,
    /// Largest rotor speed
    pub max_rpm: f32,
    /// Thrust per squared rotor speed
    pub k_thrust: f32,
}

/// Interface between the race engine and a flight dynamics model
pub trait FlightDynamics {
    /// Re-initializes the drone with the given size and mass, resting at the origin
    fn init_drone(&mut self, size: f32, mass: f32);
    /// Advances the drone by one tick
    /// # Arguments
    /// * `actions` - One command per rotor, nominally in `[-1, 1]`
    fn move_drone(&mut self, actions: &[f32; NUM_ROTORS]);
    fn state(&self) -> &DroneState;
    fn state_mut(&mut self) -> &mut DroneState;
    fn params(&self) -> &DroneParams;
    /// Compares the motion of the last tick against a ring without changing the drone
    fn check_ring(&self, ring: &Ring) -> RingOutcome {
        let state = self.state();
        ring.check_passage(&state.prev_position, &state.position, self.params().arm_len)
    }
    /// Moves the drone to a position and forgets its previous motion
    fn place(&mut self, position: Vector3<f32>) {
        let state = self.state_mut();
        state.position = position;
        state.prev_position = position;
    }
}

/// Represents a quadrotor in "+" configuration driven by individual rotor commands
/// Rotor 0 is at +x, rotor 1 at -x, rotor 2 at +y and rotor 3 at -y in the body frame
/// # Example
/// ```
/// use quad_race::{config::QuadrotorConfig, FlightDynamics, Quadrotor};
/// let mut quad = Quadrotor::new(&QuadrotorConfig::default(), 0.02).unwrap();
/// quad.init_drone(0.3, 0.1);
/// quad.move_drone(&[0.0; 4]);
/// assert!((quad.state().orientation.norm() - 1.0).abs() < 1e-5);
/// ```
#[derive(Debug, Clone)]
pub struct Quadrotor {
    pub state: DroneState,
    pub params: DroneParams,
    /// Simulation time step in seconds
    pub time_step: f32,
    /// Gravitational acceleration in m/s^2
    pub gravity: f32,
    /// Ratio of full-throttle thrust to weight
    pub thrust_to_weight: f32,
    /// Rotor response time in seconds
    pub motor_time_constant: f32,
    /// Linear drag coefficient
    pub linear_drag: f32,
    /// Angular drag coefficient
    pub angular_drag: f32,
    /// Reaction torque per unit of thrust
    pub yaw_torque_ratio: f32,
    /// Inertia matrix of the quadrotor
    pub inertia_matrix: Matrix3<f32>,
    /// Inverse of the inertia matrix
    pub inertia_matrix_inv: Matrix3<f32>,
}

impl Quadrotor {
    /// Creates a new Quadrotor, initialized with a unit size
    /// # Arguments
    /// * `config` - Physical constants of the model
    /// * `time_step` - The simulation time step in seconds
    /// # Returns
    /// * A new Quadrotor instance
    /// # Errors
    /// * Returns a ConfigError if a constant is not positive
    pub fn new(config: &QuadrotorConfig, time_step: f32) -> Result<Self, SimulationError> {
        if time_step <= 0.0
            || config.max_rpm <= 0.0
            || config.motor_time_constant <= 0.0
            || config.thrust_to_weight <= 0.0
        {
            return Err(SimulationError::ConfigError(format!(
                "Invalid quadrotor constants {:?} with time step {}",
                config, time_step
            )));
        }
        let mut quad = Self {
            state: DroneState::default(),
            params: DroneParams {
                arm_len: 1.0,
                mass: 1.0,
                max_velocity: config.max_velocity,
                max_angular_velocity: config.max_angular_velocity,
                max_rpm: config.max_rpm,
                k_thrust: 0.0,
            },
            time_step,
            gravity: config.gravity,
            thrust_to_weight: config.thrust_to_weight,
            motor_time_constant: config.motor_time_constant,
            linear_drag: config.linear_drag,
            angular_drag: config.angular_drag,
            yaw_torque_ratio: config.yaw_torque_ratio,
            inertia_matrix: Matrix3::identity(),
            inertia_matrix_inv: Matrix3::identity(),
        };
        quad.init_drone(1.0, 1.0);
        Ok(quad)
    }
    /// Rotor speed at which the total thrust balances gravity
    pub fn hover_rpm(&self) -> f32 {
        (self.params.mass * self.gravity / (NUM_ROTORS as f32 * self.params.k_thrust)).sqrt()
    }
    /// Action that commands every rotor to the hover speed
    pub fn hover_action(&self) -> f32 {
        2.0 * self.hover_rpm() / self.params.max_rpm - 1.0
    }
    /// Thrust of each rotor at the current rotor speeds
    pub fn rotor_thrusts(&self) -> [f32; NUM_ROTORS] {
        self.state.rpms.map(|rpm| self.params.k_thrust * rpm * rpm)
    }
    /// Rotor hub positions in the body frame
    pub fn rotor_offsets(&self) -> [Vector3<f32>; NUM_ROTORS] {
        let r = self.params.arm_len;
        [
            Vector3::new(r, 0.0, 0.0),
            Vector3::new(-r, 0.0, 0.0),
            Vector3::new(0.0, r, 0.0),
            Vector3::new(0.0, -r, 0.0),
        ]
    }
    /// Moves the rotor speeds towards the commanded speeds
    fn update_rotors(&mut self, actions: &[f32; NUM_ROTORS]) {
        let alpha = (self.time_step / self.motor_time_constant).min(1.0);
        let max_rpm = self.params.max_rpm;
        for (rpm, &action) in self.state.rpms.iter_mut().zip(actions.iter()) {
            let target = (action.clamp(-1.0, 1.0) + 1.0) * 0.5 * max_rpm;
            *rpm = (*rpm + (target - *rpm) * alpha).clamp(0.0, max_rpm);
        }
    }
    /// Updates the rigid body with the current rotor thrusts
    fn update_dynamics_with_thrusts(&mut self, thrusts: &[f32; NUM_ROTORS]) {
        let (mass, arm_len, dt) = (self.params.mass, self.params.arm_len, self.time_step);
        let total_thrust: f32 = thrusts.iter().sum();
        let gravity_force = Vector3::new(0.0, 0.0, -mass * self.gravity);
        let drag_force = -self.linear_drag * self.state.velocity;
        let thrust_world = quat_rotate(&self.state.orientation, &Vector3::new(0.0, 0.0, total_thrust));
        let acceleration = (thrust_world + gravity_force + drag_force) / mass;
        self.state.velocity = clamp_norm(
            self.state.velocity + acceleration * dt,
            self.params.max_velocity,
        );
        self.state.position += self.state.velocity * dt;
        let control_torque = Vector3::new(
            arm_len * (thrusts[2] - thrusts[3]),
            arm_len * (thrusts[1] - thrusts[0]),
            self.yaw_torque_ratio * (thrusts[0] + thrusts[1] - thrusts[2] - thrusts[3]),
        ) - self.angular_drag * self.state.angular_velocity;
        let inertia_angular_velocity = self.inertia_matrix * self.state.angular_velocity;
        let gyroscopic_torque = self
            .state
            .angular_velocity
            .cross(&inertia_angular_velocity);
        let angular_acceleration = self.inertia_matrix_inv * (control_torque - gyroscopic_torque);
        let max_omega = self.params.max_angular_velocity;
        self.state.angular_velocity = (self.state.angular_velocity + angular_acceleration * dt)
            .map(|w| w.clamp(-max_omega, max_omega));
        self.state.orientation *=
            UnitQuaternion::from_scaled_axis(self.state.angular_velocity * dt);
        self.state.orientation.renormalize_fast();
    }
}

impl FlightDynamics for Quadrotor {
    fn init_drone(&mut self, size: f32, mass: f32) {
        let arm_len = size;
        // four point rotors of mass m/4 at distance L from the center
        let ixx = 0.5 * mass * arm_len * arm_len;
        let izz = mass * arm_len * arm_len;
        let inertia = Vector3::new(ixx, ixx, izz);
        self.inertia_matrix = Matrix3::from_diagonal(&inertia);
        self.inertia_matrix_inv = Matrix3::from_diagonal(&inertia.map(|i| 1.0 / i));
        self.params.arm_len = arm_len;
        self.params.mass = mass;
        self.params.k_thrust = self.thrust_to_weight * mass * self.gravity
            / (NUM_ROTORS as f32 * self.params.max_rpm * self.params.max_rpm);
        self.state = DroneState {
            rpms: [self.hover_rpm(); NUM_ROTORS],
            ..DroneState::default()
        };
    }

    fn move_drone(&mut self, actions: &[f32; NUM_ROTORS]) {
        self.update_rotors(actions);
        let thrusts = self.rotor_thrusts();
        self.update_dynamics_with_thrusts(&thrusts);
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn quad(size: f32) -> Quadrotor {
        let mut quad = Quadrotor::new(&QuadrotorConfig::default(), 0.02).unwrap();
        quad.init_drone(size, 0.1);
        quad
    }

    #[test]
    fn test_init_is_deterministic() {
        let (a, b) = (quad(0.4), quad(0.4));
        assert_eq!(a.params, b.params);
        assert_eq!(a.state, b.state);
        assert_eq!(a.params.arm_len, 0.4);
        assert_eq!(a.params.mass, 0.1);
        assert_eq!(a.state.position, Vector3::zeros());
        assert_eq!(a.state.prev_position, Vector3::zeros());
    }

    #[test]
    fn test_rejects_invalid_constants() {
        assert!(Quadrotor::new(&QuadrotorConfig::default(), 0.0).is_err());
        let config = QuadrotorConfig {
            max_rpm: 0.0,
            ..QuadrotorConfig::default()
        };
        assert!(Quadrotor::new(&config, 0.02).is_err());
    }

    #[test]
    fn test_hover_holds_altitude() {
        let mut quad = quad(0.3);
        let action = quad.hover_action();
        assert!(action > -1.0 && action < 1.0);
        for _ in 0..100 {
            quad.move_drone(&[action; NUM_ROTORS]);
        }
        assert!(quad.state.position.norm() < 1e-2);
        assert!(quad.state.angular_velocity.norm() < 1e-4);
    }

    #[test]
    fn test_full_throttle_climbs_and_idle_falls() {
        let mut up = quad(0.3);
        let mut down = quad(0.3);
        for _ in 0..50 {
            up.move_drone(&[1.0; NUM_ROTORS]);
            down.move_drone(&[-1.0; NUM_ROTORS]);
        }
        assert!(up.state.position.z > 0.5);
        assert!(down.state.position.z < -0.5);
        assert!(up.state.rpms.iter().all(|&rpm| rpm <= up.params.max_rpm));
        assert!(down.state.rpms.iter().all(|&rpm| rpm >= 0.0));
    }

    #[test]
    fn test_differential_thrust_rolls_towards_weaker_side() {
        let mut quad = quad(0.3);
        let hover = quad.hover_action();
        quad.move_drone(&[hover, hover, hover + 0.2, hover - 0.2]);
        assert!(quad.state.angular_velocity.x > 0.0);
        assert!(quad.state.angular_velocity.y.abs() < 1e-6);
    }

    #[test]
    fn test_random_actions_keep_state_bounded() {
        let mut quad = quad(0.2);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..2000 {
            let actions = [(); NUM_ROTORS].map(|_| rng.gen_range(-1.5..1.5));
            quad.move_drone(&actions);
            assert!((quad.state.orientation.norm() - 1.0).abs() < 1e-4);
            assert!(quad.state.velocity.norm() <= quad.params.max_velocity + 1e-3);
            assert!(quad
                .state
                .angular_velocity
                .iter()
                .all(|w| w.abs() <= quad.params.max_angular_velocity));
            assert!(quad
                .state
                .rpms
                .iter()
                .all(|&rpm| (0.0..=quad.params.max_rpm).contains(&rpm)));
        }
    }

    #[test]
    fn test_check_ring_uses_previous_position() {
        let mut quad = quad(0.1);
        let ring = Ring::new(Vector3::new(0.0, 0.0, 0.5), Vector3::z(), 2.0);
        quad.place(Vector3::new(0.0, 0.0, 0.4));
        assert_eq!(quad.check_ring(&ring), RingOutcome::Neutral);
        quad.state.position = Vector3::new(0.0, 0.0, 0.6);
        assert!(matches!(quad.check_ring(&ring), RingOutcome::Pass(_)));
        // checking does not move the drone
        assert_eq!(quad.state.prev_position, Vector3::new(0.0, 0.0, 0.4));
    }
}
