//! Rings, the flight volume they live in, and the generator that lays out a course.
use crate::config::Config;
use crate::geometry::direction_from_yaw_pitch;
use crate::SimulationError;
use nalgebra::Vector3;
use rand::Rng;
use std::f32::consts::PI;

/// Reward for flying through a ring in the right direction
pub const PASS_REWARD: f32 = 1.0;
/// Reward for hitting a ring rim or crossing a ring backwards
pub const COLLISION_REWARD: f32 = -1.0;

/// A circular gate the drone has to fly through along its normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    /// Center of the ring
    pub position: Vector3<f32>,
    /// Unit normal, pointing to the exit side
    pub normal: Vector3<f32>,
    /// Radius of the ring
    pub radius: f32,
}

impl Default for Ring {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            normal: Vector3::x(),
            radius: 0.0,
        }
    }
}

/// Result of comparing one tick of drone motion against a ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RingOutcome {
    /// The drone flew through the ring opening in the normal direction
    Pass(f32),
    /// The drone hit the rim or went through the ring backwards
    Collision(f32),
    /// The drone did not cross the ring plane near the ring
    Neutral,
}

impl RingOutcome {
    /// Reward carried by the outcome, zero for `Neutral`
    pub fn reward(&self) -> f32 {
        match self {
            RingOutcome::Pass(r) | RingOutcome::Collision(r) => *r,
            RingOutcome::Neutral => 0.0,
        }
    }
    /// Decodes the single signed reward used by scalar ring checks
    pub fn from_reward(reward: f32) -> Self {
        if reward > 0.0 {
            RingOutcome::Pass(reward)
        } else if reward < 0.0 {
            RingOutcome::Collision(reward)
        } else {
            RingOutcome::Neutral
        }
    }
}

impl Ring {
    /// Creates a new ring, the normal is normalized
    pub fn new(position: Vector3<f32>, normal: Vector3<f32>, radius: f32) -> Self {
        Self {
            position,
            normal: normal.normalize(),
            radius,
        }
    }
    /// Signed distance of a point to the ring plane, positive on the exit side
    #[inline]
    pub fn signed_distance(&self, point: &Vector3<f32>) -> f32 {
        (point - self.position).dot(&self.normal)
    }
    /// Checks the segment travelled in one tick against the ring
    /// # Arguments
    /// * `prev_position` - Position at the start of the tick
    /// * `position` - Position at the end of the tick
    /// * `clearance` - Half size of the drone, the opening shrinks and the rim grows by this much
    /// # Returns
    /// * `Pass` if the segment crosses the opening from the entry to the exit side,
    ///   `Collision` if it crosses the rim or crosses the opening backwards, `Neutral` otherwise
    pub fn check_passage(
        &self,
        prev_position: &Vector3<f32>,
        position: &Vector3<f32>,
        clearance: f32,
    ) -> RingOutcome {
        let prev_dot = self.signed_distance(prev_position);
        let new_dot = self.signed_distance(position);
        let forward = prev_dot < 0.0 && new_dot > 0.0;
        let backward = prev_dot > 0.0 && new_dot < 0.0;
        if !(forward || backward) {
            return RingOutcome::Neutral;
        }
        let t = prev_dot / (prev_dot - new_dot);
        let crossing = prev_position + (position - prev_position) * t;
        let distance = (crossing - self.position).norm();
        if forward && distance < self.radius - clearance {
            RingOutcome::Pass(PASS_REWARD)
        } else if distance < self.radius + clearance {
            RingOutcome::Collision(COLLISION_REWARD)
        } else {
            RingOutcome::Neutral
        }
    }
}

/// Axis aligned box centered on the origin that bounds every episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightVolume {
    /// Half extent along x, y and z
    pub half_extents: Vector3<f32>,
    /// Half extents of the inner box used for spawning
    pub spawn_margins: Vector3<f32>,
}

impl FlightVolume {
    /// Creates a flight volume
    /// # Errors
    /// * Returns a ConfigError if an extent is not positive or a margin lies outside the volume
    pub fn new(
        half_extents: Vector3<f32>,
        spawn_margins: Vector3<f32>,
    ) -> Result<Self, SimulationError> {
        if half_extents.iter().any(|&e| e <= 0.0)
            || spawn_margins
                .iter()
                .zip(half_extents.iter())
                .any(|(&m, &e)| m < 0.0 || m > e)
        {
            return Err(SimulationError::ConfigError(format!(
                "Invalid flight volume {:?} with spawn margins {:?}",
                half_extents.as_slice(),
                spawn_margins.as_slice()
            )));
        }
        Ok(Self {
            half_extents,
            spawn_margins,
        })
    }
    pub fn from_config(config: &Config) -> Result<Self, SimulationError> {
        Self::new(
            Vector3::from(config.flight_volume.half_extents),
            config.spawn_margins(),
        )
    }
    /// Whether a point lies inside the volume, points on a wall are inside
    #[inline]
    pub fn contains(&self, point: &Vector3<f32>) -> bool {
        point
            .iter()
            .zip(self.half_extents.iter())
            .all(|(&p, &e)| p >= -e && p <= e)
    }
    /// Samples a point uniformly inside the spawn margins
    pub fn sample_spawn<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector3<f32> {
        sample_in_box(&self.spawn_margins, rng)
    }
}

#[inline]
fn sample_in_box<R: Rng + ?Sized>(half_extents: &Vector3<f32>, rng: &mut R) -> Vector3<f32> {
    half_extents.map(|e| rng.gen_range(-e..=e))
}

/// Lays out a course of rings inside a flight volume
#[derive(Debug, Clone, PartialEq)]
pub struct CourseGenerator {
    /// Half extents of the box ring centers are drawn from
    pub bounds: Vector3<f32>,
    /// Minimum distance between consecutive ring centers
    pub min_spacing: f32,
    /// Largest elevation of a ring normal
    pub max_pitch: f32,
    /// Radius shared by every ring of the course
    pub radius: f32,
}

impl CourseGenerator {
    /// Creates a course generator that keeps whole rings inside the spawn margins
    /// # Arguments
    /// * `volume` - The flight volume of the race
    /// * `radius` - Radius of every ring
    /// * `min_spacing` - Minimum distance between consecutive ring centers
    /// * `max_pitch` - Largest elevation of a ring normal in radians
    /// # Errors
    /// * Returns a ConfigError if the spacing can never be satisfied inside the volume
    pub fn new(
        volume: &FlightVolume,
        radius: f32,
        min_spacing: f32,
        max_pitch: f32,
    ) -> Result<Self, SimulationError> {
        let bounds = volume.spawn_margins.map(|m| (m - radius).max(0.0));
        // the farthest point from any center inside the box is at least a half diagonal away
        if radius <= 0.0 || min_spacing >= bounds.norm() {
            return Err(SimulationError::ConfigError(format!(
                "Ring spacing {} with radius {} does not fit in {:?}",
                min_spacing,
                radius,
                bounds.as_slice()
            )));
        }
        Ok(Self {
            bounds,
            min_spacing,
            max_pitch: max_pitch.abs(),
            radius,
        })
    }
    pub fn from_config(config: &Config, volume: &FlightVolume) -> Result<Self, SimulationError> {
        Self::new(
            volume,
            config.race.ring_radius,
            config.race.min_ring_spacing,
            config.race.max_ring_pitch,
        )
    }
    /// Overwrites every ring of the buffer with a new course
    /// # Arguments
    /// * `rings` - The course buffer, its length is the course length
    /// * `rng` - Source of randomness
    pub fn generate<R: Rng + ?Sized>(&self, rings: &mut [Ring], rng: &mut R) {
        let mut previous: Option<Vector3<f32>> = None;
        for ring in rings.iter_mut() {
            let position = loop {
                let candidate = sample_in_box(&self.bounds, rng);
                match previous {
                    Some(prev) if (candidate - prev).norm() < self.min_spacing => continue,
                    _ => break candidate,
                }
            };
            let yaw = rng.gen_range(-PI..=PI);
            let pitch = rng.gen_range(-self.max_pitch..=self.max_pitch);
            *ring = Ring {
                position,
                normal: direction_from_yaw_pitch(yaw, pitch),
                radius: self.radius,
            };
            previous = Some(position);
        }
    }
}
