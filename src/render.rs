//! Optional visualization of one race in the rerun viewer. Nothing here feeds back into the
//! simulation, a `RaceViewer` can be created and dropped at any time.
use crate::course::{FlightVolume, Ring};
use crate::dynamics::{FlightDynamics, Quadrotor};
use crate::geometry::{perpendicular_basis, quat_rotate};
use crate::race::DroneRace;
use crate::SimulationError;
use nalgebra::Vector3;

/// Number of segments used to draw a ring
const RING_SEGMENTS: usize = 32;

/// A struct to hold the recent path of the drone
pub struct Trail {
    /// A vector of 3D points
    pub points: Vec<Vector3<f32>>,
    /// The last point that was logged
    pub last_logged_point: Vector3<f32>,
    /// The minimum distance between points to log
    pub min_distance_threshold: f32,
}

impl Trail {
    /// Create a new Trail instance
    /// # Arguments
    /// * `initial_point` - The initial point to add to the trail
    /// * `min_distance_threshold` - The minimum distance between two points
    pub fn new(initial_point: Vector3<f32>, min_distance_threshold: f32) -> Self {
        Self {
            points: vec![initial_point],
            last_logged_point: initial_point,
            min_distance_threshold,
        }
    }
    /// Add a point to the trail if it is further than the minimum distance threshold
    /// # Returns
    /// * `true` if the point was added, `false` otherwise
    pub fn add_point(&mut self, point: Vector3<f32>) -> bool {
        if (point - self.last_logged_point).norm() > self.min_distance_threshold {
            self.points.push(point);
            self.last_logged_point = point;
            true
        } else {
            false
        }
    }
    /// Drops the path and restarts it at `point`
    pub fn restart(&mut self, point: Vector3<f32>) {
        self.points.clear();
        self.points.push(point);
        self.last_logged_point = point;
    }
}

/// Points along the rim of a ring, the first point is repeated to close the loop
pub fn ring_outline(ring: &Ring) -> Vec<(f32, f32, f32)> {
    let (u, v) = perpendicular_basis(&ring.normal);
    (0..=RING_SEGMENTS)
        .map(|i| {
            let angle = 2.0 * std::f32::consts::PI * i as f32 / RING_SEGMENTS as f32;
            let p = ring.position + ring.radius * (angle.cos() * u + angle.sin() * v);
            (p.x, p.y, p.z)
        })
        .collect()
}

/// Streams one race to a rerun recording
pub struct RaceViewer {
    rec: rerun::RecordingStream,
    trail: Trail,
}

impl RaceViewer {
    /// Spawns a rerun viewer and logs the static scene
    /// # Errors
    /// * If the viewer cannot be spawned or the scene cannot be logged
    pub fn spawn(volume: &FlightVolume, trail_min_distance: f32) -> Result<Self, SimulationError> {
        let rec = rerun::RecordingStreamBuilder::new("quad_race").spawn()?;
        Self::with_recording(rec, volume, trail_min_distance)
    }
    /// Uses an existing recording stream and logs the static scene
    pub fn with_recording(
        rec: rerun::RecordingStream,
        volume: &FlightVolume,
        trail_min_distance: f32,
    ) -> Result<Self, SimulationError> {
        log_flight_volume(&rec, volume)?;
        Ok(Self {
            rec,
            trail: Trail::new(Vector3::zeros(), trail_min_distance),
        })
    }
    /// Logs the state of the race at a global step
    /// # Arguments
    /// * `step` - Global step used as the timeline
    /// * `race` - The race to draw
    /// * `terminal` - Whether the last step ended an episode, which restarts the trail
    /// # Errors
    /// * If the data cannot be logged to the recording stream
    pub fn log_race(
        &mut self,
        step: usize,
        race: &DroneRace<Quadrotor>,
        terminal: bool,
    ) -> Result<(), SimulationError> {
        self.rec.set_time_sequence("step", step as i64);
        let position = race.drone().state().position;
        if terminal {
            self.trail.restart(position);
        } else if self.trail.add_point(position) {
            log_trail(&self.rec, &self.trail)?;
        }
        log_course(&self.rec, race.rings(), race.ring_idx())?;
        log_drone(&self.rec, race.drone())?;
        for (name, value) in [
            ("race/moves_left", race.moves_left() as f64),
            ("race/targets_left", (race.max_rings() - race.ring_idx()) as f64),
            ("race/episode_return", race.episodic_return() as f64),
            ("race/speed", race.drone().state().velocity.norm() as f64),
        ] {
            self.rec.log(name, &rerun::Scalar::new(value))?;
        }
        Ok(())
    }
}

/// Log the flight volume box to the rerun recording stream
/// # Errors
/// * If the data cannot be logged to the recording stream
pub fn log_flight_volume(
    rec: &rerun::RecordingStream,
    volume: &FlightVolume,
) -> Result<(), SimulationError> {
    let half = volume.half_extents;
    rec.log_static(
        "world/volume",
        &rerun::Boxes3D::from_centers_and_half_sizes(
            [rerun::external::glam::Vec3::ZERO],
            [rerun::external::glam::Vec3::new(half.x, half.y, half.z)],
        )
        .with_colors([rerun::Color::from_rgb(255, 255, 255)]),
    )?;
    Ok(())
}

/// Log the course rings, the ring to pass next is drawn in green
/// # Errors
/// * If the data cannot be logged to the recording stream
pub fn log_course(
    rec: &rerun::RecordingStream,
    rings: &[Ring],
    ring_idx: usize,
) -> Result<(), SimulationError> {
    let outlines: Vec<Vec<(f32, f32, f32)>> = rings.iter().map(ring_outline).collect();
    let colors: Vec<rerun::Color> = (0..rings.len())
        .map(|i| match i.cmp(&ring_idx) {
            std::cmp::Ordering::Less => rerun::Color::from_rgb(80, 80, 80),
            std::cmp::Ordering::Equal => rerun::Color::from_rgb(0, 255, 0),
            std::cmp::Ordering::Greater => rerun::Color::from_rgb(0, 128, 255),
        })
        .collect();
    rec.log(
        "world/course",
        &rerun::LineStrips3D::new(outlines)
            .with_colors(colors)
            .with_radii([0.05]),
    )?;
    Ok(())
}

/// Log the drone pose and rotors to the rerun recording stream
/// # Errors
/// * If the data cannot be logged to the recording stream
pub fn log_drone(rec: &rerun::RecordingStream, quad: &Quadrotor) -> Result<(), SimulationError> {
    let state = quad.state();
    let (p, q) = (state.position, state.orientation);
    rec.log(
        "world/quad/base_link",
        &rerun::Transform3D::from_translation_rotation(
            rerun::Vec3D::new(p.x, p.y, p.z),
            rerun::Quaternion::from_xyzw([q.i, q.j, q.k, q.w]),
        )
        .with_axis_length(quad.params().arm_len * 2.0),
    )?;
    let max_rpm = quad.params().max_rpm;
    let (rotors, colors): (Vec<(f32, f32, f32)>, Vec<rerun::Color>) = quad
        .rotor_offsets()
        .iter()
        .zip(state.rpms.iter())
        .map(|(offset, rpm)| {
            let world = p + quat_rotate(&q, offset);
            let intensity = (255.0 * (0.5 + 0.5 * rpm / max_rpm)) as u8;
            ((world.x, world.y, world.z), rerun::Color::from_rgb(intensity, 128, 0))
        })
        .unzip();
    rec.log(
        "world/quad/rotors",
        &rerun::Points3D::new(rotors)
            .with_radii([quad.params().arm_len / 4.0])
            .with_colors(colors),
    )?;
    Ok(())
}

/// Log the trail to the rerun recording stream
/// # Errors
/// * If the data cannot be logged to the recording stream
pub fn log_trail(rec: &rerun::RecordingStream, trail: &Trail) -> Result<(), SimulationError> {
    let path = trail
        .points
        .iter()
        .map(|p| (p.x, p.y, p.z))
        .collect::<Vec<(f32, f32, f32)>>();
    rec.log(
        "world/quad/path",
        &rerun::LineStrips3D::new([path]).with_colors([rerun::Color::from_rgb(0, 187, 187)]),
    )?;
    Ok(())
}
