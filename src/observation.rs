//! Encoding of the drone and course state into the fixed observation vector.
//!
//! Layout, all quantities in the drone body frame unless stated otherwise:
//!
//! | Index | Content |
//! |---|---|
//! | 0..3 | vector to the current ring, divided by the flight volume half extents |
//! | 3..6 | current ring normal |
//! | 6..9 | vector to the next ring, divided by the flight volume half extents |
//! | 9..12 | next ring normal |
//! | 12..15 | linear velocity divided by the max velocity |
//! | 15..18 | angular velocity divided by the max angular velocity |
//! | 18..21 | body z axis in the world frame |
//! | 21..25 | orientation quaternion w, x, y, z |
//! | 25..29 | rotor speeds divided by the max RPM |
use crate::course::Ring;
use crate::dynamics::{DroneParams, DroneState};
use crate::geometry::{quat_inverse, quat_rotate};
use nalgebra::Vector3;
use serde::Deserialize;

/// Length of the observation vector
pub const OBS_SIZE: usize = 29;

/// Which ring is encoded in the "next ring" slots
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NextRing {
    /// `ring_idx % max_rings`, i.e. the current ring again
    #[default]
    Current,
    /// The ring after the current one, the last ring repeats itself
    Lookahead,
}

impl NextRing {
    /// Index of the ring encoded as "next"
    /// # Arguments
    /// * `ring_idx` - Index of the current ring, below `max_rings`
    /// * `max_rings` - Course length
    #[inline]
    pub fn index(&self, ring_idx: usize, max_rings: usize) -> usize {
        match self {
            NextRing::Current => ring_idx % max_rings,
            NextRing::Lookahead => (ring_idx + 1).min(max_rings - 1),
        }
    }
}

/// Writes the observation of a drone racing towards `current` into `observations`
/// # Arguments
/// * `observations` - Output buffer
/// * `state` - Physical state of the drone
/// * `params` - Static parameters of the drone, used for normalization
/// * `current` - The ring to pass next
/// * `next` - The ring after it
/// * `half_extents` - Half extents of the flight volume, used for normalization
pub fn compute_observations(
    observations: &mut [f32; OBS_SIZE],
    state: &DroneState,
    params: &DroneParams,
    current: &Ring,
    next: &Ring,
    half_extents: &Vector3<f32>,
) {
    let q_inv = quat_inverse(&state.orientation);
    let to_body = |v: &Vector3<f32>| quat_rotate(&q_inv, v);
    let to_current = to_body(&(current.position - state.position)).component_div(half_extents);
    let to_next = to_body(&(next.position - state.position)).component_div(half_extents);
    let linear_velocity = to_body(&state.velocity) / params.max_velocity;
    let angular_velocity = state.angular_velocity / params.max_angular_velocity;
    let up_world = quat_rotate(&state.orientation, &Vector3::z());
    let q = state.orientation.quaternion();
    let fields = [
        to_current,
        to_body(&current.normal),
        to_next,
        to_body(&next.normal),
        linear_velocity,
        angular_velocity,
        up_world,
    ];
    for (chunk, field) in observations.chunks_exact_mut(3).zip(fields.iter()) {
        chunk.copy_from_slice(field.as_slice());
    }
    observations[21..25].copy_from_slice(&[q.w, q.i, q.j, q.k]);
    for (obs, rpm) in observations[25..].iter_mut().zip(state.rpms.iter()) {
        *obs = rpm / params.max_rpm;
    }
}
