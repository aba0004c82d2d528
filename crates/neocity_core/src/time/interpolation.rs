//! # Render Interpolation
//!
//! Blends the previous and current simulation states so rendering between
//! fixed steps looks continuous.

use crate::ecs::TransformSample;

/// Above this cosine the two rotations are treated as parallel and blended
/// linearly.
const SLERP_LINEAR_THRESHOLD: f32 = 0.9995;

/// Linear blend of two positions.
#[inline]
#[must_use]
pub fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[inline]
fn normalize4(q: [f32; 4]) -> [f32; 4] {
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len <= f32::EPSILON {
        return q;
    }
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}

/// Spherical blend of two unit quaternions `(x, y, z, w)` along the shorter
/// arc.
#[must_use]
pub fn slerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];

    // q and -q are the same rotation; flip to take the short way round
    let mut b = b;
    if dot < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        dot = -dot;
    }

    if dot > SLERP_LINEAR_THRESHOLD {
        return normalize4([
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
            a[3] + (b[3] - a[3]) * t,
        ]);
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;

    [
        a[0] * wa + b[0] * wb,
        a[1] * wa + b[1] * wb,
        a[2] * wa + b[2] * wb,
        a[3] * wa + b[3] * wb,
    ]
}

/// Blends two transform samples: linear on position, spherical on rotation.
///
/// `alpha = 0` yields `previous`, `alpha = 1` yields `current`.
#[inline]
#[must_use]
pub fn interpolate_sample(
    previous: &TransformSample,
    current: &TransformSample,
    alpha: f32,
) -> TransformSample {
    TransformSample {
        position: lerp3(previous.position, current.position, alpha),
        rotation: slerp(previous.rotation, current.rotation, alpha),
    }
}
