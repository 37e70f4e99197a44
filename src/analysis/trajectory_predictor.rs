// src/analysis/trajectory_predictor.rs
//
// Constant-velocity Kalman filter for aerial hostiles.
//
// State: [x, y, vx, vy], one step = one frame.
//   x_{k+1} = F * x_k,  F = [[I₂, I₂], [0₂, I₂]]
// Measurement: [x, y] of the current detection.
//
// Process and measurement noise default to zero. With zero noise the filter
// trusts every measurement fully for position and builds velocity from the
// residuals; its covariance collapses after two corrections, at which point
// it is re-armed from the initial covariance before correcting again.
//
// After each correction the filter projects the track onto the reference
// line (the player's row) and reports where it will cross, wrapped into the
// screen width because planes leave one edge and reappear at the other.

use super::identity_tracker::TrackedHostile;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Diagonal process noise added on every predict.
    pub process_noise: f32,
    /// Diagonal measurement noise on x and y.
    pub measurement_noise: f32,
    /// Initial (and re-armed) covariance diagonal.
    pub initial_covariance: f32,
    /// Below this |vy| (px/frame) no intercept is predicted.
    pub velocity_epsilon: f32,
    /// Row the intercept is computed against.
    pub reference_line_y: f32,
    /// Intercepts are wrapped into `[0, wrap_width)`. Equal to the frame
    /// width; 0 disables wrapping.
    pub wrap_width: f32,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.0,
            measurement_noise: 0.0,
            initial_covariance: 1.0,
            velocity_epsilon: 0.1,
            reference_line_y: 440.0,
            wrap_width: 456.0,
        }
    }
}

// ============================================================================
// 4×4 MATRIX MATH (inline, stack allocated)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Mat4([f32; 16]);

impl Mat4 {
    const ZERO: Self = Self([0.0; 16]);

    fn identity() -> Self {
        Self::diagonal(1.0)
    }

    fn diagonal(v: f32) -> Self {
        let mut m = Self::ZERO;
        for i in 0..4 {
            m.0[i * 4 + i] = v;
        }
        m
    }

    #[inline]
    fn get(&self, r: usize, c: usize) -> f32 {
        self.0[r * 4 + c]
    }

    #[inline]
    fn set(&mut self, r: usize, c: usize, v: f32) {
        self.0[r * 4 + c] = v;
    }

    fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = Mat4::ZERO;
        for i in 0..4 {
            for j in 0..4 {
                let mut sum = 0.0f32;
                for k in 0..4 {
                    sum += self.get(i, k) * rhs.get(k, j);
                }
                out.set(i, j, sum);
            }
        }
        out
    }

    fn add(&self, rhs: &Mat4) -> Mat4 {
        let mut out = *self;
        for i in 0..16 {
            out.0[i] += rhs.0[i];
        }
        out
    }

    fn sub(&self, rhs: &Mat4) -> Mat4 {
        let mut out = *self;
        for i in 0..16 {
            out.0[i] -= rhs.0[i];
        }
        out
    }

    fn transpose(&self) -> Mat4 {
        let mut out = Mat4::ZERO;
        for i in 0..4 {
            for j in 0..4 {
                out.set(i, j, self.get(j, i));
            }
        }
        out
    }

    fn mul_vec(&self, v: &[f32; 4]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (0..4).map(|j| self.get(i, j) * v[j]).sum();
        }
        out
    }
}

/// 2×2 innovation covariance.
#[derive(Debug, Clone, Copy)]
struct Mat2([f32; 4]);

impl Mat2 {
    fn invert(&self) -> Option<Mat2> {
        let [a, b, c, d] = self.0;
        let det = a * d - b * c;
        if det.abs() < 1e-9 {
            return None;
        }
        let inv = 1.0 / det;
        Some(Mat2([d * inv, -b * inv, -c * inv, a * inv]))
    }
}

/// Constant-velocity transition with dt = 1 frame.
fn transition() -> Mat4 {
    let mut f = Mat4::identity();
    f.set(0, 2, 1.0);
    f.set(1, 3, 1.0);
    f
}

// ============================================================================
// PER-TRACK FILTER STATE
// ============================================================================

/// Kalman state owned by one tracked hostile. Only [`TrajectoryPredictor`]
/// mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanTrack {
    x: [f32; 4],
    p: Mat4,
    initialized: bool,
    rearms: u32,
}

impl KalmanTrack {
    pub fn new(initial_covariance: f32) -> Self {
        Self {
            x: [0.0; 4],
            p: Mat4::diagonal(initial_covariance),
            initialized: false,
            rearms: 0,
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x[0], self.x[1])
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.x[2], self.x[3])
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Times the covariance had collapsed and was re-armed.
    pub fn rearm_count(&self) -> u32 {
        self.rearms
    }

    /// Trace of the state covariance.
    pub fn uncertainty(&self) -> f32 {
        (0..4).map(|i| self.p.get(i, i)).sum()
    }
}

// ============================================================================
// PREDICTOR
// ============================================================================

pub struct TrajectoryPredictor {
    config: TrajectoryConfig,
    f: Mat4,
    ft: Mat4,
    q: Mat4,
    p0: Mat4,
}

impl TrajectoryPredictor {
    pub fn new(config: TrajectoryConfig) -> Self {
        let f = transition();
        Self {
            ft: f.transpose(),
            f,
            q: Mat4::diagonal(config.process_noise),
            p0: Mat4::diagonal(config.initial_covariance),
            config,
        }
    }

    pub fn config(&self) -> &TrajectoryConfig {
        &self.config
    }

    pub fn new_track(&self) -> KalmanTrack {
        KalmanTrack::new(self.config.initial_covariance)
    }

    /// Feed the hostile's current position into its filter and refresh its
    /// predicted intercept. Hostiles that are not predictive are left alone.
    pub fn update(&self, hostile: &mut TrackedHostile) {
        let center = hostile.entity().center();
        let z = [center.x as f32, center.y as f32];

        if !hostile.entity().kind().is_predictive() {
            return;
        }
        let track = hostile
            .kalman_slot()
            .get_or_insert_with(|| self.new_track());
        self.observe(track, z);
        let intercept = self.intercept(track);
        let (vx, vy) = track.velocity();

        debug!(
            "✈️ track #{} pos=({:.0}, {:.0}) vel=({:.2}, {:.2}) intercept={:?}",
            hostile.id(),
            z[0],
            z[1],
            vx,
            vy,
            intercept
        );
        hostile.set_predicted_intercept(intercept);
    }

    /// One predict + correct cycle.
    pub fn observe(&self, track: &mut KalmanTrack, z: [f32; 2]) {
        if !track.initialized {
            track.x = [z[0], z[1], 0.0, 0.0];
            track.p = self.p0;
            track.initialized = true;
            return;
        }

        self.predict(track);
        self.correct(track, z);
    }

    fn predict(&self, track: &mut KalmanTrack) {
        track.x = self.f.mul_vec(&track.x);
        track.p = self.f.mul(&track.p).mul(&self.ft).add(&self.q);
    }

    fn correct(&self, track: &mut KalmanTrack, z: [f32; 2]) {
        // H = [I₂ | 0₂], so H P H' is the top-left 2×2 block of P.
        let r = self.config.measurement_noise;
        let s = |p: &Mat4| Mat2([p.get(0, 0) + r, p.get(0, 1), p.get(1, 0), p.get(1, 1) + r]);

        let s_inv = match s(&track.p).invert() {
            Some(inv) => inv,
            None => {
                // Collapsed covariance: restart uncertainty as if the
                // previous state had just been initialized.
                track.p = self.f.mul(&self.p0).mul(&self.ft).add(&self.q);
                track.rearms += 1;
                match s(&track.p).invert() {
                    Some(inv) => inv,
                    None => {
                        track.x[0] = z[0];
                        track.x[1] = z[1];
                        return;
                    }
                }
            }
        };

        // K = P H' S⁻¹ (4×2); P H' is the first two columns of P.
        let mut k = [[0.0f32; 2]; 4];
        for (i, row) in k.iter_mut().enumerate() {
            let (ph0, ph1) = (track.p.get(i, 0), track.p.get(i, 1));
            row[0] = ph0 * s_inv.0[0] + ph1 * s_inv.0[2];
            row[1] = ph0 * s_inv.0[1] + ph1 * s_inv.0[3];
        }

        let innovation = [z[0] - track.x[0], z[1] - track.x[1]];
        for (i, row) in k.iter().enumerate() {
            track.x[i] += row[0] * innovation[0] + row[1] * innovation[1];
        }

        // P = (I - K H) P
        let mut kh = Mat4::ZERO;
        for (i, row) in k.iter().enumerate() {
            kh.set(i, 0, row[0]);
            kh.set(i, 1, row[1]);
        }
        track.p = Mat4::identity().sub(&kh).mul(&track.p);
    }

    /// Horizontal position where the track crosses the reference line, or
    /// `None` when it is (nearly) level or moving away from the line.
    pub fn intercept(&self, track: &KalmanTrack) -> Option<f32> {
        if !track.initialized {
            return None;
        }
        let [x, y, vx, vy] = track.x;
        if vy.abs() <= self.config.velocity_epsilon {
            return None;
        }

        let remaining = self.config.reference_line_y - y;
        if remaining * vy < 0.0 {
            return None;
        }

        let frames = remaining / vy;
        let crossing = x + vx * frames;
        if !crossing.is_finite() {
            return None;
        }

        if self.config.wrap_width > 0.0 {
            Some(crossing.rem_euclid(self.config.wrap_width))
        } else {
            Some(crossing)
        }
    }
}
