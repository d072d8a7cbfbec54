//! Master limiter: peak follower with instant attack and smooth release.

/// Release time constant in seconds.
const RELEASE_SECONDS: f32 = 0.05;

/// Keeps the output within `[-ceiling, ceiling]`. Loud peaks pull the gain
/// down immediately; it recovers over the release time.
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling: f32,
    gain: f32,
    release: f32,
}

impl Limiter {
    /// `ceiling` should be in `(0.0, 1.0]`.
    pub fn new(ceiling: f32, sample_rate: u32) -> Self {
        debug_assert!(ceiling > 0.0 && ceiling <= 1.0);
        let release = 1.0 - (-1.0 / (RELEASE_SECONDS * sample_rate.max(1) as f32)).exp();
        Self {
            ceiling,
            gain: 1.0,
            release,
        }
    }

    /// Limit one interleaved frame in place.
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let target = if peak * self.gain > self.ceiling {
            self.ceiling / peak
        } else {
            1.0
        };
        if target < self.gain {
            self.gain = target;
        } else {
            self.gain += (target - self.gain) * self.release;
        }
        for sample in frame.iter_mut() {
            // Non-finite input is silenced rather than passed on.
            *sample = if sample.is_finite() {
                (*sample * self.gain).clamp(-self.ceiling, self.ceiling)
            } else {
                0.0
            };
        }
    }

    /// Limit an interleaved buffer of `channels` channels.
    pub fn process_block(&mut self, buffer: &mut [f32], channels: usize) {
        for frame in buffer.chunks_mut(channels.max(1)) {
            self.process_frame(frame);
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Current gain reduction factor, 1.0 when idle.
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(0.95, 48_000)
    }
}
