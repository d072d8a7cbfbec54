/// One stereo sample: two independent lanes plus the event-gating flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub left: f32,
    pub right: f32,
    pub active: bool,
}

impl Sample {
    pub const SILENT: Sample = Sample {
        left: 0.0,
        right: 0.0,
        active: false,
    };

    pub const ZERO: Sample = Sample {
        left: 0.0,
        right: 0.0,
        active: true,
    };

    /// Same value on both lanes, active.
    pub fn splat(value: f32) -> Self {
        Self::stereo(value, value)
    }

    pub fn stereo(left: f32, right: f32) -> Self {
        Self {
            left,
            right,
            active: true,
        }
    }

    pub fn lanes(self) -> [f32; 2] {
        [self.left, self.right]
    }

    pub fn from_lanes(lanes: [f32; 2], active: bool) -> Self {
        Self {
            left: lanes[0],
            right: lanes[1],
            active,
        }
    }

    pub fn with_active(self, active: bool) -> Self {
        Self { active, ..self }
    }

    /// Apply `f` to each lane, keeping the active flag.
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            left: f(self.left),
            right: f(self.right),
            active: self.active,
        }
    }

    /// Combine lane-wise; active only when both inputs are.
    pub fn zip(self, other: Sample, f: impl Fn(f32, f32) -> f32) -> Self {
        Self {
            left: f(self.left, other.left),
            right: f(self.right, other.right),
            active: self.active && other.active,
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Sample::ZERO
    }
}
