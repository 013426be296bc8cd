/// Offload cutoff used unless configured otherwise.
pub const DEFAULT_THRESHOLD: f64 = 30.0;

/// Maps a signal-quality reading to an offload verdict.
pub trait OffloadPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// `true` forwards the request to a remote host, `false` keeps it local.
    fn should_offload(&self, quality: f64) -> bool;
}

/// Offloads strictly below the threshold. Equality and NaN stay local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    threshold: f64,
}

impl ThresholdPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl OffloadPolicy for ThresholdPolicy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn should_offload(&self, quality: f64) -> bool {
        quality < self.threshold
    }
}
