//! Frame ticker and HUD sampling.

use bevy::log::debug;

pub const DEFAULT_SAMPLE_INTERVAL: f32 = 0.25;

/// Snapshot handed to the HUD hook every sample interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HudSample {
    pub elapsed: f32,
    pub fps: f32,
    pub frames: u64,
    pub entities: usize,
}

#[derive(Debug, Clone)]
pub struct Ticker {
    running: bool,
    sample_interval: f32,
    elapsed: f32,
    frames: u64,
    window_time: f32,
    window_frames: u32,
}

impl Ticker {
    pub fn new(sample_interval: f32) -> Self {
        Self {
            running: false,
            sample_interval: if sample_interval > 0.0 {
                sample_interval
            } else {
                DEFAULT_SAMPLE_INTERVAL
            },
            elapsed: 0.0,
            frames: 0,
            window_time: 0.0,
            window_frames: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn sample_interval(&self) -> f32 {
        self.sample_interval
    }

    /// Returns false when already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            debug!("Ticker already running; start ignored");
            return false;
        }
        self.running = true;
        true
    }

    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    /// Advance one frame. Yields a sample when a full interval has passed,
    /// at most one per frame however long the frame was.
    pub fn advance(&mut self, delta: f32, entities: usize) -> Option<HudSample> {
        if !self.running {
            return None;
        }
        let delta = delta.max(0.0);
        self.elapsed += delta;
        self.frames += 1;
        self.window_time += delta;
        self.window_frames += 1;

        if self.window_time < self.sample_interval {
            return None;
        }

        let sample = HudSample {
            elapsed: self.elapsed,
            fps: self.window_frames as f32 / self.window_time,
            frames: self.frames,
            entities,
        };
        self.window_time %= self.sample_interval;
        self.window_frames = 0;
        Some(sample)
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn stopped_ticker_does_not_advance() {
        let mut ticker = Ticker::default();
        assert!(ticker.advance(1.0, 0).is_none());
        assert_eq!(ticker.frames(), 0);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut ticker = Ticker::default();
        assert!(ticker.start());
        assert!(!ticker.start());
        assert!(ticker.stop());
        assert!(!ticker.stop());
    }

    #[test]
    fn samples_every_interval_independent_of_frame_rate() {
        let mut ticker = Ticker::new(0.25);
        ticker.start();

        let samples: Vec<HudSample> = (0..64).filter_map(|_| ticker.advance(1.0 / 64.0, 5)).collect();
        assert_eq!(samples.len(), 4);
        assert_close(samples[0].fps, 64.0);
        assert_eq!(samples[0].entities, 5);

        let mut slow = Ticker::new(0.25);
        slow.start();
        let slow_samples = (0..8).filter_map(|_| slow.advance(0.125, 0)).count();
        assert_eq!(slow_samples, 4);
    }

    #[test]
    fn long_frame_yields_single_sample() {
        let mut ticker = Ticker::new(0.25);
        ticker.start();
        let sample = ticker.advance(2.0, 0).expect("sample");
        assert_close(sample.fps, 0.5);
        assert!(ticker.advance(0.01, 0).is_none());
    }

    #[test]
    fn non_positive_interval_falls_back_to_default() {
        assert_eq!(Ticker::new(0.0).sample_interval(), DEFAULT_SAMPLE_INTERVAL);
    }
}
