//! Fixed progress animation for responses that carry no incremental signal.

use std::time::Duration;

use shared::domain::GenerationStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressFrame {
    pub step: GenerationStep,
    pub progress: u8,
    pub hold: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgress {
    frames: Vec<ProgressFrame>,
}

impl Default for SynthesizedProgress {
    fn default() -> Self {
        let holds_ms = [500, 1000, 1500, 1500, 500];
        let frames = GenerationStep::ALL
            .into_iter()
            .zip(holds_ms)
            .map(|(step, hold_ms)| ProgressFrame {
                step,
                progress: step.nominal_progress(),
                hold: Duration::from_millis(hold_ms),
            })
            .collect();
        Self { frames }
    }
}

impl SynthesizedProgress {
    pub fn new(frames: Vec<ProgressFrame>) -> Self {
        Self { frames }
    }

    /// Same frames, no waiting between them.
    pub fn without_holds(mut self) -> Self {
        for frame in &mut self.frames {
            frame.hold = Duration::ZERO;
        }
        self
    }

    pub fn frames(&self) -> &[ProgressFrame] {
        &self.frames
    }

    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|frame| frame.hold).sum()
    }

    /// Emits each frame, then holds for its duration before the next one.
    pub async fn play<F>(&self, mut on_frame: F)
    where
        F: FnMut(&ProgressFrame),
    {
        for frame in &self.frames {
            on_frame(frame);
            if !frame.hold.is_zero() {
                tokio::time::sleep(frame.hold).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/progress_tests.rs"]
mod tests;
