//! [`SimRecognizer`] – a keyword spotter driven by hand.
//!
//! Stands in for the speech engine on hosts without one.  The interactive
//! shell types a word and a confidence; [`SimRecognizer::feed`] pushes it as a
//! raw [`Hypothesis`] exactly like a real engine would, so the confidence
//! gate and the rest of the pipeline run unchanged.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use voxa_middleware::Recognizer;
use voxa_types::{Hypothesis, VoxaError};

#[derive(Debug)]
pub struct SimRecognizer {
    available: AtomicBool,
    sink: Mutex<Option<mpsc::Sender<Hypothesis>>>,
}

impl Default for SimRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRecognizer {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            sink: Mutex::new(None),
        }
    }

    /// Simulate a missing or denied audio device for the next `start`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.sink.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    /// Emit one hypothesis.  Returns `false` when not started (the engine is
    /// deaf) or the receiver is gone.
    pub async fn feed(&self, label: &str, confidence: f32) -> bool {
        let sink = self.sink.lock().unwrap_or_else(|p| p.into_inner()).clone();
        match sink {
            Some(sink) => sink.send(Hypothesis::new(label, confidence)).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Recognizer for SimRecognizer {
    async fn start(&self, sink: mpsc::Sender<Hypothesis>) -> Result<(), VoxaError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(VoxaError::RecognizerUnavailable("no audio input device".into()));
        }
        *self.sink.lock().unwrap_or_else(|p| p.into_inner()) = Some(sink);
        debug!("simulated recognizer listening");
        Ok(())
    }

    async fn stop(&self) -> Result<(), VoxaError> {
        self.sink.lock().unwrap_or_else(|p| p.into_inner()).take();
        debug!("simulated recognizer stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn feed_reaches_sink_only_while_started() {
        let sim = SimRecognizer::new();
        let (tx, mut rx) = mpsc::channel(4);

        assert!(!sim.feed("left", 0.9).await);
        sim.start(tx).await.unwrap();
        assert!(sim.is_running());
        assert!(sim.feed("left", 0.9).await);
        assert_eq!(rx.recv().await, Some(Hypothesis::new("left", 0.9)));

        sim.stop().await.unwrap();
        assert!(!sim.is_running());
        assert!(!sim.feed("left", 0.9).await);
    }

    #[tokio::test]
    async fn unavailable_start_fails() {
        let sim = SimRecognizer::new();
        sim.set_available(false);
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(sim.start(tx).await, Err(VoxaError::RecognizerUnavailable(_))));
        assert!(!sim.is_running());
    }
}
