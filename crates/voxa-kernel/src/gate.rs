//! [`ConfidenceGate`] – vocabulary and confidence filter for recognizer output.
//!
//! The keyword-spotting engine scores every label it knows, many of which
//! (`"yes"`, `"_background_noise_"`, …) mean nothing here.  The gate keeps
//! only the *monitored* labels and only when their confidence reaches the
//! threshold.  It holds no mutable state, so the same input always yields the
//! same answer.
//!
//! # Example
//!
//! ```
//! use voxa_kernel::gate::ConfidenceGate;
//! use voxa_types::{CanonicalCommand, Hypothesis};
//!
//! let gate = ConfidenceGate::default();
//! assert_eq!(
//!     gate.admit(&Hypothesis::new("right", 0.9)),
//!     Some(CanonicalCommand::Right)
//! );
//! assert_eq!(gate.admit(&Hypothesis::new("right", 0.5)), None);
//! ```

use voxa_types::{CanonicalCommand, Hypothesis};

use crate::normalizer::normalize;

/// Minimum score for a recognizer label to count as a command.
pub const CONFIDENCE_THRESHOLD: f32 = 0.85;

/// Labels the recognizer is listened to for.
pub const MONITORED_WORDS: [&str; 6] = ["forward", "back", "left", "right", "up", "down"];

/// Pure filter in front of the dispatcher for locally recognized speech.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceGate {
    threshold: f32,
    vocabulary: Vec<String>,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(CONFIDENCE_THRESHOLD)
    }
}

impl ConfidenceGate {
    /// Gate with the default monitored vocabulary and the given threshold.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            vocabulary: MONITORED_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Replace the monitored vocabulary (builder-style).
    pub fn with_vocabulary<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vocabulary = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Return `true` when `label` is in the monitored vocabulary.
    pub fn is_monitored(&self, label: &str) -> bool {
        let label = label.trim();
        self.vocabulary
            .iter()
            .any(|w| w.eq_ignore_ascii_case(label))
    }

    /// Admit `hypothesis` as a command, or reject it.
    ///
    /// Rejected when the label is not monitored, when it does not normalize,
    /// or when the confidence is non-finite or below the threshold.
    pub fn admit(&self, hypothesis: &Hypothesis) -> Option<CanonicalCommand> {
        if !hypothesis.confidence.is_finite() || hypothesis.confidence < self.threshold {
            return None;
        }
        if !self.is_monitored(&hypothesis.label) {
            return None;
        }
        normalize(&hypothesis.label)
    }

    /// Pick the best monitored label from a full score vector.
    ///
    /// `labels[i]` is scored by `scores[i]`; extra entries on either side are
    /// ignored.  Returns `None` when no monitored label has a positive score.
    /// The result still has to pass [`admit`][Self::admit].
    pub fn best_of(&self, labels: &[&str], scores: &[f32]) -> Option<Hypothesis> {
        let mut best: Option<(&str, f32)> = None;
        for (&label, &score) in labels.iter().zip(scores) {
            if !self.is_monitored(label) || !score.is_finite() {
                continue;
            }
            let best_score = best.map(|(_, s)| s).unwrap_or(0.0);
            if score > best_score {
                best = Some((label, score));
            }
        }
        best.map(|(label, score)| Hypothesis::new(label, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_monitored_label_at_threshold() {
        let gate = ConfidenceGate::default();
        assert_eq!(
            gate.admit(&Hypothesis::new("up", CONFIDENCE_THRESHOLD)),
            Some(CanonicalCommand::Up)
        );
    }

    #[test]
    fn rejects_below_threshold() {
        let gate = ConfidenceGate::default();
        assert_eq!(gate.admit(&Hypothesis::new("up", 0.8499)), None);
    }

    #[test]
    fn rejects_non_finite_confidence() {
        let gate = ConfidenceGate::default();
        assert_eq!(gate.admit(&Hypothesis::new("up", f32::NAN)), None);
        assert_eq!(gate.admit(&Hypothesis::new("up", f32::INFINITY)), None);
    }

    #[test]
    fn rejects_unmonitored_labels_even_if_normalizable() {
        let gate = ConfidenceGate::default();
        // "stop" and codes normalize, but the recognizer is not listened to for them.
        assert_eq!(gate.admit(&Hypothesis::new("stop", 0.99)), None);
        assert_eq!(gate.admit(&Hypothesis::new("F", 0.99)), None);
        assert_eq!(gate.admit(&Hypothesis::new("yes", 0.99)), None);
    }

    #[test]
    fn label_matching_ignores_case_and_whitespace() {
        let gate = ConfidenceGate::default();
        assert_eq!(
            gate.admit(&Hypothesis::new(" Back ", 0.95)),
            Some(CanonicalCommand::Backward)
        );
    }

    #[test]
    fn custom_vocabulary_and_threshold() {
        let gate = ConfidenceGate::new(0.5).with_vocabulary(["left", "right"]);
        assert_eq!(gate.threshold(), 0.5);
        assert_eq!(
            gate.admit(&Hypothesis::new("left", 0.6)),
            Some(CanonicalCommand::Left)
        );
        assert_eq!(gate.admit(&Hypothesis::new("up", 0.99)), None);
    }

    #[test]
    fn best_of_picks_highest_monitored_score() {
        let gate = ConfidenceGate::default();
        let labels = ["_background_noise_", "down", "yes", "left"];
        let scores = [0.99, 0.40, 0.95, 0.91];
        let best = gate.best_of(&labels, &scores).unwrap();
        assert_eq!(best.label, "left");
        assert!((best.confidence - 0.91).abs() < f32::EPSILON);
        assert_eq!(gate.admit(&best), Some(CanonicalCommand::Left));
    }

    #[test]
    fn best_of_none_when_nothing_monitored_scores() {
        let gate = ConfidenceGate::default();
        assert!(gate.best_of(&["yes", "no"], &[0.9, 0.9]).is_none());
        assert!(gate.best_of(&["up"], &[0.0]).is_none());
        assert!(gate.best_of(&[], &[]).is_none());
    }

    #[test]
    fn gate_is_deterministic() {
        let gate = ConfidenceGate::default();
        let h = Hypothesis::new("forward", 0.9);
        let first = gate.admit(&h);
        for _ in 0..10 {
            assert_eq!(gate.admit(&h), first);
        }
    }
}
