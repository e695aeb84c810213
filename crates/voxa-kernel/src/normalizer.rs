//! Command Normalizer – maps raw labels and remote payloads onto
//! [`CanonicalCommand`].
//!
//! Two kinds of input arrive here:
//!
//! * recognizer labels (`"forward"`, `"back"`, …), and
//! * single-character remote register payloads (`F B L R U D S`).
//!
//! Both go through the same static lookup.  Comparison is trimmed and
//! case-insensitive.  Anything outside the vocabulary yields `None`; callers
//! drop it silently because unrecognized speech is expected noise.
//!
//! # Example
//!
//! ```
//! use voxa_kernel::normalizer::normalize;
//! use voxa_types::CanonicalCommand;
//!
//! assert_eq!(normalize("  Forward "), Some(CanonicalCommand::Forward));
//! assert_eq!(normalize("L"), Some(CanonicalCommand::Left));
//! assert_eq!(normalize("sideways"), None);
//! ```

use voxa_types::CanonicalCommand;

/// Static word table.  `back` is the recognizer's label, `backward` the
/// spelling used by button and text front-ends.
const WORDS: [(&str, CanonicalCommand); 8] = [
    ("forward", CanonicalCommand::Forward),
    ("back", CanonicalCommand::Backward),
    ("backward", CanonicalCommand::Backward),
    ("left", CanonicalCommand::Left),
    ("right", CanonicalCommand::Right),
    ("up", CanonicalCommand::Up),
    ("down", CanonicalCommand::Down),
    ("stop", CanonicalCommand::Stop),
];

/// Normalize a raw label or payload.  Returns `None` for anything unknown.
pub fn normalize(raw: &str) -> Option<CanonicalCommand> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return CanonicalCommand::from_code(c.to_ascii_uppercase());
    }

    WORDS
        .iter()
        .find(|(word, _)| word.eq_ignore_ascii_case(trimmed))
        .map(|(_, cmd)| *cmd)
}
