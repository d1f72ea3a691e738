//! Tolerant extraction of tagged JSON payloads from generated text.
//!
//! Every structured stage asks the model to wrap its JSON between a repeated
//! sentinel marker (e.g. `<<VERDICT>>{…}<<VERDICT>>`). Models comply
//! imperfectly: they prepend reasoning, drop the closing marker when the
//! token budget runs out, or skip the markers entirely. [`extract_tagged`]
//! absorbs all of that:
//!
//! 1. Payload between the first marker pair → parse it.
//! 2. Opening marker but no closer (truncated generation) → parse the tail,
//!    healing it with the expected closing token when needed. Generation is
//!    frequently cut off exactly at the final `}`, so appending it is usually
//!    enough.
//! 3. No markers at all → parse the whole trimmed text (with the same
//!    healing).
//! 4. Nothing parses → [`Extracted::Fallback`] carrying the caller's default.
//!
//! A parse failure is **never** an error: callers always get a usable value,
//! and can ask [`Extracted::is_fallback`] whether it was parsed or defaulted.

use serde::de::DeserializeOwned;

// ---------------------------------------------------------------------------
// Extracted
// ---------------------------------------------------------------------------

/// Outcome of a payload extraction — a parsed value or the caller's default.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    /// The payload parsed into `T`.
    Parsed(T),
    /// Nothing parsed; `value` is the caller-supplied default.
    Fallback {
        /// The default value handed back to the caller.
        value: T,
        /// Why extraction fell back (for logs, never surfaced as an error).
        reason: String,
    },
}

impl<T> Extracted<T> {
    /// Consume self and return the usable value, parsed or defaulted.
    pub fn into_value(self) -> T {
        match self {
            Extracted::Parsed(v) => v,
            Extracted::Fallback { value, .. } => value,
        }
    }

    /// Borrow the usable value.
    pub fn value(&self) -> &T {
        match self {
            Extracted::Parsed(v) => v,
            Extracted::Fallback { value, .. } => value,
        }
    }

    /// `true` when the default was substituted.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Extracted::Fallback { .. })
    }
}

// ---------------------------------------------------------------------------
// extract_tagged
// ---------------------------------------------------------------------------

/// Extract and parse a JSON payload wrapped in a repeated sentinel `marker`,
/// substituting `default` when nothing usable can be recovered.
///
/// `closer` is the minimal token expected to terminate the payload (for the
/// JSON objects used here, `"}"`); it is appended once when parsing a
/// truncated payload fails without it.
///
/// # Example
///
/// ```
/// use speech_assess::llm::{extract_tagged, Extracted};
///
/// #[derive(serde::Deserialize, Default, PartialEq, Debug)]
/// struct P { a: u32 }
///
/// let text = "noise<<X>>{\"a\":1}<<X>>noise";
/// let out = extract_tagged::<P>(text, "<<X>>", "}", P::default());
/// assert_eq!(out, Extracted::Parsed(P { a: 1 }));
///
/// // Truncated generation — closing marker and brace lost to the token budget.
/// let out = extract_tagged::<P>("<<X>>{\"a\":1", "<<X>>", "}", P::default());
/// assert_eq!(out, Extracted::Parsed(P { a: 1 }));
/// ```
pub fn extract_tagged<T: DeserializeOwned>(
    text: &str,
    marker: &str,
    closer: &str,
    default: T,
) -> Extracted<T> {
    match try_extract_tagged::<T>(text, marker, closer) {
        Some(value) => Extracted::Parsed(value),
        None => {
            let reason = format!(
                "no parsable payload between {marker} markers (text len {})",
                text.len()
            );
            log::warn!("extraction fell back to default: {reason}");
            Extracted::Fallback {
                value: default,
                reason,
            }
        }
    }
}

/// [`extract_tagged`] without the default: `None` when nothing parses.
///
/// Used by call sites that supply their own fallback policy (e.g. judge
/// verdicts, where the fallback is built from the candidate set).
pub fn try_extract_tagged<T: DeserializeOwned>(
    text: &str,
    marker: &str,
    closer: &str,
) -> Option<T> {
    let candidate = match text.find(marker) {
        Some(open) => {
            let after_open = &text[open + marker.len()..];
            match after_open.find(marker) {
                Some(close) => &after_open[..close],
                // Closing marker missing — truncated generation; take the tail.
                None => after_open,
            }
        }
        // No markers at all — maybe a bare payload fills the whole text.
        None => text,
    };

    parse_with_healing::<T>(candidate, closer)
}

/// Try parsing `candidate` as-is, then once more with `closer` appended.
fn parse_with_healing<T: DeserializeOwned>(candidate: &str, closer: &str) -> Option<T> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }

    if !closer.is_empty() {
        let healed = format!("{trimmed}{closer}");
        if let Ok(value) = serde_json::from_str::<T>(&healed) {
            return Some(value);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
