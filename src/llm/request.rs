//! Generation request parameters.
//!
//! [`GenerationRequest`] carries everything one generation call needs. It is
//! built once per call site and never mutated after being issued; the token
//! budget doubles as the runtime bound on the call (no generation loops
//! forever).

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// Parameters for a single text-generation call.
///
/// Build with [`GenerationRequest::new`] and chain the setters:
///
/// ```
/// use speech_assess::llm::GenerationRequest;
///
/// let req = GenerationRequest::new("Convert to IPA: \"butter\"")
///     .max_tokens(100)
///     .temperature(0.1)
///     .stop(["\n", "Text:"]);
/// assert_eq!(req.max_tokens, 100);
/// ```
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Maximum number of tokens to generate; bounds the call's runtime.
    pub max_tokens: usize,
    /// Sampling temperature in `[0, 1]`. `0.0` selects tokens greedily.
    pub temperature: f64,
    /// Nucleus-sampling probability mass.
    pub top_p: f64,
    /// Generation halts as soon as the decoded text contains any of these;
    /// the stop sequence itself is trimmed from the output.
    pub stop: Vec<String>,
}

impl GenerationRequest {
    /// Create a request with the default sampling profile
    /// (128 tokens, temperature 0.7, top-p 0.9, no stop sequences).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 128,
            temperature: 0.7,
            top_p: 0.9,
            stop: Vec::new(),
        }
    }

    /// Set the token budget.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature (clamped to `[0, 1]`).
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Set the nucleus-sampling probability mass.
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the stop sequences (ordered; first match wins).
    pub fn stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
