//! Quantized llama generation backend using candle.
//!
//! Loads a GGUF model file plus the `tokenizer.json` sitting next to it, and
//! runs an incremental decode loop (KV cache inside `ModelWeights`) with
//! temperature / top-p sampling, a hard token budget, and stop-sequence
//! truncation. Dropping the engine frees the weights, which is how the
//! manager's release path reclaims the gigabytes.

use std::path::{Path, PathBuf};

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;

use crate::llm::engine::{GenBackend, GenEngine, GenError};
use crate::llm::request::GenerationRequest;

/// End-of-sequence token names probed in order; llama v2/v3 chat variants
/// disagree on which one they use.
const EOS_TOKENS: &[&str] = &["</s>", "<|eot_id|>", "<|end_of_text|>"];

// ---------------------------------------------------------------------------
// CandleLlamaBackend
// ---------------------------------------------------------------------------

/// Backend that loads [`CandleLlamaEngine`]s from GGUF file paths.
pub struct CandleLlamaBackend {
    device: Device,
    seed: u64,
}

impl CandleLlamaBackend {
    /// CPU-device backend with a fixed default seed.
    pub fn new() -> Self {
        Self {
            device: Device::Cpu,
            seed: 299_792_458,
        }
    }

    /// Override the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for CandleLlamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GenBackend for CandleLlamaBackend {
    fn load(&self, source: &str) -> Result<Box<dyn GenEngine>, GenError> {
        let engine = CandleLlamaEngine::load(Path::new(source), self.device.clone(), self.seed)?;
        Ok(Box::new(engine))
    }
}

// ---------------------------------------------------------------------------
// CandleLlamaEngine
// ---------------------------------------------------------------------------

/// One loaded quantized llama model.
pub struct CandleLlamaEngine {
    model: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_tokens: Vec<u32>,
    seed: u64,
    source: String,
}

impl CandleLlamaEngine {
    /// Load the GGUF file at `source` and its sibling `tokenizer.json`.
    pub fn load(source: &Path, device: Device, seed: u64) -> Result<Self, GenError> {
        let load_err = |reason: String| GenError::LoadFailed {
            source: source.display().to_string(),
            reason,
        };

        if !source.exists() {
            return Err(load_err("file does not exist".into()));
        }

        let mut file = std::fs::File::open(source)
            .map_err(|e| load_err(format!("open GGUF: {e}")))?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| load_err(format!("read GGUF header: {e}")))?;
        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| load_err(format!("load weights: {e}")))?;

        let tokenizer_path = tokenizer_path_for(source);
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            load_err(format!(
                "load tokenizer {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let eos_tokens = EOS_TOKENS
            .iter()
            .filter_map(|t| tokenizer.token_to_id(t))
            .collect();

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_tokens,
            seed,
            source: source.display().to_string(),
        })
    }

    /// Incremental decode: full prompt on the first forward, one token per
    /// step afterwards. `index_pos == 0` resets the model's KV cache, so
    /// every request starts from a clean state.
    fn decode(&mut self, request: &GenerationRequest) -> Result<String, GenError> {
        let gen_err = |reason: String| GenError::Generation(reason);

        let encoding = self
            .tokenizer
            .encode(request.prompt.as_str(), true)
            .map_err(|e| gen_err(format!("tokenize prompt: {e}")))?;
        let prompt_tokens = encoding.get_ids().to_vec();
        if prompt_tokens.is_empty() {
            return Err(gen_err("prompt tokenized to zero tokens".into()));
        }

        // temperature 0.0 → greedy (argmax) sampling.
        let temperature = (request.temperature > 0.0).then_some(request.temperature);
        let mut sampler = LogitsProcessor::new(self.seed, temperature, Some(request.top_p));

        let input = Tensor::new(prompt_tokens.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| gen_err(format!("prompt tensor: {e}")))?;
        let logits = self
            .model
            .forward(&input, 0)
            .and_then(|l| l.squeeze(0))
            .map_err(|e| gen_err(format!("prompt forward: {e}")))?;
        let mut next_token = sampler
            .sample(&logits)
            .map_err(|e| gen_err(format!("sample: {e}")))?;

        let mut generated: Vec<u32> = Vec::with_capacity(request.max_tokens);
        let mut text = String::new();

        for step in 0..request.max_tokens {
            if self.eos_tokens.contains(&next_token) {
                break;
            }
            generated.push(next_token);

            text = self
                .tokenizer
                .decode(&generated, true)
                .map_err(|e| gen_err(format!("detokenize: {e}")))?;

            if let Some(cut) = earliest_stop(&text, &request.stop) {
                text.truncate(cut);
                break;
            }

            let input = Tensor::new(&[next_token], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| gen_err(format!("step tensor: {e}")))?;
            let logits = self
                .model
                .forward(&input, prompt_tokens.len() + step)
                .and_then(|l| l.squeeze(0))
                .map_err(|e| gen_err(format!("step forward: {e}")))?;
            next_token = sampler
                .sample(&logits)
                .map_err(|e| gen_err(format!("sample: {e}")))?;
        }

        Ok(text.trim().to_string())
    }
}

impl GenEngine for CandleLlamaEngine {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String, GenError> {
        log::debug!(
            "generating up to {} tokens from {} (prompt len {})",
            request.max_tokens,
            self.source,
            request.prompt.len()
        );
        self.decode(request)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `tokenizer.json` sitting in the same directory as the GGUF file.
fn tokenizer_path_for(source: &Path) -> PathBuf {
    source
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("tokenizer.json")
}

/// Byte offset of the earliest stop-sequence occurrence in `text`, if any.
fn earliest_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter().filter_map(|s| text.find(s.as_str())).min()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
