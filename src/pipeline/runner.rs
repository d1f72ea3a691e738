//! Pipeline orchestrator — drives the full audio → report flow.
//!
//! [`AssessmentPipeline::run`] executes the stages strictly in order:
//!
//! ```text
//! 1. transcribe audio            (abort: TranscriptionFailed)
//! 2. IPA candidates ×3, twice    (per-attempt retry then drop; abort:
//!                                 InsufficientCandidates below quorum)
//! 3. phonetic-pair judge         (fallback: candidate 0, confidence 5)
//! 4. SODA attempts ×3            (sub-steps degrade to empty, never drop)
//! 5. analysis judge              (fallback: candidate 0, confidence 5)
//! 6. final report                (fallback: breakdown DERIVED from the
//!                                 consolidated analysis — the one fallback
//!                                 computed from data, not constants)
//! ```
//!
//! Any abort discards all partial results; a completed run always carries a
//! fully populated report, parsed or defaulted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{
    AccuracyRating, ArticulationError, ErrorBreakdown, IpaSelection, SodaAnalysis, SodaSummary,
    SodaVerdict,
};
use crate::analysis::extract_ipa;
use crate::config::PipelineConfig;
use crate::llm::{extract_tagged, try_extract_tagged, GenError, ModelManager};
use crate::profile::SpeakerProfile;
use crate::stt::Transcriber;

use super::consensus::{CandidateSet, Consensus};
use super::prompts;

/// Neutral confidence substituted when a judge verdict fails to parse.
const FALLBACK_CONFIDENCE: u8 = 5;

/// Stage names used in failure reports.
const STAGE_REFERENCE_IPA: &str = "reference phonetics";
const STAGE_TRANSCRIBED_IPA: &str = "speech phonetics";
const STAGE_ANALYSIS: &str = "articulation analysis";

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Run-terminating failures, each naming the stage that died.
///
/// Structured-output parse failures never appear here — they are absorbed
/// into fallback values at the stage that hit them.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transcription failed or produced an empty transcript.
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// A consolidation stage had fewer parsed candidates than its quorum.
    #[error("insufficient candidates for {stage}: got {got}, need {need}")]
    InsufficientCandidates {
        stage: &'static str,
        got: usize,
        need: usize,
    },

    /// Model lifecycle failure (load failed after the forced-reload retry,
    /// or a handle went stale underneath the run).
    #[error(transparent)]
    Model(#[from] GenError),
}

// ---------------------------------------------------------------------------
// ModelRoster
// ---------------------------------------------------------------------------

/// The four model source identifiers one run uses: three generator slots and
/// one judge slot. All four may resolve to the same file — the manager only
/// reloads when the identifier actually changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoster {
    /// Sources for the three generator slots.
    pub generators: [String; 3],
    /// Source for the judge/evaluator slot.
    pub judge: String,
}

impl ModelRoster {
    /// Roster with explicit per-slot sources.
    pub fn new(generators: [String; 3], judge: impl Into<String>) -> Self {
        Self {
            generators,
            judge: judge.into(),
        }
    }

    /// Roster where all four slots share one source (the common deployment).
    pub fn uniform(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            generators: [source.clone(), source.clone(), source.clone()],
            judge: source,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Everything one completed run produced. Owned by the run; serialized as
/// the final JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Normalized reference text.
    pub reference_text: String,
    /// Normalized transcript of the audio.
    pub transcribed_text: String,
    /// Surviving IPA candidates for the reference text.
    pub reference_ipa_candidates: CandidateSet<String>,
    /// Surviving IPA candidates for the transcript.
    pub transcribed_ipa_candidates: CandidateSet<String>,
    /// Judged best phonetic pair.
    pub ipa_selection: IpaSelection,
    /// All candidate articulation analyses.
    pub soda_candidates: CandidateSet<SodaAnalysis>,
    /// Judged / consolidated analysis.
    pub soda_verdict: SodaVerdict,
    /// The final structured report.
    pub summary: SodaSummary,
}

// ---------------------------------------------------------------------------
// Wire payloads for the SODA sub-steps
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ErrorsPayload {
    #[serde(default)]
    errors: Vec<ArticulationError>,
}

#[derive(Debug, Default, Deserialize)]
struct OrgansPayload {
    #[serde(default)]
    affected_organs: Vec<String>,
}

// ---------------------------------------------------------------------------
// AssessmentPipeline
// ---------------------------------------------------------------------------

/// Drives the complete assessment pipeline.
///
/// Create with [`AssessmentPipeline::new`] — injecting the process's single
/// [`ModelManager`] and a [`Transcriber`] — then call [`run`](Self::run) once
/// per assessment.
pub struct AssessmentPipeline {
    consensus: Consensus,
    stt: Arc<dyn Transcriber>,
    policy: PipelineConfig,
}

impl AssessmentPipeline {
    /// Build a pipeline over the shared model manager.
    pub fn new(
        manager: Arc<ModelManager>,
        stt: Arc<dyn Transcriber>,
        policy: PipelineConfig,
    ) -> Self {
        Self {
            consensus: Consensus::new(manager),
            stt,
            policy,
        }
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    /// Execute one full assessment.
    ///
    /// `audio` is 16 kHz mono f32; `profile` is the optional questionnaire
    /// side-channel (absence degrades to a neutral insight).
    pub async fn run(
        &self,
        audio: &[f32],
        reference_text: &str,
        roster: &ModelRoster,
        profile: Option<&SpeakerProfile>,
    ) -> Result<PipelineResult, PipelineError> {
        // ── 1. Transcribe ────────────────────────────────────────────────
        log::info!("assessment: transcribing {} samples", audio.len());
        let raw = self
            .stt
            .transcribe(audio)
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        let transcribed_text = normalize_whitespace(&raw);
        if transcribed_text.is_empty() {
            return Err(PipelineError::TranscriptionFailed(
                "transcript empty after normalization".into(),
            ));
        }
        let reference_text = normalize_whitespace(reference_text);
        log::debug!("assessment: transcript = {transcribed_text:?}");

        // ── 2. Phonetic candidates (reference, then transcript) ──────────
        let reference_ipas = self
            .ipa_candidates(&reference_text, roster, STAGE_REFERENCE_IPA)
            .await?;
        let transcribed_ipas = self
            .ipa_candidates(&transcribed_text, roster, STAGE_TRANSCRIBED_IPA)
            .await?;

        // ── 3. Best-pair judge ───────────────────────────────────────────
        let ipa_selection = self
            .select_ipa_pair(
                &reference_text,
                &transcribed_text,
                &reference_ipas,
                &transcribed_ipas,
                roster,
            )
            .await?;
        log::info!(
            "assessment: IPA pair selected (confidence {})",
            ipa_selection.confidence
        );

        // ── 4. Articulation analyses ─────────────────────────────────────
        let soda_candidates = self
            .soda_candidates(&reference_text, &transcribed_text, &ipa_selection, roster)
            .await?;
        if soda_candidates.len() < self.policy.quorum {
            return Err(PipelineError::InsufficientCandidates {
                stage: STAGE_ANALYSIS,
                got: soda_candidates.len(),
                need: self.policy.quorum,
            });
        }

        // ── 5. Analysis judge ────────────────────────────────────────────
        let soda_verdict = self.select_analysis(&soda_candidates, roster).await?;
        log::info!(
            "assessment: analysis {} selected (confidence {})",
            soda_verdict.selected,
            soda_verdict.confidence
        );

        // ── 6. Final report ──────────────────────────────────────────────
        let summary = self
            .final_report(
                &reference_text,
                &transcribed_text,
                &ipa_selection,
                &soda_verdict,
                profile,
                roster,
            )
            .await?;

        Ok(PipelineResult {
            reference_text,
            transcribed_text,
            reference_ipa_candidates: reference_ipas,
            transcribed_ipa_candidates: transcribed_ipas,
            ipa_selection,
            soda_candidates,
            soda_verdict,
            summary,
        })
    }

    // -----------------------------------------------------------------------
    // Stage 2 — phonetic candidates
    // -----------------------------------------------------------------------

    /// Run the configured number of transcription attempts for `text`,
    /// cycling through the generator slots, and enforce the quorum.
    async fn ipa_candidates(
        &self,
        text: &str,
        roster: &ModelRoster,
        stage: &'static str,
    ) -> Result<CandidateSet<String>, PipelineError> {
        let attempts = (0..self.policy.candidates)
            .map(|i| {
                let source = roster.generators[i % roster.generators.len()].clone();
                (source, prompts::ipa_request(text))
            })
            .collect();

        let set = self
            .consensus
            .candidates(attempts, self.policy.attempt_tries, extract_ipa)
            .await?;

        if set.len() < self.policy.quorum {
            return Err(PipelineError::InsufficientCandidates {
                stage,
                got: set.len(),
                need: self.policy.quorum,
            });
        }
        log::debug!("{stage}: {} candidates", set.len());
        Ok(set)
    }

    // -----------------------------------------------------------------------
    // Stage 3 — best-pair judge
    // -----------------------------------------------------------------------

    async fn select_ipa_pair(
        &self,
        reference_text: &str,
        transcribed_text: &str,
        reference_ipas: &CandidateSet<String>,
        transcribed_ipas: &CandidateSet<String>,
        roster: &ModelRoster,
    ) -> Result<IpaSelection, PipelineError> {
        let fallback = IpaSelection {
            reference_ipa: reference_ipas.get(0).cloned().unwrap_or_default(),
            transcribed_ipa: transcribed_ipas.get(0).cloned().unwrap_or_default(),
            confidence: FALLBACK_CONFIDENCE,
        };

        let request = prompts::ipa_judge_request(
            reference_text,
            transcribed_text,
            reference_ipas.as_slice(),
            transcribed_ipas.as_slice(),
        );

        let selection = self
            .consensus
            .judge(
                &roster.judge,
                request,
                |text| {
                    try_extract_tagged::<IpaSelection>(
                        text,
                        prompts::VERDICT_MARKER,
                        prompts::JSON_CLOSER,
                    )
                },
                fallback,
            )
            .await?;
        Ok(selection)
    }

    // -----------------------------------------------------------------------
    // Stage 4 — articulation analyses
    // -----------------------------------------------------------------------

    /// One analysis per configured attempt. Attempts never drop: either
    /// sub-step degrading leaves an empty (but present) structure.
    async fn soda_candidates(
        &self,
        reference_text: &str,
        transcribed_text: &str,
        selection: &IpaSelection,
        roster: &ModelRoster,
    ) -> Result<CandidateSet<SodaAnalysis>, PipelineError> {
        let mut analyses = Vec::with_capacity(self.policy.candidates);
        for i in 0..self.policy.candidates {
            let source = &roster.generators[i % roster.generators.len()];
            let analysis = self
                .soda_attempt(source, reference_text, transcribed_text, selection)
                .await?;
            log::debug!(
                "analysis attempt {i}: {} errors, organs {:?}",
                analysis.errors.len(),
                analysis.affected_organs
            );
            analyses.push(analysis);
        }
        Ok(CandidateSet::new(analyses))
    }

    /// Two chained calls: list errors, then (only if any) attribute organs.
    async fn soda_attempt(
        &self,
        source: &str,
        reference_text: &str,
        transcribed_text: &str,
        selection: &IpaSelection,
    ) -> Result<SodaAnalysis, PipelineError> {
        let request = prompts::soda_errors_request(
            reference_text,
            &selection.reference_ipa,
            transcribed_text,
            &selection.transcribed_ipa,
        );
        let text = match self.consensus.generate(source, request).await {
            Ok(text) => text,
            Err(GenError::Generation(reason)) => {
                log::warn!("error listing failed ({reason}); degrading to empty analysis");
                return Ok(SodaAnalysis::empty());
            }
            Err(fatal) => return Err(fatal.into()),
        };

        let errors = extract_tagged::<ErrorsPayload>(
            &text,
            prompts::ERRORS_MARKER,
            prompts::JSON_CLOSER,
            ErrorsPayload::default(),
        )
        .into_value()
        .errors;

        // No errors found — the organ attribution call is skipped entirely.
        if errors.is_empty() {
            return Ok(SodaAnalysis::empty());
        }

        let errors_json =
            serde_json::to_string_pretty(&errors).unwrap_or_else(|_| "[]".to_string());
        let request = prompts::organs_request(&errors_json);
        let affected_organs = match self.consensus.generate(source, request).await {
            Ok(text) => {
                extract_tagged::<OrgansPayload>(
                    &text,
                    prompts::ORGANS_MARKER,
                    prompts::JSON_CLOSER,
                    OrgansPayload::default(),
                )
                .into_value()
                .affected_organs
            }
            Err(GenError::Generation(reason)) => {
                log::warn!("organ attribution failed ({reason}); degrading to empty organ set");
                Vec::new()
            }
            Err(fatal) => return Err(fatal.into()),
        };

        let mut analysis = SodaAnalysis {
            errors,
            affected_organs,
        };
        analysis.retain_known_organs();
        Ok(analysis)
    }

    // -----------------------------------------------------------------------
    // Stage 5 — analysis judge
    // -----------------------------------------------------------------------

    async fn select_analysis(
        &self,
        candidates: &CandidateSet<SodaAnalysis>,
        roster: &ModelRoster,
    ) -> Result<SodaVerdict, PipelineError> {
        let analyses_json: Vec<String> = candidates
            .iter()
            .map(|a| serde_json::to_string(a).unwrap_or_else(|_| "{}".to_string()))
            .collect();

        let fallback = SodaVerdict {
            selected: 0,
            confidence: FALLBACK_CONFIDENCE,
            consolidated: candidates.get(0).cloned().unwrap_or_default(),
        };

        let request = prompts::soda_judge_request(&analyses_json);
        let mut verdict = self
            .consensus
            .judge(
                &roster.judge,
                request,
                |text| {
                    try_extract_tagged::<SodaVerdict>(
                        text,
                        prompts::VERDICT_MARKER,
                        prompts::JSON_CLOSER,
                    )
                },
                fallback,
            )
            .await?;

        if verdict.selected >= candidates.len() {
            log::warn!(
                "judge selected out-of-range candidate {} (of {}); clamping to 0",
                verdict.selected,
                candidates.len()
            );
            verdict.selected = 0;
        }
        Ok(verdict)
    }

    // -----------------------------------------------------------------------
    // Stage 6 — final report
    // -----------------------------------------------------------------------

    async fn final_report(
        &self,
        reference_text: &str,
        transcribed_text: &str,
        selection: &IpaSelection,
        verdict: &SodaVerdict,
        profile: Option<&SpeakerProfile>,
        roster: &ModelRoster,
    ) -> Result<SodaSummary, PipelineError> {
        let consolidated_json =
            serde_json::to_string(&verdict.consolidated).unwrap_or_else(|_| "{}".to_string());
        let digest = profile.map(|p| p.summary_line());

        let request = prompts::report_request(
            reference_text,
            transcribed_text,
            &selection.reference_ipa,
            &selection.transcribed_ipa,
            &consolidated_json,
            digest.as_deref(),
        );

        let text = match self.consensus.generate(&roster.judge, request).await {
            Ok(text) => text,
            Err(GenError::Generation(reason)) => {
                log::warn!("report generation failed ({reason}); deriving summary from analysis");
                String::new()
            }
            Err(fatal) => return Err(fatal.into()),
        };

        let summary = match try_extract_tagged::<SodaSummary>(
            &text,
            prompts::REPORT_MARKER,
            prompts::JSON_CLOSER,
        ) {
            Some(summary) => summary,
            None => {
                log::warn!("report unparseable — deriving breakdown from consolidated analysis");
                derive_summary(&verdict.consolidated, profile)
            }
        };
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collapse all whitespace runs to single spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic report fallback: the breakdown is **counted** from the
/// consolidated analysis rather than defaulted — unlike every other stage
/// fallback, which returns constants.
fn derive_summary(analysis: &SodaAnalysis, profile: Option<&SpeakerProfile>) -> SodaSummary {
    let error_breakdown = ErrorBreakdown::count(&analysis.errors);

    let most_affected_organs = if analysis.affected_organs.is_empty() {
        vec!["unknown".to_string()]
    } else {
        analysis.affected_organs.clone()
    };

    let insight = match profile {
        Some(p) if !p.speech_impact.is_empty() => {
            format!("Reported daily-life impact: {}", p.speech_impact)
        }
        _ => "No significant psychological impact noted".to_string(),
    };

    SodaSummary {
        total_errors: error_breakdown.total(),
        error_breakdown,
        most_affected_organs,
        accuracy: AccuracyRating::Moderate,
        insight,
        exercises: vec![
            "Practice minimal pair words.".to_string(),
            "Repeat challenging phonemes in isolation.".to_string(),
        ],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::analysis::ErrorKind;
    use crate::llm::{GenBackend, GenEngine, GenerationRequest};
    use crate::stt::MockTranscriber;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Backend whose engines replay a shared response script in call order.
    struct ScriptedBackend {
        script: Arc<Mutex<VecDeque<String>>>,
    }

    impl ScriptedBackend {
        fn new<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                script: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            }
        }
    }

    struct ScriptedEngine {
        script: Arc<Mutex<VecDeque<String>>>,
    }

    impl GenEngine for ScriptedEngine {
        fn generate(&mut self, _request: &GenerationRequest) -> Result<String, GenError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| GenError::Generation("script exhausted".into()))
        }
    }

    impl GenBackend for ScriptedBackend {
        fn load(&self, _source: &str) -> Result<Box<dyn GenEngine>, GenError> {
            Ok(Box::new(ScriptedEngine {
                script: Arc::clone(&self.script),
            }))
        }
    }

    // -----------------------------------------------------------------------
    // Script fragments
    // -----------------------------------------------------------------------

    const REF_IPA: &str = "/aɪ sɔ sæm sɪtɪŋ ɑn ə bʌs/";
    const SPOKEN_IPA: &str = "/aɪ sɔ θæm θɪtɪŋ ɑn ə bʌθ/";

    fn ipa_verdict() -> String {
        format!(
            "Step 1: … <<VERDICT>>{{\"reference_ipa\":\"{REF_IPA}\",\
\"transcribed_ipa\":\"{SPOKEN_IPA}\",\"confidence\":8}}<<VERDICT>>"
        )
    }

    fn errors_response() -> String {
        "<<ERRORS>>{\"errors\":[{\"type\":\"Substitution\",\
\"original_sound\":\"s\",\"produced_sound\":\"θ\",\"position\":\"word 3\"}]}<<ERRORS>>"
            .to_string()
    }

    fn organs_response() -> String {
        "<<ORGANS>>{\"affected_organs\":[\"tongue\",\"teeth\"]}<<ORGANS>>".to_string()
    }

    fn soda_verdict() -> String {
        "<<VERDICT>>{\"selected\":0,\"confidence\":7,\"consolidated\":\
{\"errors\":[{\"type\":\"Substitution\",\"original_sound\":\"s\",\
\"produced_sound\":\"θ\",\"position\":\"word 3\"}],\
\"affected_organs\":[\"tongue\"]}}<<VERDICT>>"
            .to_string()
    }

    fn report_response() -> String {
        "<<REPORT>>{\"total_errors\":1,\"error_breakdown\":\
{\"substitution\":1,\"omission\":0,\"distortion\":0,\"addition\":0},\
\"most_affected_organs\":[\"tongue\"],\"accuracy\":\"Moderate\",\
\"insight\":\"consistent /s/ fronting\",\
\"exercises\":[\"minimal pairs: sip/thip\"]}<<REPORT>>"
            .to_string()
    }

    /// Full happy-path script: 6 IPA attempts, pair judge, 3 × (errors +
    /// organs), analysis judge, report.
    fn happy_script() -> Vec<String> {
        let mut script = vec![REF_IPA.to_string(); 3];
        script.extend(vec![SPOKEN_IPA.to_string(); 3]);
        script.push(ipa_verdict());
        for _ in 0..3 {
            script.push(errors_response());
            script.push(organs_response());
        }
        script.push(soda_verdict());
        script.push(report_response());
        script
    }

    fn pipeline_over(script: Vec<String>, transcript: &str) -> AssessmentPipeline {
        let manager = Arc::new(ModelManager::new(Box::new(ScriptedBackend::new(script))));
        let stt: Arc<dyn Transcriber> = Arc::new(MockTranscriber::ok(transcript));
        AssessmentPipeline::new(manager, stt, PipelineConfig::default())
    }

    fn one_second_of_silence() -> Vec<f32> {
        vec![0.0f32; 16_000]
    }

    const REFERENCE: &str = "I saw Sam sitting on a bus";
    const TRANSCRIPT: &str = "I saw Tham thitting on a buth";

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn full_run_produces_populated_result() {
        let pipeline = pipeline_over(happy_script(), TRANSCRIPT);
        let roster = ModelRoster::uniform("model.gguf");

        let result = pipeline
            .run(&one_second_of_silence(), REFERENCE, &roster, None)
            .await
            .expect("run should succeed");

        assert_eq!(result.reference_text, REFERENCE);
        assert_eq!(result.transcribed_text, TRANSCRIPT);
        assert_eq!(result.reference_ipa_candidates.len(), 3);
        assert_eq!(result.transcribed_ipa_candidates.len(), 3);
        assert_eq!(result.ipa_selection.confidence, 8);
        assert_eq!(result.ipa_selection.reference_ipa, REF_IPA);
        assert_eq!(result.soda_candidates.len(), 3);
        assert_eq!(result.soda_verdict.selected, 0);
        assert_eq!(result.summary.total_errors, 1);
        assert_eq!(result.summary.error_breakdown.substitution, 1);
        assert_eq!(result.summary.most_affected_organs, vec!["tongue".to_string()]);
    }

    #[tokio::test]
    async fn uniform_roster_loads_the_model_once() {
        // The scripted backend would hand out a fresh engine per load; the
        // script being shared makes reloads invisible, so count via a probe.
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingBackend {
            inner: ScriptedBackend,
            loads: Arc<AtomicUsize>,
        }

        impl GenBackend for CountingBackend {
            fn load(&self, source: &str) -> Result<Box<dyn GenEngine>, GenError> {
                self.loads.fetch_add(1, Ordering::SeqCst);
                self.inner.load(source)
            }
        }

        let loads = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: ScriptedBackend::new(happy_script()),
            loads: Arc::clone(&loads),
        };
        let manager = Arc::new(ModelManager::new(Box::new(backend)));
        let stt: Arc<dyn Transcriber> = Arc::new(MockTranscriber::ok(TRANSCRIPT));
        let pipeline = AssessmentPipeline::new(manager, stt, PipelineConfig::default());

        pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .expect("run should succeed");

        assert_eq!(loads.load(Ordering::SeqCst), 1, "same source must not reload");
    }

    // -----------------------------------------------------------------------
    // Stage 1 failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn whitespace_only_transcript_aborts() {
        let pipeline = pipeline_over(happy_script(), "  \t  \n ");
        let err = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptionFailed(_)));
    }

    #[tokio::test]
    async fn transcriber_error_aborts() {
        let manager = Arc::new(ModelManager::new(Box::new(ScriptedBackend::new(
            happy_script(),
        ))));
        let stt: Arc<dyn Transcriber> = Arc::new(MockTranscriber::err(
            crate::stt::TranscriptionError::Inference("mic fell over".into()),
        ));
        let pipeline = AssessmentPipeline::new(manager, stt, PipelineConfig::default());

        let err = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptionFailed(msg) if msg.contains("mic fell over")));
    }

    // -----------------------------------------------------------------------
    // Stage 2 — quorum
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unparseable_ipa_candidates_fail_quorum() {
        // Every reference attempt returns slash-free text: 3 attempts × 2
        // tries all dropped → quorum of 3 unmet.
        let script = vec!["no phonetics here".to_string(); 6];
        let pipeline = pipeline_over(script, TRANSCRIPT);

        let err = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .unwrap_err();

        match err {
            PipelineError::InsufficientCandidates { stage, got, need } => {
                assert_eq!(stage, STAGE_REFERENCE_IPA);
                assert_eq!(got, 0);
                assert_eq!(need, 3);
            }
            other => panic!("expected InsufficientCandidates, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_dropped_attempts_still_fail_quorum() {
        // Attempt 1 parses; attempts 2 and 3 burn both tries → got 1 of 3.
        let script = vec![
            REF_IPA.to_string(),
            "bad".to_string(),
            "bad".to_string(),
            "bad".to_string(),
            "bad".to_string(),
        ];
        let pipeline = pipeline_over(script, TRANSCRIPT);

        let err = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::InsufficientCandidates { got: 1, need: 3, .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Stage 3 — judge fallback
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unparseable_pair_verdict_selects_first_candidates() {
        let mut script = vec![REF_IPA.to_string(); 3];
        script.extend(vec![SPOKEN_IPA.to_string(); 3]);
        script.push("I refuse to answer in JSON".to_string()); // pair judge
        for _ in 0..3 {
            script.push(errors_response());
            script.push(organs_response());
        }
        script.push(soda_verdict());
        script.push(report_response());

        let pipeline = pipeline_over(script, TRANSCRIPT);
        let result = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .expect("fallback verdict must keep the run alive");

        assert_eq!(result.ipa_selection.reference_ipa, REF_IPA);
        assert_eq!(result.ipa_selection.transcribed_ipa, SPOKEN_IPA);
        assert_eq!(result.ipa_selection.confidence, FALLBACK_CONFIDENCE);
    }

    // -----------------------------------------------------------------------
    // Stage 4 — degraded sub-steps
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn zero_error_attempt_skips_organ_call() {
        let mut script = vec![REF_IPA.to_string(); 3];
        script.extend(vec![SPOKEN_IPA.to_string(); 3]);
        script.push(ipa_verdict());
        // All three attempts report no errors — no organ calls are made, so
        // the script jumps straight to the judge and report.
        script.push("<<ERRORS>>{\"errors\":[]}<<ERRORS>>".to_string());
        script.push("<<ERRORS>>{\"errors\":[]}<<ERRORS>>".to_string());
        script.push("<<ERRORS>>{\"errors\":[]}<<ERRORS>>".to_string());
        script.push(soda_verdict());
        script.push(report_response());

        let pipeline = pipeline_over(script, TRANSCRIPT);
        let result = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .expect("run should succeed");

        for analysis in result.soda_candidates.iter() {
            assert!(analysis.errors.is_empty());
            assert!(analysis.affected_organs.is_empty());
        }
    }

    #[tokio::test]
    async fn unparseable_organ_response_degrades_to_empty_set() {
        let mut script = vec![REF_IPA.to_string(); 3];
        script.extend(vec![SPOKEN_IPA.to_string(); 3]);
        script.push(ipa_verdict());
        for _ in 0..3 {
            script.push(errors_response());
            script.push("the tongue, probably?".to_string()); // unparseable organs
        }
        script.push(soda_verdict());
        script.push(report_response());

        let pipeline = pipeline_over(script, TRANSCRIPT);
        let result = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .expect("run should succeed");

        for analysis in result.soda_candidates.iter() {
            assert_eq!(analysis.errors.len(), 1, "errors sub-step must survive");
            assert!(analysis.affected_organs.is_empty(), "organs degrade to empty");
        }
    }

    // -----------------------------------------------------------------------
    // Stage 6 — derived fallback
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unparseable_report_derives_breakdown_from_analysis() {
        // Consolidated analysis: 2 substitutions + 1 omission.
        let consolidated_verdict = "<<VERDICT>>{\"selected\":1,\"confidence\":6,\
\"consolidated\":{\"errors\":[\
{\"type\":\"Substitution\",\"original_sound\":\"s\",\"produced_sound\":\"θ\",\"position\":\"1\"},\
{\"type\":\"Substitution\",\"original_sound\":\"s\",\"produced_sound\":\"θ\",\"position\":\"3\"},\
{\"type\":\"Omission\",\"original_sound\":\"t\",\"produced_sound\":\"\",\"position\":\"5\"}],\
\"affected_organs\":[\"tongue\",\"teeth\"]}}<<VERDICT>>";

        let mut script = vec![REF_IPA.to_string(); 3];
        script.extend(vec![SPOKEN_IPA.to_string(); 3]);
        script.push(ipa_verdict());
        for _ in 0..3 {
            script.push(errors_response());
            script.push(organs_response());
        }
        script.push(consolidated_verdict.to_string());
        script.push("here is your report: everything went fine!".to_string()); // unparseable

        let pipeline = pipeline_over(script, TRANSCRIPT);
        let result = pipeline
            .run(
                &one_second_of_silence(),
                REFERENCE,
                &ModelRoster::uniform("model.gguf"),
                None,
            )
            .await
            .expect("run should succeed");

        // Derived, not defaulted: exact counts from the consolidated errors.
        assert_eq!(result.summary.error_breakdown.substitution, 2);
        assert_eq!(result.summary.error_breakdown.omission, 1);
        assert_eq!(result.summary.error_breakdown.distortion, 0);
        assert_eq!(result.summary.total_errors, 3);
        assert_eq!(
            result.summary.most_affected_organs,
            vec!["tongue".to_string(), "teeth".to_string()]
        );
        assert_eq!(result.summary.accuracy, AccuracyRating::Moderate);
    }

    // -----------------------------------------------------------------------
    // derive_summary
    // -----------------------------------------------------------------------

    fn error_of(kind: ErrorKind) -> ArticulationError {
        ArticulationError {
            kind,
            original_sound: "s".into(),
            produced_sound: "θ".into(),
            position: "0".into(),
        }
    }

    #[test]
    fn derive_summary_without_organs_reports_unknown() {
        let analysis = SodaAnalysis {
            errors: vec![error_of(ErrorKind::Distortion)],
            affected_organs: vec![],
        };
        let summary = derive_summary(&analysis, None);
        assert_eq!(summary.most_affected_organs, vec!["unknown".to_string()]);
        assert_eq!(summary.error_breakdown.distortion, 1);
        assert_eq!(summary.insight, "No significant psychological impact noted");
        assert!(!summary.exercises.is_empty());
    }

    #[test]
    fn derive_summary_uses_profile_impact_when_present() {
        let profile = SpeakerProfile {
            speech_impact: "Significantly".into(),
            ..SpeakerProfile::default()
        };
        let summary = derive_summary(&SodaAnalysis::empty(), Some(&profile));
        assert!(summary.insight.contains("Significantly"));
        assert_eq!(summary.total_errors, 0);
    }

    // -----------------------------------------------------------------------
    // normalize_whitespace
    // -----------------------------------------------------------------------

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        assert_eq!(
            normalize_whitespace("  I   saw\tSam \n sitting "),
            "I saw Sam sitting"
        );
    }

    #[test]
    fn empty_and_blank_normalize_to_empty() {
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace(" \t\n "), "");
    }
}
