//! Prompt builders for every generation stage.
//!
//! Each builder returns a ready [`GenerationRequest`] with the stage's
//! sampling profile baked in: phonetic transcription runs short and cold
//! (temperature 0.1), judge and analysis calls run deterministic
//! (temperature 0.0) with stops that suppress post-JSON commentary.
//!
//! Structured stages instruct the model to wrap its JSON between a repeated
//! sentinel marker; the markers here and the serde names in
//! [`crate::analysis`] are the two halves of one wire contract.

use crate::llm::GenerationRequest;

// ---------------------------------------------------------------------------
// Sentinel markers
// ---------------------------------------------------------------------------

/// Wraps the phonetic-pair and SODA judge verdicts.
pub const VERDICT_MARKER: &str = "<<VERDICT>>";
/// Wraps the articulation-error list.
pub const ERRORS_MARKER: &str = "<<ERRORS>>";
/// Wraps the affected-organ set.
pub const ORGANS_MARKER: &str = "<<ORGANS>>";
/// Wraps the final report.
pub const REPORT_MARKER: &str = "<<REPORT>>";

/// Minimal token that terminates every payload used here (JSON objects).
pub const JSON_CLOSER: &str = "}";

// ---------------------------------------------------------------------------
// Stage 2 — phonetic transcription
// ---------------------------------------------------------------------------

/// Short, cold request for one slash-delimited phonetic transcription.
pub fn ipa_request(text: &str) -> GenerationRequest {
    let prompt = format!(
        "You are an expert phonetician. Convert this text to an International \
Phonetic Alphabet (IPA) transcription:\nText: \"{text}\"\n\n\
Rules:\n\
1. Use /slashes/\n\
2. Return ONLY the IPA between / /\n\n\
Examples:\n\
\"butter\" → /ˈbʌtər/\n\
\"the quick fox\" → /ðə kwɪk fɑks/\n\n\
IPA:\n"
    );

    GenerationRequest::new(prompt)
        .max_tokens(100)
        .temperature(0.1)
        .stop(["\n", "Text:"])
}

// ---------------------------------------------------------------------------
// Stage 3 — phonetic-pair judge
// ---------------------------------------------------------------------------

/// Judge request over all reference and transcribed IPA candidates.
pub fn ipa_judge_request(
    reference_text: &str,
    transcribed_text: &str,
    reference_ipas: &[String],
    transcribed_ipas: &[String],
) -> GenerationRequest {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str("You are a phonetics expert evaluating IPA transcriptions.\n\n");

    prompt.push_str(&format!("Reference Text: \"{reference_text}\"\n"));
    prompt.push_str("Reference IPA Options:\n");
    for (i, ipa) in reference_ipas.iter().enumerate() {
        prompt.push_str(&format!("{}. {ipa}\n", i + 1));
    }

    prompt.push_str(&format!("\nSpoken Text: \"{transcribed_text}\"\n"));
    prompt.push_str("Spoken IPA Options:\n");
    for (i, ipa) in transcribed_ipas.iter().enumerate() {
        prompt.push_str(&format!("{}. {ipa}\n", i + 1));
    }

    prompt.push_str(
        "\nEvaluation steps:\n\
1. Work out the ideal IPA for the reference text, syllable by syllable.\n\
2. Compare each reference option against it and pick the best match.\n\
3. Do the same for the spoken text and its options.\n\
4. Weigh phonetic accuracy, stress placement, and typical speech variation.\n\
5. Assign a confidence score from 1 to 10.\n\n\
After your reasoning, output exactly one JSON object wrapped in the tags \
below, and nothing after it:\n\
<<VERDICT>>{\n\
  \"reference_ipa\": \"...\",\n\
  \"transcribed_ipa\": \"...\",\n\
  \"confidence\": 5\n\
}<<VERDICT>>\n\n\
Reasoning and final JSON:\n",
    );

    GenerationRequest::new(prompt)
        .max_tokens(400)
        .temperature(0.0)
        .stop(["Note:", "Explanation:"])
}

// ---------------------------------------------------------------------------
// Stage 4 — articulation errors, then affected organs
// ---------------------------------------------------------------------------

/// Request for the articulation-error list of one analysis attempt.
pub fn soda_errors_request(
    reference_text: &str,
    reference_ipa: &str,
    transcribed_text: &str,
    transcribed_ipa: &str,
) -> GenerationRequest {
    let prompt = format!(
        "Compare these two pronunciations for articulation errors.\n\n\
Reference Text: \"{reference_text}\"\n\
Reference IPA: {reference_ipa}\n\n\
Spoken Text: \"{transcribed_text}\"\n\
Spoken IPA: {transcribed_ipa}\n\n\
Instructions:\n\
1. Compare the reference IPA and the spoken IPA sound by sound.\n\
2. Classify every deviation as one of: Substitution, Omission, Distortion, \
Addition.\n\
3. For each error give: type, original_sound, produced_sound, position \
(phoneme or word index).\n\
4. Do not list affected speech organs yet.\n\
5. Output ONLY a JSON object wrapped between {marker} tags:\n\
{marker}\n\
{{\n\
  \"errors\": [\n\
    {{\n\
      \"type\": \"Substitution\",\n\
      \"original_sound\": \"s\",\n\
      \"produced_sound\": \"θ\",\n\
      \"position\": \"word 2\"\n\
    }}\n\
  ]\n\
}}\n\
{marker}\n",
        marker = ERRORS_MARKER,
    );

    GenerationRequest::new(prompt).max_tokens(1000).temperature(0.0)
}

/// Request mapping an error list to the fixed speech-organ vocabulary.
pub fn organs_request(errors_json: &str) -> GenerationRequest {
    let prompt = format!(
        "You are an expert in phonetics and speech articulation.\n\n\
Identify which speech organs are likely responsible for these articulation \
errors:\n\n\
Errors:\n{errors_json}\n\n\
Instructions:\n\
1. Choose only from: lips, teeth, tongue, palate, velum, glottis.\n\
2. Output ONLY a JSON object wrapped between {marker} tags:\n\
{marker}\n\
{{\n\
  \"affected_organs\": [\"tongue\", \"palate\"]\n\
}}\n\
{marker}\n",
        marker = ORGANS_MARKER,
    );

    GenerationRequest::new(prompt).max_tokens(300).temperature(0.0)
}

// ---------------------------------------------------------------------------
// Stage 5 — analysis judge
// ---------------------------------------------------------------------------

/// Judge request over the candidate analyses (rendered as JSON strings).
pub fn soda_judge_request(analyses_json: &[String]) -> GenerationRequest {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str("Evaluate these articulation analyses and select the most accurate one:\n\n");
    prompt.push_str("Analysis Options:\n");
    for (i, analysis) in analyses_json.iter().enumerate() {
        prompt.push_str(&format!("{}. {analysis}\n", i + 1));
    }

    prompt.push_str(&format!(
        "\nRules:\n\
1. Prefer complete error identification.\n\
2. Prefer accurate speech-organ attribution.\n\
3. `selected` is the zero-based index of the best option.\n\
4. `consolidated` merges the best findings across options.\n\
5. Output ONLY a JSON object wrapped between {marker} tags:\n\
{marker}\n\
{{\n\
  \"selected\": 0,\n\
  \"confidence\": 5,\n\
  \"consolidated\": {{\"errors\": [], \"affected_organs\": []}}\n\
}}\n\
{marker}\n",
        marker = VERDICT_MARKER,
    ));

    GenerationRequest::new(prompt).max_tokens(500).temperature(0.1)
}

// ---------------------------------------------------------------------------
// Stage 6 — final report
// ---------------------------------------------------------------------------

/// Request for the final structured report.
///
/// `profile_digest` is the one-line summary from
/// [`SpeakerProfile::summary_line`](crate::profile::SpeakerProfile::summary_line);
/// raw questionnaire answers never reach this prompt.
pub fn report_request(
    reference_text: &str,
    transcribed_text: &str,
    reference_ipa: &str,
    transcribed_ipa: &str,
    consolidated_json: &str,
    profile_digest: Option<&str>,
) -> GenerationRequest {
    let profile_line = profile_digest.unwrap_or("none provided");
    let prompt = format!(
        "You are a clinical speech-language pathologist writing a structured \
articulation report.\n\n\
Input Data:\n\
- Reference Text: \"{reference_text}\"\n\
- Spoken Text: \"{transcribed_text}\"\n\
- Reference IPA: {reference_ipa}\n\
- Spoken IPA: {transcribed_ipa}\n\
- Articulation Analysis: {consolidated_json}\n\
- Speaker Factors: {profile_line}\n\n\
Instructions:\n\
1. Count the articulation errors by category from the analysis.\n\
2. Name the most affected speech organs.\n\
3. Rate articulation accuracy as High, Moderate, or Low.\n\
4. Write one short insight sentence; mention speaker factors only where \
they affect speech effort or consistency, and never quote them verbatim.\n\
5. Suggest practice exercises targeting the specific errors found.\n\
6. Output ONLY a JSON object wrapped between {marker} tags:\n\
{marker}\n\
{{\n\
  \"total_errors\": 0,\n\
  \"error_breakdown\": {{\"substitution\": 0, \"omission\": 0, \
\"distortion\": 0, \"addition\": 0}},\n\
  \"most_affected_organs\": [\"tongue\"],\n\
  \"accuracy\": \"Moderate\",\n\
  \"insight\": \"...\",\n\
  \"exercises\": [\"...\"]\n\
}}\n\
{marker}\n",
        marker = REPORT_MARKER,
    );

    GenerationRequest::new(prompt).max_tokens(400).temperature(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
