//! IPA transcription extraction and the phonetic-pair verdict type.
//!
//! Models are asked to answer with a `/slash-delimited/` transcription but
//! routinely wrap it in prose. [`extract_ipa`] recovers the transcription or
//! reports that none is present (the caller drops or retries the attempt —
//! an answer with no delimiting slash is unusable, not healable).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// extract_ipa
// ---------------------------------------------------------------------------

/// Extract a slash-delimited phonetic transcription from `text`.
///
/// Takes the span between the first and last `/`; when that span itself
/// contains further slashes (several transcriptions in one answer) the last
/// complete segment wins. Returns `None` when no complete `/…/` pair exists.
///
/// # Example
///
/// ```
/// use speech_assess::analysis::extract_ipa;
///
/// assert_eq!(
///     extract_ipa("The IPA is /ðə kwɪk fɑks/."),
///     Some("/ðə kwɪk fɑks/".to_string()),
/// );
/// assert_eq!(extract_ipa("either /a/ or /b/"), Some("/b/".to_string()));
/// assert_eq!(extract_ipa("no transcription here"), None);
/// ```
pub fn extract_ipa(text: &str) -> Option<String> {
    let first = text.find('/')?;
    let last = text.rfind('/')?;
    if first == last {
        // A single slash delimits nothing.
        return None;
    }

    let inner = &text[first + 1..last];
    let segment = match inner.rfind('/') {
        // Several slash groups — keep the last complete one.
        Some(pos) => &inner[pos + 1..],
        None => inner,
    };

    let segment = segment.trim();
    if segment.is_empty() {
        None
    } else {
        Some(format!("/{segment}/"))
    }
}

// ---------------------------------------------------------------------------
// IpaSelection
// ---------------------------------------------------------------------------

/// Judge verdict for the phonetic-pair selection stage: the chosen
/// transcription for the reference text and for the spoken (transcribed)
/// text, with a 1–10 confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpaSelection {
    /// Best transcription of the reference text.
    pub reference_ipa: String,
    /// Best transcription of what was actually said.
    pub transcribed_ipa: String,
    /// Judge confidence, 1–10.
    pub confidence: u8,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- extract_ipa ------------------------------------------------------

    #[test]
    fn plain_delimited_transcription() {
        assert_eq!(
            extract_ipa("/aɪ sɔ sæm sɪtɪŋ ɑn ə bʌs/"),
            Some("/aɪ sɔ sæm sɪtɪŋ ɑn ə bʌs/".to_string())
        );
    }

    #[test]
    fn transcription_with_surrounding_prose() {
        assert_eq!(
            extract_ipa("Sure! The transcription is /ˈbʌtər/ in General American."),
            Some("/ˈbʌtər/".to_string())
        );
    }

    #[test]
    fn multiple_groups_take_last_complete_segment() {
        assert_eq!(
            extract_ipa("\"butter\" → /ˈbʌtər/ or /ˈbʌɾɚ/"),
            Some("/ˈbʌɾɚ/".to_string())
        );
    }

    #[test]
    fn whitespace_inside_slashes_is_trimmed() {
        assert_eq!(extract_ipa("/ ðə kwɪk /"), Some("/ðə kwɪk/".to_string()));
    }

    #[test]
    fn no_slash_yields_none() {
        assert_eq!(extract_ipa("dha kwik fox"), None);
    }

    #[test]
    fn single_slash_yields_none() {
        assert_eq!(extract_ipa("either/or"), None);
    }

    #[test]
    fn empty_pair_yields_none() {
        assert_eq!(extract_ipa("//"), None);
        assert_eq!(extract_ipa("/   /"), None);
    }

    #[test]
    fn empty_text_yields_none() {
        assert_eq!(extract_ipa(""), None);
    }

    // ---- IpaSelection wire format -----------------------------------------

    #[test]
    fn selection_parses_wire_json() {
        let json = r#"{
            "reference_ipa": "/aɪ sɔ sæm/",
            "transcribed_ipa": "/aɪ sɔ θæm/",
            "confidence": 8
        }"#;
        let v: IpaSelection = serde_json::from_str(json).unwrap();
        assert_eq!(v.confidence, 8);
        assert_eq!(v.reference_ipa, "/aɪ sɔ sæm/");
    }
}
