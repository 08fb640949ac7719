//! Planning oracle client
//!
//! The oracle is an external service that answers four request kinds with
//! structured JSON: vibe analysis, track evaluation, transition planning,
//! and playlist finalization. It is stateless between calls; continuity
//! comes from passing the prior playlist as context.
//!
//! The HTTP client enforces a per-call timeout, retries transient failures
//! with exponential backoff, and re-prompts once with the expected schema
//! when a response fails to parse. Payloads are validated here at the
//! boundary; unknown fields are ignored, never propagated.

use mixtape_common::set::{EnergyPattern, MixingStyle};
use mixtape_common::track::Track;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Oracle client errors
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Oracle returned status {0}")]
    Status(u16),

    #[error("Invalid JSON from oracle: {0}")]
    InvalidJson(String),
}

impl OracleError {
    /// Transient errors are retried with backoff; invalid JSON goes down
    /// the schema re-prompt path instead.
    fn is_transient(&self) -> bool {
        match self {
            OracleError::Network(_) | OracleError::Timeout => true,
            OracleError::Status(code) => *code == 429 || *code >= 500,
            OracleError::InvalidJson(_) => false,
        }
    }
}

/// Requested energy shape over the whole set, as the oracle reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyProgression {
    Steady,
    Building,
    Cooling,
    Wave,
}

/// Suggested BPM range for a vibe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmRange {
    pub min: f64,
    pub max: f64,
}

impl Default for BpmRange {
    fn default() -> Self {
        Self {
            min: 100.0,
            max: 140.0,
        }
    }
}

/// The oracle's reading of a vibe request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VibeAnalysis {
    /// Target energy level, 0-1
    pub energy_level: f64,
    pub energy_progression: EnergyProgression,
    pub mood_keywords: Vec<String>,
    /// Empty means no genre filtering
    pub genre_preferences: Vec<String>,
    pub bpm_range: BpmRange,
    pub mixing_style: MixingStyle,
    /// Oracle-decided track count; absent means the planner derives one
    pub track_count: Option<u32>,
}

impl Default for VibeAnalysis {
    fn default() -> Self {
        Self {
            energy_level: 0.5,
            energy_progression: EnergyProgression::Steady,
            mood_keywords: Vec::new(),
            genre_preferences: Vec::new(),
            bpm_range: BpmRange::default(),
            mixing_style: MixingStyle::Smooth,
            track_count: None,
        }
    }
}

impl VibeAnalysis {
    /// Deterministic stand-in when the oracle is unreachable: neutral
    /// energy, wide BPM range, no genre filtering.
    pub fn fallback(vibe: &str) -> Self {
        Self {
            mood_keywords: vibe.split_whitespace().map(str::to_lowercase).collect(),
            ..Self::default()
        }
    }
}

/// The oracle's verdict on one candidate track
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackEvaluation {
    /// Suitability score, 0-1
    pub score: f64,
    pub reasoning: String,
    pub energy_match: f64,
    pub suggested_position: Option<u32>,
    pub mixing_notes: String,
}

impl Default for TrackEvaluation {
    fn default() -> Self {
        Self {
            score: 0.5,
            reasoning: "Evaluation unavailable, using default score".to_string(),
            energy_match: 0.5,
            suggested_position: None,
            mixing_notes: "Standard mix".to_string(),
        }
    }
}

/// Raw effect as the oracle sends it, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleEffect {
    #[serde(rename = "type")]
    pub kind: String,
    pub start_at: f64,
    pub duration: f64,
    pub intensity: f64,
    pub parameters: serde_json::Map<String, Value>,
}

impl Default for OracleEffect {
    fn default() -> Self {
        Self {
            kind: "filter_sweep".to_string(),
            start_at: 0.0,
            duration: 3.0,
            intensity: 0.5,
            parameters: serde_json::Map::new(),
        }
    }
}

/// Raw transition plan as the oracle sends it, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleTransition {
    pub compatibility_score: f64,
    pub transition_type: String,
    pub effects: Vec<OracleEffect>,
    /// Crossfade length in seconds
    pub crossfade_duration: f64,
    pub crossfade_curve: String,
    pub technique_notes: String,
    pub risk_level: String,
    /// Fraction of the outgoing track where its outro starts
    pub outro_cue: Option<f64>,
    /// Fraction of the incoming track where its intro starts
    pub intro_cue: Option<f64>,
}

impl Default for OracleTransition {
    fn default() -> Self {
        Self {
            compatibility_score: 0.7,
            transition_type: "smooth_blend".to_string(),
            effects: Vec::new(),
            crossfade_duration: 8.0,
            crossfade_curve: "s_curve".to_string(),
            technique_notes: String::new(),
            risk_level: "safe".to_string(),
            outro_cue: None,
            intro_cue: None,
        }
    }
}

/// One entry of the finalized playlist ordering
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FinalizedTrack {
    pub filepath: String,
    pub order: u32,
    pub mixing_note: String,
    pub energy: f64,
}

/// A key moment the oracle calls out in the finalized set
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FinalizedMoment {
    pub position: u32,
    pub description: String,
}

/// The oracle's finalized playlist with flow notes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlaylistFinalization {
    pub tracks: Vec<FinalizedTrack>,
    pub overall_flow: String,
    pub key_moments: Vec<FinalizedMoment>,
    pub mixing_style: MixingStyle,
    /// Estimated set length in minutes
    pub set_duration: f64,
    /// Energy level per position, 0-1
    pub energy_graph: Vec<f64>,
}

/// Context entry describing the playlist built so far, sent along with
/// track evaluation requests for conversational continuity.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistContextEntry {
    pub title: Option<String>,
    pub bpm: f64,
    pub position: usize,
}

/// The planning oracle interface.
///
/// Implementations must apply their own retry policy; callers treat any
/// returned error as final and fall back deterministically.
pub trait OracleClient: Send + Sync {
    fn analyze_vibe(
        &self,
        vibe: &str,
        duration_minutes: u32,
        energy_pattern: EnergyPattern,
    ) -> impl std::future::Future<Output = std::result::Result<VibeAnalysis, OracleError>> + Send;

    fn evaluate_track(
        &self,
        track: &Track,
        vibe: &VibeAnalysis,
        playlist_context: &[PlaylistContextEntry],
    ) -> impl std::future::Future<Output = std::result::Result<TrackEvaluation, OracleError>> + Send;

    fn plan_transition(
        &self,
        from: &Track,
        to: &Track,
        style: MixingStyle,
    ) -> impl std::future::Future<Output = std::result::Result<OracleTransition, OracleError>> + Send;

    fn finalize_playlist(
        &self,
        tracks: &[Track],
        vibe: &str,
    ) -> impl std::future::Future<Output = std::result::Result<PlaylistFinalization, OracleError>> + Send;
}

/// Reqwest-backed oracle client.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_retries: u32,
}

/// Base delay for exponential backoff between retries
const BACKOFF_BASE_MS: u64 = 500;

impl HttpOracle {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> std::result::Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            max_retries,
        })
    }

    /// One request kind, with retry/backoff and the schema re-prompt.
    async fn call<T: DeserializeOwned>(
        &self,
        kind: &str,
        payload: Value,
        schema_hint: &str,
    ) -> std::result::Result<T, OracleError> {
        let mut attempt = 0u32;
        loop {
            match self.call_once(kind, &payload, None).await {
                Ok(response) => return self.parse_or_reprompt(kind, &payload, response, schema_hint).await,
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = Duration::from_millis(BACKOFF_BASE_MS * (1 << attempt));
                    warn!(kind, attempt, error = %e, "Oracle call failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Parse the response body; on invalid JSON, re-prompt once with the
    /// expected schema attached, then give up.
    async fn parse_or_reprompt<T: DeserializeOwned>(
        &self,
        kind: &str,
        payload: &Value,
        body: String,
        schema_hint: &str,
    ) -> std::result::Result<T, OracleError> {
        match serde_json::from_str(&body) {
            Ok(parsed) => Ok(parsed),
            Err(first_error) => {
                warn!(kind, error = %first_error, "Invalid oracle payload, re-prompting with schema");
                let body = self.call_once(kind, payload, Some(schema_hint)).await?;
                serde_json::from_str(&body)
                    .map_err(|e| OracleError::InvalidJson(e.to_string()))
            }
        }
    }

    async fn call_once(
        &self,
        kind: &str,
        payload: &Value,
        schema_hint: Option<&str>,
    ) -> std::result::Result<String, OracleError> {
        let mut envelope = json!({ "kind": kind, "payload": payload });
        if let Some(schema) = schema_hint {
            envelope["schema"] = Value::String(schema.to_string());
        }

        debug!(kind, "Querying oracle");
        let mut request = self.client.post(&self.endpoint).json(&envelope);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))
    }

    fn track_summary(track: &Track) -> Value {
        json!({
            "title": track.title,
            "artist": track.artist,
            "bpm": track.bpm,
            "key": track.camelot_key.map(|k| k.to_string()).unwrap_or_else(|| track.key.clone()),
            "energy": track.energy_level,
            "genre": track.genre,
            "duration": track.duration,
        })
    }
}

const VIBE_SCHEMA: &str = r#"{"energy_level": 0.0-1.0, "energy_progression": "steady|building|cooling|wave", "mood_keywords": ["..."], "genre_preferences": ["..."], "bpm_range": {"min": 0, "max": 0}, "mixing_style": "smooth|aggressive|creative", "track_count": 0}"#;

const EVALUATION_SCHEMA: &str = r#"{"score": 0.0-1.0, "reasoning": "...", "energy_match": 0.0-1.0, "suggested_position": 1, "mixing_notes": "..."}"#;

const TRANSITION_SCHEMA: &str = r#"{"compatibility_score": 0.0-1.0, "transition_type": "smooth_blend|quick_cut|effects_transition|beatmatch_blend|scratch_cut|fade_to_silence", "effects": [{"type": "filter_sweep|echo|reverb|delay|gate|flanger|eq_sweep|scratch", "start_at": 0.0, "duration": 0.0, "intensity": 0.0-1.0}], "crossfade_duration": 8.0, "crossfade_curve": "linear|s_curve|exponential", "technique_notes": "...", "risk_level": "safe|moderate|adventurous"}"#;

const FINALIZATION_SCHEMA: &str = r#"{"tracks": [{"filepath": "...", "order": 1, "mixing_note": "...", "energy": 0.0-1.0}], "overall_flow": "...", "key_moments": [{"position": 1, "description": "..."}], "mixing_style": "smooth|aggressive|creative", "set_duration": 0.0, "energy_graph": [0.0]}"#;

impl OracleClient for HttpOracle {
    async fn analyze_vibe(
        &self,
        vibe: &str,
        duration_minutes: u32,
        energy_pattern: EnergyPattern,
    ) -> std::result::Result<VibeAnalysis, OracleError> {
        self.call(
            "vibe_analysis",
            json!({
                "vibe": vibe,
                "duration_minutes": duration_minutes,
                "energy_pattern": energy_pattern,
            }),
            VIBE_SCHEMA,
        )
        .await
    }

    async fn evaluate_track(
        &self,
        track: &Track,
        vibe: &VibeAnalysis,
        playlist_context: &[PlaylistContextEntry],
    ) -> std::result::Result<TrackEvaluation, OracleError> {
        self.call(
            "track_evaluation",
            json!({
                "track": Self::track_summary(track),
                "vibe_analysis": vibe,
                "playlist_context": playlist_context,
            }),
            EVALUATION_SCHEMA,
        )
        .await
    }

    async fn plan_transition(
        &self,
        from: &Track,
        to: &Track,
        style: MixingStyle,
    ) -> std::result::Result<OracleTransition, OracleError> {
        self.call(
            "transition_plan",
            json!({
                "from_track": Self::track_summary(from),
                "to_track": Self::track_summary(to),
                "mixing_style": style,
            }),
            TRANSITION_SCHEMA,
        )
        .await
    }

    async fn finalize_playlist(
        &self,
        tracks: &[Track],
        vibe: &str,
    ) -> std::result::Result<PlaylistFinalization, OracleError> {
        let summaries: Vec<Value> = tracks
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let mut summary = Self::track_summary(track);
                summary["position"] = json!(i + 1);
                summary["filepath"] = json!(track.filepath);
                summary
            })
            .collect();
        self.call(
            "playlist_finalization",
            json!({ "tracks": summaries, "vibe": vibe }),
            FINALIZATION_SCHEMA,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpOracle::new(
            "http://127.0.0.1:5730/oracle".to_string(),
            None,
            Duration::from_secs(30),
            3,
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_vibe_analysis_lenient_parse() {
        // Unknown fields ignored, missing fields defaulted
        let parsed: VibeAnalysis = serde_json::from_str(
            r#"{"energy_level": 0.8, "bpm_range": {"min": 120, "max": 150},
                "surprise_field": true}"#,
        )
        .unwrap();
        assert_eq!(parsed.energy_level, 0.8);
        assert_eq!(parsed.bpm_range.min, 120.0);
        assert_eq!(parsed.energy_progression, EnergyProgression::Steady);
        assert!(parsed.genre_preferences.is_empty());
    }

    #[test]
    fn test_vibe_fallback() {
        let fallback = VibeAnalysis::fallback("Late Night Chill");
        assert_eq!(fallback.energy_level, 0.5);
        assert_eq!(fallback.bpm_range.min, 100.0);
        assert_eq!(fallback.bpm_range.max, 140.0);
        assert!(fallback.genre_preferences.is_empty());
        assert_eq!(
            fallback.mood_keywords,
            vec!["late".to_string(), "night".to_string(), "chill".to_string()]
        );
    }

    #[test]
    fn test_transition_lenient_parse() {
        let parsed: OracleTransition = serde_json::from_str(
            r#"{"transition_type": "smooth_blend",
                "effects": [{"type": "filter", "start_at": 0, "duration": 6}],
                "crossfade_duration": 12.0}"#,
        )
        .unwrap();
        assert_eq!(parsed.effects.len(), 1);
        assert_eq!(parsed.effects[0].kind, "filter");
        // Missing intensity defaulted
        assert_eq!(parsed.effects[0].intensity, 0.5);
        assert_eq!(parsed.compatibility_score, 0.7);
    }

    #[test]
    fn test_transient_classification() {
        assert!(OracleError::Timeout.is_transient());
        assert!(OracleError::Status(503).is_transient());
        assert!(OracleError::Status(429).is_transient());
        assert!(!OracleError::Status(400).is_transient());
        assert!(!OracleError::InvalidJson("x".to_string()).is_transient());
    }
}
