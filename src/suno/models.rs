use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipStatus {
    Submitted,
    Queued,
    Streaming,
    Complete,
    Error,
    #[serde(other)]
    Unknown,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Submitted => "submitted",
            ClipStatus::Queued => "queued",
            ClipStatus::Streaming => "streaming",
            ClipStatus::Complete => "complete",
            ClipStatus::Error => "error",
            ClipStatus::Unknown => "unknown",
        }
    }

    /// Audio can be played (partially or fully).
    pub fn is_playable(&self) -> bool {
        matches!(self, ClipStatus::Streaming | ClipStatus::Complete)
    }
}

impl From<String> for ClipStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "submitted" => ClipStatus::Submitted,
            "queued" => ClipStatus::Queued,
            "streaming" => ClipStatus::Streaming,
            "complete" => ClipStatus::Complete,
            "error" => ClipStatus::Error,
            _ => ClipStatus::Unknown,
        }
    }
}

impl std::fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Raw provider shapes

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub gpt_description_prompt: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub negative_tags: Option<String>,
    #[serde(default, rename = "type")]
    pub clip_type: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawClip {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: RawMetadata,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub clips: Vec<RawClip>,
}

/// Flattened clip record handed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub id: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub lyric: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: Option<String>,
    pub model_name: Option<String>,
    pub gpt_description_prompt: Option<String>,
    pub prompt: Option<String>,
    pub status: ClipStatus,
    #[serde(rename = "type")]
    pub clip_type: Option<String>,
    pub tags: Option<String>,
    pub negative_tags: Option<String>,
    pub duration: Option<f64>,
    pub error_message: Option<String>,
}

impl From<RawClip> for AudioInfo {
    fn from(raw: RawClip) -> Self {
        let status = raw
            .status
            .map(ClipStatus::from)
            .unwrap_or(ClipStatus::Unknown);
        Self {
            id: raw.id,
            title: raw.title,
            image_url: raw.image_url,
            lyric: raw.metadata.prompt.as_deref().map(normalize_lyrics),
            audio_url: raw.audio_url,
            video_url: raw.video_url,
            created_at: raw.created_at,
            model_name: raw.model_name,
            gpt_description_prompt: raw.metadata.gpt_description_prompt,
            prompt: raw.metadata.prompt,
            status,
            clip_type: raw.metadata.clip_type,
            tags: raw.metadata.tags,
            negative_tags: raw.metadata.negative_tags,
            duration: raw.metadata.duration,
            error_message: raw.metadata.error_message,
        }
    }
}

/// Drops blank lines from provider lyrics.
pub fn normalize_lyrics(prompt: &str) -> String {
    prompt
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// How a generation request ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "clips", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Returned without waiting for audio.
    Submitted(Vec<AudioInfo>),
    /// Every clip is streaming or complete.
    Completed(Vec<AudioInfo>),
    /// Every clip errored.
    Failed(Vec<AudioInfo>),
    /// Wait timeout elapsed; clips are the last snapshot and still processing.
    TimedOut(Vec<AudioInfo>),
}

impl GenerationOutcome {
    pub fn clips(&self) -> &[AudioInfo] {
        match self {
            GenerationOutcome::Submitted(c)
            | GenerationOutcome::Completed(c)
            | GenerationOutcome::Failed(c)
            | GenerationOutcome::TimedOut(c) => c,
        }
    }

    pub fn into_clips(self) -> Vec<AudioInfo> {
        match self {
            GenerationOutcome::Submitted(c)
            | GenerationOutcome::Completed(c)
            | GenerationOutcome::Failed(c)
            | GenerationOutcome::TimedOut(c) => c,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            GenerationOutcome::Completed(_) | GenerationOutcome::Failed(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct CustomGenerateRequest {
    pub prompt: String,
    pub tags: String,
    pub title: String,
    pub make_instrumental: bool,
    pub model: Option<String>,
    pub negative_tags: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtendRequest {
    pub clip_id: String,
    pub continue_at: Option<f64>,
    pub prompt: String,
    pub tags: String,
    pub title: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    pub credits_left: i64,
    pub period: Option<String>,
    pub monthly_limit: i64,
    pub monthly_usage: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBillingInfo {
    #[serde(default)]
    pub total_credits_left: i64,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub monthly_limit: i64,
    #[serde(default)]
    pub monthly_usage: i64,
}

impl From<RawBillingInfo> for Credits {
    fn from(raw: RawBillingInfo) -> Self {
        Self {
            credits_left: raw.total_credits_left,
            period: raw.period,
            monthly_limit: raw.monthly_limit,
            monthly_usage: raw.monthly_usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyrics {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub status: String,
}
