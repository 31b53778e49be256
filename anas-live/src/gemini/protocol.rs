//! Gemini Live wire messages and their translation to [`ServerEvent`]s.

use crate::audio::{EncodedFrame, from_transport_text};
use crate::events::ServerEvent;
use crate::transport::SessionSetup;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gemini-specific client message format.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    setup: Option<GeminiSetup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realtime_input: Option<GeminiRealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_content: Option<GeminiClientContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSetup {
    model: String,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_modalities: Vec<String>,
    speech_config: GeminiSpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSpeechConfig {
    voice_config: GeminiVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiVoiceConfig {
    prebuilt_voice_config: GeminiPrebuiltVoice,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPrebuiltVoice {
    voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRealtimeInput {
    media_chunks: Vec<GeminiMediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiMediaChunk {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiClientContent {
    turns: Vec<GeminiTurn>,
    turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiTurn {
    role: String,
    parts: Vec<GeminiTextPart>,
}

impl GeminiClientMessage {
    fn empty() -> Self {
        Self { setup: None, realtime_input: None, client_content: None }
    }

    /// Handshake message: model, audio-only responses, voice and instruction.
    pub(crate) fn setup(setup: &SessionSetup) -> Self {
        let system_instruction = (!setup.system_instruction.is_empty()).then(|| GeminiContent {
            parts: vec![GeminiTextPart { text: setup.system_instruction.clone() }],
        });

        Self {
            setup: Some(GeminiSetup {
                model: setup.model.clone(),
                generation_config: GeminiGenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: GeminiSpeechConfig {
                        voice_config: GeminiVoiceConfig {
                            prebuilt_voice_config: GeminiPrebuiltVoice {
                                voice_name: setup.voice.voice_name().to_string(),
                            },
                        },
                    },
                },
                system_instruction,
            }),
            ..Self::empty()
        }
    }

    /// One microphone frame as a realtime media chunk.
    pub(crate) fn audio(frame: &EncodedFrame) -> Self {
        Self {
            realtime_input: Some(GeminiRealtimeInput {
                media_chunks: vec![GeminiMediaChunk {
                    mime_type: frame.format.mime_type(),
                    data: frame.to_transport_text(),
                }],
            }),
            ..Self::empty()
        }
    }

    /// A complete user text turn.
    pub(crate) fn text(text: &str) -> Self {
        Self {
            client_content: Some(GeminiClientContent {
                turns: vec![GeminiTurn {
                    role: "user".to_string(),
                    parts: vec![GeminiTextPart { text: text.to_string() }],
                }],
                turn_complete: true,
            }),
            ..Self::empty()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiServerMessage {
    #[serde(default)]
    setup_complete: Option<Value>,
    #[serde(default)]
    server_content: Option<GeminiServerContent>,
    #[serde(default)]
    go_away: Option<GeminiGoAway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiServerContent {
    #[serde(default)]
    model_turn: Option<GeminiModelTurn>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiModelTurn {
    #[serde(default)]
    parts: Vec<GeminiServerPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiServerPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGoAway {
    #[serde(default)]
    time_left: Option<String>,
}

/// Translate one Gemini server message into unified events.
///
/// A single message may carry speech, an interruption and the end of the
/// turn at once; events come out in that order. Audio parts whose payload
/// is not valid base64 are dropped with a warning. Messages with nothing of
/// interest (e.g. usage metadata) yield no events.
pub(crate) fn translate_server_message(raw: &str) -> serde_json::Result<Vec<ServerEvent>> {
    let message: GeminiServerMessage = serde_json::from_str(raw)?;
    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(ServerEvent::SetupComplete);
    }

    if let Some(content) = message.server_content {
        let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
        for part in parts {
            if let Some(inline) = part.inline_data {
                match from_transport_text(&inline.data) {
                    Ok(data) => events.push(ServerEvent::Audio { data: Bytes::from(data) }),
                    Err(e) => tracing::warn!(
                        error = %e,
                        mime_type = inline.mime_type.as_deref().unwrap_or("unknown"),
                        "Dropping undecodable audio part"
                    ),
                }
            }
            if let Some(text) = part.text {
                events.push(ServerEvent::Text { text });
            }
        }
        if content.interrupted {
            events.push(ServerEvent::Interrupted);
        }
        if content.turn_complete {
            events.push(ServerEvent::TurnComplete);
        }
    }

    if let Some(go_away) = message.go_away {
        events.push(ServerEvent::GoAway { time_left: go_away.time_left });
    }

    Ok(events)
}
