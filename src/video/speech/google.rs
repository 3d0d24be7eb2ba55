use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::{SpeechSynthesizer, SynthesizedAudio, estimate_duration};
use crate::video::config::EngineConfig;
use crate::video::retry::ServiceError;

const ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const SERVICE: &str = "google-tts";
const EFFECTS_PROFILE: &str = "small-bluetooth-speaker-class-device";

/// Google Cloud Text-to-Speech over its REST API, authenticated by API key.
pub struct GoogleTtsSynthesizer {
    client: Client,
    api_key: String,
    language_code: String,
    speaking_rate: f64,
    pitch: f64,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeReply {
    #[serde(default)]
    audio_content: String,
}

impl GoogleTtsSynthesizer {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .google_tts_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ServiceError::NotConfigured {
                service: SERVICE,
                what: "google_tts_api_key",
            })?;

        let client = Client::builder()
            .build()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            language_code: config.tts_language_code.clone(),
            speaking_rate: config.speaking_rate,
            pitch: config.tts_pitch,
            timeout: EngineConfig::timeout(config.synthesis_timeout_secs),
        })
    }

    fn request_body(&self, text: &str, voice: &str) -> serde_json::Value {
        json!({
            "input": { "text": text },
            "voice": {
                "languageCode": self.language_code,
                "name": voice,
            },
            "audioConfig": {
                "audioEncoding": "MP3",
                "speakingRate": self.speaking_rate,
                "pitch": self.pitch,
                "effectsProfileId": [EFFECTS_PROFILE],
            },
        })
    }
}

fn decode_audio(reply: &str) -> Result<Vec<u8>, ServiceError> {
    let reply: SynthesizeReply = serde_json::from_str(reply)
        .map_err(|err| ServiceError::malformed(SERVICE, format!("invalid reply: {err}")))?;
    if reply.audio_content.is_empty() {
        return Err(ServiceError::malformed(SERVICE, "reply carries no audio"));
    }
    general_purpose::STANDARD
        .decode(reply.audio_content.as_bytes())
        .map_err(|err| ServiceError::malformed(SERVICE, format!("audio is not base64: {err}")))
}

impl SpeechSynthesizer for GoogleTtsSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, ServiceError> {
        if voice.trim().is_empty() {
            return Err(ServiceError::NotConfigured {
                service: SERVICE,
                what: "google_voice_name",
            });
        }

        let response = self
            .client
            .post(ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(text, voice.trim()))
            .timeout(self.timeout)
            .send()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;
        if !status.is_success() {
            return Err(ServiceError::from_status(SERVICE, status, &body));
        }

        Ok(SynthesizedAudio {
            bytes: decode_audio(&body)?,
            estimated_duration: estimate_duration(text, self.speaking_rate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_reported_as_not_configured() {
        let err = GoogleTtsSynthesizer::from_config(&EngineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ServiceError::NotConfigured {
                what: "google_tts_api_key",
                ..
            }
        ));
    }

    #[test]
    fn request_names_voice_and_mp3_encoding() {
        let config = EngineConfig {
            google_tts_api_key: Some("key".to_string()),
            speaking_rate: 1.1,
            ..EngineConfig::default()
        };
        let synth = GoogleTtsSynthesizer::from_config(&config).unwrap();

        let body = synth.request_body("Bonjour.", "fr-FR-Neural2-D");

        assert_eq!(body["voice"]["name"], "fr-FR-Neural2-D");
        assert_eq!(body["voice"]["languageCode"], "fr-FR");
        assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(body["audioConfig"]["speakingRate"], 1.1);
    }

    #[test]
    fn audio_content_is_decoded() {
        assert_eq!(decode_audio(r#"{"audioContent":"SUQzZmFrZQ=="}"#).unwrap(), b"ID3fake");
    }

    #[test]
    fn unusable_replies_are_malformed() {
        for reply in [r#"{}"#, r#"{"audioContent":"@@@"}"#, "not json"] {
            let err = decode_audio(reply).unwrap_err();
            assert!(matches!(err, ServiceError::Malformed { .. }), "{reply}");
            assert!(!err.is_transient());
        }
    }
}
