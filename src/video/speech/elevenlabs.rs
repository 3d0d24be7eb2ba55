use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use super::{SpeechSynthesizer, SynthesizedAudio, estimate_duration};
use crate::video::config::EngineConfig;
use crate::video::retry::ServiceError;

const BASE_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const SERVICE: &str = "elevenlabs";

pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    model_id: String,
    speaking_rate: f64,
    timeout: Duration,
}

impl ElevenLabsSynthesizer {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .elevenlabs_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ServiceError::NotConfigured {
                service: SERVICE,
                what: "elevenlabs_api_key",
            })?;

        let client = Client::builder()
            .build()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model_id: config.elevenlabs_model.clone(),
            speaking_rate: config.speaking_rate,
            timeout: EngineConfig::timeout(config.synthesis_timeout_secs),
        })
    }
}

impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, ServiceError> {
        if voice.trim().is_empty() {
            return Err(ServiceError::NotConfigured {
                service: SERVICE,
                what: "elevenlabs_voice_id",
            });
        }

        let response = self
            .client
            .post(format!("{BASE_URL}/{}", voice.trim()))
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": self.model_id,
            }))
            .timeout(self.timeout)
            .send()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(SERVICE, status, &body));
        }

        let bytes = response
            .bytes()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;
        if bytes.is_empty() {
            return Err(ServiceError::malformed(SERVICE, "empty audio body"));
        }

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            estimated_duration: estimate_duration(text, self.speaking_rate),
        })
    }
}
