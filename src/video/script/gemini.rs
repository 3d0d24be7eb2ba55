use std::time::Duration;

use anyhow::{Result, anyhow};
use rand::Rng;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::{
    ScriptDraft, ScriptSource, enforce_word_limit, hook_already_used, recent_hooks_hint,
    strip_code_fence,
};
use crate::ui::prelude::*;
use crate::video::config::EngineConfig;
use crate::video::model::{ContentFormat, Script};
use crate::video::retry::{RetryPolicy, ServiceError};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const SERVICE: &str = "gemini";
const TEMPERATURE: f64 = 0.95;

const SYSTEM_PROMPT: &str = "Tu écris des scripts de vidéos courtes verticales (Reels, TikTok, \
Shorts) pour NoRadar, un service qui aide les conducteurs à contester leurs amendes routières \
en 60 secondes pour 34€, remboursé si ça ne marche pas. Ton direct, tutoiement, phrases courtes \
terminées par un point, un point d'exclamation ou un point d'interrogation. Ne mentionne jamais \
la méthode juridique utilisée.

Réponds uniquement avec un objet JSON strict :
{
  \"title\": \"Titre_Court_Sans_Espaces\",
  \"hook\": \"Accroche des 3 premières secondes\",
  \"body\": \"Corps du message\",
  \"cta\": \"Appel à l'action final\",
  \"full_text\": \"hook + body + cta, exactement ce qui sera lu\",
  \"duration_estimate\": 25,
  \"hashtags\": [\"amende\", \"radar\", \"noradar\"]
}";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

pub struct GeminiScriptSource {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_attempts: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiScriptSource {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ServiceError::NotConfigured {
                service: SERVICE,
                what: "gemini_api_key",
            })?;

        let client = Client::builder()
            .build()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.gemini_model.clone(),
            max_tokens: config.gemini_max_tokens,
            max_attempts: config.script_max_attempts.max(1),
            timeout: EngineConfig::timeout(config.generation_timeout_secs),
            retry: RetryPolicy::from_config(config),
        })
    }

    fn request_text(&self, prompt: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(format!("{BASE_URL}/{}:generateContent", self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "maxOutputTokens": self.max_tokens,
                    "temperature": TEMPERATURE,
                },
            }))
            .timeout(self.timeout)
            .send()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(SERVICE, status, &body));
        }

        let payload: GenerateResponse = response
            .json()
            .map_err(|err| ServiceError::from_reqwest(SERVICE, err))?;
        response_text(payload)
    }
}

fn response_text(payload: GenerateResponse) -> Result<String, ServiceError> {
    let text: String = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ServiceError::malformed(SERVICE, "response has no text candidate"));
    }
    Ok(text)
}

/// Parse a raw model reply into a script for `format`.
pub fn parse_reply(reply: &str, format: ContentFormat) -> Result<Script, ServiceError> {
    let draft: ScriptDraft = serde_json::from_str(strip_code_fence(reply))
        .map_err(|err| ServiceError::malformed(SERVICE, format!("invalid script JSON: {err}")))?;
    Ok(draft.into_script(format))
}

fn build_prompt(
    format: ContentFormat,
    theme: Option<&str>,
    hooks_hint: Option<&str>,
    nonce: u32,
) -> String {
    let mut prompt = format!(
        "FORMAT : {format}\n{}\nMaximum {} mots lus au total.\n\n[Variation #{nonce}] ",
        format.brief(),
        format.max_words()
    );
    if let Some(theme) = theme.map(str::trim).filter(|theme| !theme.is_empty()) {
        prompt.push_str(&format!("THÈME SPÉCIFIQUE : {theme}\n\n"));
    }
    if let Some(hint) = hooks_hint {
        prompt.push_str(&format!(
            "\nATTENTION - Ces accroches ont DÉJÀ été utilisées, crée une accroche COMPLÈTEMENT \
             DIFFÉRENTE : [{hint}]\n\n"
        ));
    }
    prompt.push_str("Génère UN script au format JSON demandé.");
    prompt
}

impl ScriptSource for GeminiScriptSource {
    fn generate(
        &self,
        format: ContentFormat,
        theme: Option<&str>,
        recent_hooks: &[String],
    ) -> Result<Script> {
        let mut seen: Vec<String> = recent_hooks.to_vec();
        let mut last_error: Option<ServiceError> = None;

        for attempt in 1..=self.max_attempts {
            let nonce = rand::thread_rng().gen_range(10_000..100_000);
            let prompt = build_prompt(format, theme, recent_hooks_hint(&seen).as_deref(), nonce);

            emit(
                Level::Info,
                "script.generate.start",
                &format!("Generating {format} script (attempt {attempt}/{})", self.max_attempts),
                None,
            );

            let reply = self
                .retry
                .run("script generation", || self.request_text(&prompt))?;

            let mut script = match parse_reply(&reply, format) {
                Ok(script) => script,
                Err(err) => {
                    emit(
                        Level::Warn,
                        "script.generate.malformed",
                        &format!("Discarding unusable reply: {err}"),
                        None,
                    );
                    last_error = Some(err);
                    continue;
                }
            };

            if enforce_word_limit(&mut script, format.max_words()) {
                emit(
                    Level::Warn,
                    "script.generate.truncated",
                    &format!("Script body truncated to {} spoken words", format.max_words()),
                    None,
                );
            }

            if hook_already_used(&script.hook, &seen) {
                if attempt < self.max_attempts {
                    emit(
                        Level::Warn,
                        "script.generate.duplicate_hook",
                        &format!("Hook already used, retrying: {}", script.hook),
                        None,
                    );
                    seen.push(script.hook.clone());
                    continue;
                }
                emit(
                    Level::Warn,
                    "script.generate.duplicate_hook",
                    &format!(
                        "Hook still duplicated after {} attempts, keeping it",
                        self.max_attempts
                    ),
                    None,
                );
            }

            emit(
                Level::Success,
                "script.generate.done",
                &format!("Script generated: {}", script.title),
                Some(json!({
                    "id": script.id,
                    "format": script.format,
                    "words": script.word_count(),
                })),
            );
            return Ok(script);
        }

        Err(match last_error {
            Some(err) => anyhow!(err).context(format!(
                "Script generation failed after {} attempts",
                self.max_attempts
            )),
            None => anyhow!(
                "Script generation failed after {} attempts",
                self.max_attempts
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"title\":\"Flash\",\"hook\":\"Flashé ?\",\"body\":\"Attends.\",\
                     \"cta\":\"Lien en bio.\",\"hashtags\":[\"radar\"]}\n```";
        let script = parse_reply(reply, ContentFormat::Scandale).unwrap();

        assert_eq!(script.format, ContentFormat::Scandale);
        assert_eq!(script.hook, "Flashé ?");
        assert_eq!(script.full_text, "Flashé ? Attends. Lien en bio.");
        assert_eq!(script.hashtags, vec!["radar"]);
    }

    #[test]
    fn unparseable_reply_is_malformed() {
        let err = parse_reply("Voici ton script !", ContentFormat::Tuto).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn empty_candidates_are_malformed() {
        let payload: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            response_text(payload),
            Err(ServiceError::Malformed { .. })
        ));

        let payload: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\""}, {"text": ":1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(payload).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn prompt_carries_theme_and_hint() {
        let prompt = build_prompt(
            ContentFormat::Mythe,
            Some("radar tronçon"),
            Some("h1 | h2"),
            12345,
        );
        assert!(prompt.contains("FORMAT : mythe"));
        assert!(prompt.contains("Maximum 70 mots"));
        assert!(prompt.contains("[Variation #12345]"));
        assert!(prompt.contains("THÈME SPÉCIFIQUE : radar tronçon"));
        assert!(prompt.contains("[h1 | h2]"));

        let bare = build_prompt(ContentFormat::Tuto, Some("  "), None, 1);
        assert!(!bare.contains("THÈME"));
        assert!(!bare.contains("ATTENTION"));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = EngineConfig {
            gemini_api_key: None,
            ..EngineConfig::default()
        };
        assert!(matches!(
            GeminiScriptSource::from_config(&config),
            Err(ServiceError::NotConfigured { .. })
        ));
    }
}
