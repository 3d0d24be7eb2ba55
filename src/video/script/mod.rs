//! Script sources and the shared post-processing of generated drafts.

pub mod file;
pub mod gemini;

use anyhow::Result;
use serde::Deserialize;

use crate::video::model::{ContentFormat, Script, new_item_id};

pub use file::FileScriptSource;
pub use gemini::GeminiScriptSource;

/// Number of previous hooks shown to the generator as "already used".
pub const HOOK_HINT_WINDOW: usize = 10;

pub trait ScriptSource {
    /// Produce one script for `format`. `recent_hooks` lists hooks already
    /// used in the current batch, oldest first.
    fn generate(
        &self,
        format: ContentFormat,
        theme: Option<&str>,
        recent_hooks: &[String],
    ) -> Result<Script>;
}

/// Generator output before it is stamped with an id and format.
#[derive(Debug, Deserialize)]
pub struct ScriptDraft {
    pub title: String,
    pub hook: String,
    pub body: String,
    pub cta: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub duration_estimate: Option<u32>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl ScriptDraft {
    pub fn into_script(self, format: ContentFormat) -> Script {
        let mut script = Script {
            id: new_item_id(),
            format,
            title: self.title.trim().to_string(),
            hook: self.hook.trim().to_string(),
            body: self.body.trim().to_string(),
            cta: self.cta.trim().to_string(),
            full_text: self.full_text.trim().to_string(),
            duration_estimate: self.duration_estimate.unwrap_or(25),
            hashtags: self.hashtags,
            created_at: chrono::Local::now(),
        };
        if script.full_text.is_empty() {
            script.full_text = spoken_text(&script);
        }
        script
    }
}

/// Remove a surrounding Markdown code fence, with or without a `json` tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner)
        .trim()
}

/// Hook, body and call to action joined the way they are read aloud.
pub fn spoken_text(script: &Script) -> String {
    [&script.hook, &script.body, &script.cta]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut the body so hook + body + cta fit in `max_words`, rebuilding the
/// spoken text. Returns whether anything was removed.
pub fn enforce_word_limit(script: &mut Script, max_words: usize) -> bool {
    let count = |text: &str| text.split_whitespace().count();
    let total = count(&script.hook) + count(&script.body) + count(&script.cta);
    if total <= max_words {
        return false;
    }

    let budget = max_words.saturating_sub(count(&script.hook) + count(&script.cta));
    script.body = script
        .body
        .split_whitespace()
        .take(budget)
        .collect::<Vec<_>>()
        .join(" ");
    script.full_text = spoken_text(script);
    true
}

/// Case-insensitive comparison against hooks already used in the batch.
pub fn hook_already_used(hook: &str, recent_hooks: &[String]) -> bool {
    let normalized = hook.trim().to_lowercase();
    recent_hooks
        .iter()
        .any(|used| used.trim().to_lowercase() == normalized)
}

/// Last hooks joined for the generator prompt, if any.
pub fn recent_hooks_hint(recent_hooks: &[String]) -> Option<String> {
    if recent_hooks.is_empty() {
        return None;
    }
    let start = recent_hooks.len().saturating_sub(HOOK_HINT_WINDOW);
    Some(recent_hooks[start..].join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(hook: &str, body: &str, cta: &str) -> Script {
        ScriptDraft {
            title: "Titre".to_string(),
            hook: hook.to_string(),
            body: body.to_string(),
            cta: cta.to_string(),
            full_text: String::new(),
            duration_estimate: None,
            hashtags: vec![],
        }
        .into_script(ContentFormat::Tuto)
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn missing_full_text_is_rebuilt_from_parts() {
        let script = draft("Flashé ?", "Ne paie pas tout de suite.", "Lien en bio.");
        assert_eq!(
            script.full_text,
            "Flashé ? Ne paie pas tout de suite. Lien en bio."
        );
        assert_eq!(script.duration_estimate, 25);
        assert_eq!(script.id.len(), 8);
    }

    #[test]
    fn word_limit_truncates_body_only() {
        let body = vec!["mot"; 100].join(" ");
        let mut script = draft("un deux trois", &body, "quatre cinq");

        assert!(enforce_word_limit(&mut script, 45));

        assert_eq!(script.hook, "un deux trois");
        assert_eq!(script.cta, "quatre cinq");
        assert_eq!(script.body.split_whitespace().count(), 40);
        assert_eq!(script.word_count(), 45);
        assert!(script.full_text.starts_with("un deux trois mot"));
        assert!(script.full_text.ends_with("quatre cinq"));
    }

    #[test]
    fn short_script_is_left_alone() {
        let mut script = draft("Hook.", "Corps court.", "Fin.");
        let before = script.clone();
        assert!(!enforce_word_limit(&mut script, 85));
        assert_eq!(script, before);
    }

    #[test]
    fn duplicate_hooks_ignore_case_and_padding() {
        let recent = vec!["Tu as reçu une amende ?".to_string()];
        assert!(hook_already_used("  tu as REÇU une amende ? ", &recent));
        assert!(!hook_already_used("Flashé à 137 ?", &recent));
        assert!(!hook_already_used("anything", &[]));
    }

    #[test]
    fn hint_keeps_the_last_ten_hooks() {
        assert_eq!(recent_hooks_hint(&[]), None);

        let hooks: Vec<String> = (0..12).map(|i| format!("h{i}")).collect();
        let hint = recent_hooks_hint(&hooks).unwrap();
        assert!(hint.starts_with("h2 | h3"));
        assert!(hint.ends_with("h11"));
        assert_eq!(hint.matches(" | ").count(), 9);
    }
}
