//! Reply texts and keyword lists for the canvass conversation

use serde::{Deserialize, Serialize};

use crate::conversation::engine::Reply;

/// Everything the bot says, plus the phrases it listens for.
///
/// Any field can be overridden from the `[script]` table of the config
/// file; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    /// First message, lists the four numbered choices
    pub greeting: String,
    /// Sent when the stance answer has no 1-4 in it
    pub reprompt: String,
    /// Choice 1
    pub supportive: String,
    /// Choice 2, offers an advisor
    pub doubtful: String,
    /// Choice 3
    pub opposed: String,
    /// Choice 4
    pub unaware: String,
    pub locality_thanks: String,
    pub handoff_confirmed: String,
    pub handoff_declined: String,
    pub opt_out_ack: String,
    /// Substrings that opt the contact out, matched case-insensitively
    pub stop_phrases: Vec<String>,
    /// Whole words accepted as "yes" when offering an advisor
    pub affirmative_tokens: Vec<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: concat!(
                "Hola, te habla el equipo de campaña.\n",
                "¿Conoces nuestra propuesta para la Alcaldía?\n\n",
                "1. Sí y estoy de acuerdo\n",
                "2. La conozco pero tengo dudas\n",
                "3. No estoy de acuerdo\n",
                "4. No la conozco"
            )
            .to_string(),
            reprompt: "Responde 1, 2, 3 o 4 por favor.".to_string(),
            supportive: "¡Gracias por tu apoyo! ¿Puedes decirme tu barrio?".to_string(),
            doubtful: "Te contamos: seguridad, empleo y transporte. ¿Quieres hablar con un asesor?"
                .to_string(),
            opposed: "Gracias por tu sinceridad. ¡Feliz día!".to_string(),
            unaware: "Trabajamos por seguridad, empleo y movilidad. ¿Puedes decirme tu barrio?"
                .to_string(),
            locality_thanks: "¡Gracias! Te mantendremos informado para tu zona.".to_string(),
            handoff_confirmed: "Un asesor te contactará pronto.".to_string(),
            handoff_declined: "¡Gracias! Si necesitas algo, escribe.".to_string(),
            opt_out_ack: "Entendido, no volveremos a contactarte.".to_string(),
            stop_phrases: ["stop", "no contactar", "cancelar", "parar", "no volver"]
                .into_iter()
                .map(String::from)
                .collect(),
            affirmative_tokens: ["si", "sí", "ok", "okay", "yes", "claro", "dale"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Script {
    /// Text for a reply key
    pub fn text(&self, reply: Reply) -> &str {
        match reply {
            Reply::Greeting => &self.greeting,
            Reply::Reprompt => &self.reprompt,
            Reply::Supportive => &self.supportive,
            Reply::Doubtful => &self.doubtful,
            Reply::Opposed => &self.opposed,
            Reply::Unaware => &self.unaware,
            Reply::LocalityThanks => &self.locality_thanks,
            Reply::HandoffConfirmed => &self.handoff_confirmed,
            Reply::HandoffDeclined => &self.handoff_declined,
            Reply::OptOutAck => &self.opt_out_ack,
        }
    }

    /// `lowered` must already be lower-cased
    pub fn is_stop_request(&self, lowered: &str) -> bool {
        self.stop_phrases
            .iter()
            .map(|phrase| phrase.trim().to_lowercase())
            .any(|phrase| !phrase.is_empty() && lowered.contains(&phrase))
    }

    /// `lowered` must already be lower-cased
    pub fn is_affirmative(&self, lowered: &str) -> bool {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| {
                self.affirmative_tokens
                    .iter()
                    .any(|token| token.to_lowercase() == word)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_lists_four_choices() {
        let script = Script::default();
        for choice in ["1.", "2.", "3.", "4."] {
            assert!(script.greeting.contains(choice), "missing {}", choice);
        }
    }

    #[test]
    fn test_stop_request_is_substring_match() {
        let script = Script::default();
        assert!(script.is_stop_request("por favor no contactar más"));
        assert!(script.is_stop_request("stop"));
        assert!(script.is_stop_request("quiero cancelar"));
        assert!(!script.is_stop_request("hola"));
    }

    #[test]
    fn test_affirmative_matches_whole_words() {
        let script = Script::default();
        assert!(script.is_affirmative("sí, claro"));
        assert!(script.is_affirmative("ok"));
        assert!(script.is_affirmative("si por favor"));
        assert!(!script.is_affirmative("así no"));
        assert!(!script.is_affirmative("no gracias"));
    }

    #[test]
    fn test_partial_toml_override_keeps_defaults() {
        let script: Script = toml::from_str(r#"reprompt = "Elige 1-4""#).unwrap();
        assert_eq!(script.reprompt, "Elige 1-4");
        assert_eq!(script.opt_out_ack, Script::default().opt_out_ack);
    }

    #[test]
    fn test_configured_phrases_are_case_insensitive() {
        let script = Script {
            stop_phrases: vec!["UNSUBSCRIBE".to_string()],
            affirmative_tokens: vec!["Yep".to_string()],
            ..Script::default()
        };
        assert!(script.is_stop_request("please unsubscribe me"));
        assert!(script.is_affirmative("yep"));
    }
}
