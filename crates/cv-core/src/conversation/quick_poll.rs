//! Keyword-driven quick poll
//!
//! The smaller of the two bots: no conversation state, the reply is picked
//! by the first keyword found in the message.

use crate::conversation::Outcome;

/// Reply for one quick-poll message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickPollReply {
    pub text: &'static str,
    /// Stance to record, when the message declared one
    pub stance: Option<Outcome>,
}

/// Checked in order, first match wins
const RULES: &[(&str, &str, Option<Outcome>)] = &[
    (
        "hola",
        "Hola, soy tu asistente automático de Vende Fácil. ¿Te puedo hacer 2 preguntas rápidas?",
        None,
    ),
    ("si", "Perfecto. ¿Conoces la propuesta?", None),
    ("no", "Entiendo. ¿Te consideras a favor, indeciso o en contra?", None),
    ("favor", "Registrado como A FAVOR ✔️", Some(Outcome::Supportive)),
    ("indeciso", "Registrado como INDECISO 🟡", Some(Outcome::Undecided)),
    ("contra", "Registrado como EN CONTRA ❌", Some(Outcome::Opposed)),
];

const FALLBACK: &str = "No entendí bien, ¿puedes repetirlo por favor?";

/// Pick the quick-poll reply for `text`
pub fn quick_reply(text: &str) -> QuickPollReply {
    let lowered = text.to_lowercase();

    RULES
        .iter()
        .find(|(keyword, _, _)| lowered.contains(keyword))
        .map(|&(_, text, stance)| QuickPollReply { text, stance })
        .unwrap_or(QuickPollReply {
            text: FALLBACK,
            stance: None,
        })
}
