//! Italian prompt templates for the dialogue model.
use crate::conversation::domain::conversation_state::ConversationState;
use crate::memory::domain::conversation_turn::ConversationTurn;
use crate::memory::domain::profile::Profile;

use super::dialogue_oracle::DialogueRequest;

const NO_HISTORY: &str = "Nessuna conversazione precedente con questa persona.";
const NO_EPISODES: &str = "(nessuna memoria episodica disponibile)";

fn stage_instruction(state: ConversationState) -> &'static str {
    match state {
        ConversationState::Greeting => {
            "È l'inizio della conversazione. Puoi salutare brevemente e introdurti con naturalezza."
        }
        ConversationState::FreeTalk => "La conversazione è già in corso. NON salutare di nuovo.",
        ConversationState::Farewell => {
            "La conversazione sta per terminare. Rispondi con un saluto finale caldo e coerente, non riaprire."
        }
    }
}

pub fn format_profile(profile: &Profile) -> String {
    serde_json::to_string_pretty(profile).unwrap_or_else(|_| format!("{{\"name\": \"{}\"}}", profile.name))
}

pub fn format_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return NO_HISTORY.to_string();
    }
    let mut lines = Vec::with_capacity(history.len() * 2);
    for turn in history {
        let ts = turn.timestamp.format("%Y-%m-%d %H:%M:%S");
        if !turn.user.trim().is_empty() {
            lines.push(format!("[{ts}] Utente: {}", turn.user.trim()));
        }
        if !turn.bot.trim().is_empty() {
            lines.push(format!("[{ts}] Robot: {}", turn.bot.trim()));
        }
    }
    lines.join("\n")
}

pub fn build_reply_prompt(request: &DialogueRequest) -> String {
    let profile = &request.context.profile;
    let episodes = match profile.notes_summary.trim() {
        "" => NO_EPISODES,
        notes => notes,
    };
    let first_turn_rule = if request.is_first_turn {
        "- Questo è il primo turno: puoi usare il nome della persona."
    } else {
        "- NON iniziare la risposta con \"Ciao\" o con il nome."
    };

    format!(
        "Tu sei \"Robot\", un assistente robotico che parla in italiano, con tono caldo e naturale.\n\
         Parli con {name}, che conosci.\n\
         \n\
         STATO ATTUALE: {state}\n\
         {stage}\n\
         \n\
         REGOLE\n\
         {first_turn_rule}\n\
         - Se lo stato è FREE_TALK, considera i \"ciao\" come parte della conversazione, non come inizio.\n\
         - Se lo stato è FAREWELL, fai solo un saluto e NON fare domande.\n\
         - Risposte brevi: 2-3 frasi.\n\
         \n\
         MEMORIA A LUNGO TERMINE:\n\
         {profile}\n\
         \n\
         MEMORIA EPISODICA (riassunti precedenti):\n\
         {episodes}\n\
         \n\
         MEMORIA A BREVE TERMINE (ultimi turni):\n\
         {history}\n\
         \n\
         INPUT UTENTE:\n\
         {utterance}\n\
         \n\
         Rispondi come \"Robot\":\n\
         Robot:",
        name = request.name,
        state = request.state.as_str(),
        stage = stage_instruction(request.state),
        profile = format_profile(profile),
        history = format_history(&request.context.history),
        utterance = request.utterance.trim(),
    )
}

pub fn build_summary_prompt(profile: &Profile, session: &[ConversationTurn]) -> String {
    let dialogue = session
        .iter()
        .map(|t| format!("Utente: {}\nAssistente: {}", t.user, t.bot))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Tu sei un sistema di memoria conversazionale. Riceverai:\n\
         1. Il profilo attuale dell'utente (potenzialmente incompleto)\n\
         2. La trascrizione dell'ultima conversazione\n\
         \n\
         Aggiorna il profilo in modo coerente e verosimile, deducendo solo ciò che emerge chiaramente.\n\
         \n\
         === PROFILO ATTUALE ===\n\
         {profile}\n\
         \n\
         === CONVERSAZIONE ===\n\
         {dialogue}\n\
         \n\
         Restituisci SOLO un oggetto JSON con i campi:\n\
         - summary: breve riassunto dell'interazione (3-4 frasi)\n\
         - gender: \"maschio\", \"femmina\" o null se non deducibile\n\
         - age: fascia d'età stimata (es. \"20-30\") o null\n\
         - occupation: professione o ambito lavorativo, se emerge\n\
         - interests: elenco di temi o hobby citati\n\
         - personality: tratti comportamentali\n\
         - goals: obiettivi personali o professionali, se emergono",
        profile = format_profile(profile),
    )
}
