/// Stage of a conversation. `Farewell` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConversationState {
    Greeting,
    FreeTalk,
    Farewell,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Greeting => "GREETING",
            ConversationState::FreeTalk => "FREE_TALK",
            ConversationState::Farewell => "FAREWELL",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConversationState::Farewell
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
