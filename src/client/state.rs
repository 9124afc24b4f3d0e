use std::fmt;

/// Connection state of a [`Client`](super::Client).
///
/// `Disconnected -> Connecting -> Connected | Disconnected`, and
/// `Connected -> Disconnected`. `Connecting` is never skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClientState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Disconnected => "disconnected",
            ClientState::Connecting => "connecting",
            ClientState::Connected => "connected",
        };
        f.write_str(name)
    }
}
