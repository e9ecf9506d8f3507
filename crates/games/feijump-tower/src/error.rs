/// Problems with level tuning data. Fatal to session start.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnknownLevel(u32),
    SemesterOutOfRange(u8),
    Invalid { level: u32, reason: String },
    /// Tower geometry shared by every level is unusable.
    Geometry(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(id) => write!(f, "no level config for level {id}"),
            Self::SemesterOutOfRange(s) => write!(f, "semester {s} is outside 1..=5"),
            Self::Invalid { level, reason } => write!(f, "level {level} config invalid: {reason}"),
            Self::Geometry(m) => write!(f, "tower geometry invalid: {m}"),
            Self::Parse(m) => write!(f, "level table parse error: {m}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    Config(ConfigError),
    /// Storage read/write failure. Recovered locally, never shown to the player.
    Persistence(String),
    /// Orientation access refused by the host platform.
    PermissionDenied,
    /// Stored state contradicts its own invariants.
    InvariantViolation(String),
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Persistence(m) => write!(f, "persistence error: {m}"),
            Self::PermissionDenied => write!(f, "orientation permission denied"),
            Self::InvariantViolation(m) => write!(f, "invariant violation: {m}"),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for GameError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<feijump_core::storage::StorageError> for GameError {
    fn from(e: feijump_core::storage::StorageError) -> Self {
        Self::Persistence(e.to_string())
    }
}
