use serde::{Deserialize, Serialize};

/// How the player steers horizontally. Fixed for a session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMethod {
    #[default]
    Mouse,
    Keyboard,
    Gyroscope,
}

impl ControlMethod {
    /// Whether the host must obtain an explicit grant before a session may use it.
    pub fn requires_permission(&self) -> bool {
        matches!(self, Self::Gyroscope)
    }
}

impl std::str::FromStr for ControlMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mouse" => Ok(Self::Mouse),
            "keyboard" => Ok(Self::Keyboard),
            "gyroscope" | "gyro" => Ok(Self::Gyroscope),
            other => Err(format!("unknown control method '{other}'")),
        }
    }
}

/// Collision strictness. Easy makes every platform one-way (top side only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Easy,
    #[default]
    Hard,
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown game mode '{other}'")),
        }
    }
}

/// Parameter bag handed across scene transitions (menu, control selection, play).
///
/// Progression arrays are owned copies: the receiving scene reads them, it never
/// writes back through them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneParams {
    pub level: u32,
    pub semester: u8,
    pub control_method: ControlMethod,
    pub game_mode: GameMode,
    pub levels: Vec<u32>,
    pub played_levels: Vec<u32>,
}
