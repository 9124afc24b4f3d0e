use std::fmt;

use serde::{Deserialize, Serialize};

/// MQTT delivery guarantee.
///
/// Levels are ordered so that a broker grant can be compared with the
/// requested level (`granted <= requested`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// At most once.
    #[default]
    Zero,
    /// At least once.
    One,
    /// Exactly once.
    Two,
}

impl QosLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            QosLevel::Zero => 0,
            QosLevel::One => 1,
            QosLevel::Two => 2,
        }
    }

    /// Whether a publish at this level waits for a broker acknowledgement.
    pub fn is_acknowledged(self) -> bool {
        self != QosLevel::Zero
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QosLevel::Zero),
            1 => Ok(QosLevel::One),
            2 => Ok(QosLevel::Two),
            other => Err(format!("invalid QoS level {other}")),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        qos.as_u8()
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS{}", self.as_u8())
    }
}
