use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport mode assigned to a trip
///
/// `Unknown` is a valid classification, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Walk,
    Bicycle,
    #[serde(alias = "autoRickshaw")]
    AutoRickshaw,
    Car,
    Bus,
    Ferry,
    Train,
    Unknown,
}

impl TransportMode {
    pub const ALL: [TransportMode; 8] = [
        TransportMode::Walk,
        TransportMode::Bicycle,
        TransportMode::AutoRickshaw,
        TransportMode::Car,
        TransportMode::Bus,
        TransportMode::Ferry,
        TransportMode::Train,
        TransportMode::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Walk => "walk",
            TransportMode::Bicycle => "bicycle",
            TransportMode::AutoRickshaw => "auto_rickshaw",
            TransportMode::Car => "car",
            TransportMode::Bus => "bus",
            TransportMode::Ferry => "ferry",
            TransportMode::Train => "train",
            TransportMode::Unknown => "unknown",
        }
    }

    pub fn is_motorized(&self) -> bool {
        !matches!(
            self,
            TransportMode::Walk | TransportMode::Bicycle | TransportMode::Unknown
        )
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = String;

    /// Accepts snake_case, camelCase and the lowercased keys produced by config files
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "walk" => Ok(TransportMode::Walk),
            "bicycle" => Ok(TransportMode::Bicycle),
            "autorickshaw" => Ok(TransportMode::AutoRickshaw),
            "car" => Ok(TransportMode::Car),
            "bus" => Ok(TransportMode::Bus),
            "ferry" => Ok(TransportMode::Ferry),
            "train" => Ok(TransportMode::Train),
            "unknown" => Ok(TransportMode::Unknown),
            _ => Err(format!("unknown transport mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_config_key_spellings() {
        assert_eq!("auto_rickshaw".parse::<TransportMode>(), Ok(TransportMode::AutoRickshaw));
        assert_eq!("autoRickshaw".parse::<TransportMode>(), Ok(TransportMode::AutoRickshaw));
        assert_eq!("autorickshaw".parse::<TransportMode>(), Ok(TransportMode::AutoRickshaw));
        assert!("hovercraft".parse::<TransportMode>().is_err());
    }

    #[test]
    fn test_display_matches_serde_name() {
        for mode in TransportMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }
}
