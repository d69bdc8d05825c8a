use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Leagues the service knows how to model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum League {
    Nba,
    Wnba,
    Nfl,
    Mlb,
    Nhl,
    Mls,
    Epl,
}

impl League {
    pub const ALL: [League; 7] = [
        League::Nba,
        League::Wnba,
        League::Nfl,
        League::Mlb,
        League::Nhl,
        League::Mls,
        League::Epl,
    ];

    /// Canonical upper-case code used on the wire and in config files
    pub fn code(&self) -> &'static str {
        match self {
            League::Nba => "NBA",
            League::Wnba => "WNBA",
            League::Nfl => "NFL",
            League::Mlb => "MLB",
            League::Nhl => "NHL",
            League::Mls => "MLS",
            League::Epl => "EPL",
        }
    }

    /// Lower-case slug for metric labels, cache keys and breaker names
    pub fn slug(&self) -> &'static str {
        match self {
            League::Nba => "nba",
            League::Wnba => "wnba",
            League::Nfl => "nfl",
            League::Mlb => "mlb",
            League::Nhl => "nhl",
            League::Mls => "mls",
            League::Epl => "epl",
        }
    }

    /// Typical points/goals/runs scored by one side in a game.
    /// Used to normalize raw scoring inputs.
    pub fn typical_score(&self) -> f64 {
        match self {
            League::Nba => 112.0,
            League::Wnba => 82.0,
            League::Nfl => 22.0,
            League::Mlb => 4.5,
            League::Nhl => 3.0,
            League::Mls => 1.5,
            League::Epl => 1.4,
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for League {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NBA" => Ok(League::Nba),
            "WNBA" => Ok(League::Wnba),
            "NFL" => Ok(League::Nfl),
            "MLB" => Ok(League::Mlb),
            "NHL" => Ok(League::Nhl),
            "MLS" => Ok(League::Mls),
            "EPL" | "PREMIER_LEAGUE" => Ok(League::Epl),
            _ => Err(format!(
                "Unsupported league: {}. Must be one of {}",
                s,
                League::ALL
                    .iter()
                    .map(|l| l.code())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

impl Serialize for League {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for League {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        League::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
