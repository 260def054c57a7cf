//! Jersey number to player lookups.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub position: String,
    pub number: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
}

pub trait RosterLookup: Send {
    fn lookup(&mut self, team: &str, number: u8) -> Option<PlayerInfo>;
}

/// In-memory roster keyed by team code, then jersey number.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    teams: HashMap<String, HashMap<u8, PlayerInfo>>,
}

type RawRoster = HashMap<String, HashMap<String, PlayerInfo>>;

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, team: &str, player: PlayerInfo) {
        self.teams
            .entry(team.to_string())
            .or_default()
            .insert(player.number, player);
    }

    /// Parses `{ "PHI": { "1": {...}, ... } }`. Keys must be jersey numbers.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        Self::from_raw(serde_json::from_str(raw)?)
    }

    /// Same shape as JSON, e.g. `[PHI.1]` tables.
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        Self::from_raw(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&raw),
            _ => Self::from_toml(&raw),
        }
    }

    fn from_raw(raw: RawRoster) -> Result<Self, Error> {
        let mut roster = Self::new();

        for (team, players) in raw {
            for (key, mut player) in players {
                let number: u8 = key.trim().parse().map_err(|_| {
                    Error::Parse(format!("{}: `{}` is not a jersey number", team, key))
                })?;

                if player.number != number {
                    log::warn!(
                        "{} #{}: entry says number {}, using the key",
                        team,
                        number,
                        player.number
                    );
                    player.number = number;
                }

                roster.insert(&team, player);
            }
        }

        Ok(roster)
    }

    pub fn len(&self) -> usize {
        self.teams.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RosterLookup for StaticRoster {
    fn lookup(&mut self, team: &str, number: u8) -> Option<PlayerInfo> {
        self.teams.get(team)?.get(&number).cloned()
    }
}

/// Memoizes another lookup, hits and misses alike, for `ttl`.
pub struct CachedRoster<L> {
    inner: L,
    ttl: Duration,
    entries: HashMap<(String, u8), (Instant, Option<PlayerInfo>)>,
}

impl<L: RosterLookup> CachedRoster<L> {
    pub fn new(inner: L, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<L: RosterLookup> RosterLookup for CachedRoster<L> {
    fn lookup(&mut self, team: &str, number: u8) -> Option<PlayerInfo> {
        let key = (team.to_string(), number);
        let now = Instant::now();

        if let Some((at, cached)) = self.entries.get(&key) {
            if now.duration_since(*at) < self.ttl {
                return cached.clone();
            }
        }

        let found = self.inner.lookup(team, number);
        self.entries.insert(key, (now, found.clone()));
        found
    }
}
