//! Lifetime win/loss/tie counters per display name.

use std::collections::HashMap;

use noughts_protocol::PlayerRecord;
use noughts_room::GameResult;

/// In-memory player statistics. Only ever incremented.
#[derive(Debug, Default)]
pub struct PlayerStats {
    records: HashMap<String, PlayerRecord>,
}

impl PlayerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one finished game.
    pub fn record(&mut self, result: &GameResult) {
        match result {
            GameResult::Decisive { winner, loser } => {
                let w = self.entry(winner);
                w.wins += 1;
                w.games_played += 1;
                let l = self.entry(loser);
                l.losses += 1;
                l.games_played += 1;
            }
            GameResult::Tie { x, o } => {
                for name in [x, o] {
                    let r = self.entry(name);
                    r.ties += 1;
                    r.games_played += 1;
                }
            }
        }
    }

    /// The record for `name`; all zeros if they never finished a game.
    pub fn get(&self, name: &str) -> PlayerRecord {
        self.records.get(name).copied().unwrap_or_default()
    }

    fn entry(&mut self, name: &str) -> &mut PlayerRecord {
        self.records.entry(name.to_string()).or_default()
    }
}
