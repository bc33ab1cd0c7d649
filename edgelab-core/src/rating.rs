//! Elo-style skill ratings with margin-of-victory scaling.
//!
//! Ratings move on already-decided match scores (games won by each side):
//! - Expected score is the logistic Elo curve on a 400-point scale.
//! - K-factor steps down with experience: 1.5x below 10 matches, 1x below 30,
//!   0.75x from 30 on.
//! - Decisive results are scaled by `1 + mov_factor * ln(1 + 2 * margin)`,
//!   where margin is the winner's lead as a fraction of games played.
//!
//! Each side is updated with its own K-factor, so a single update is not
//! guaranteed to be zero-sum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default starting rating for new players.
pub const DEFAULT_RATING: f64 = 1500.0;

/// Base K-factor before experience scaling.
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Default margin-of-victory sensitivity.
pub const DEFAULT_MOV_FACTOR: f64 = 0.5;

/// Players with fewer matches than this get the provisional K multiplier.
pub const PROVISIONAL_MATCHES: u32 = 10;

/// Players with at least this many matches get the established K multiplier.
pub const ESTABLISHED_MATCHES: u32 = 30;

const PROVISIONAL_K_SCALE: f64 = 1.5;
const ESTABLISHED_K_SCALE: f64 = 0.75;

/// Tuning for a rating population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub initial_rating: f64,
    pub k_factor: f64,
    /// 0 ignores margin of victory entirely.
    pub mov_factor: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: DEFAULT_RATING,
            k_factor: DEFAULT_K_FACTOR,
            mov_factor: DEFAULT_MOV_FACTOR,
        }
    }
}

/// Result of a match from one player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    /// Actual score used by the Elo update.
    pub fn actual_score(self) -> f64 {
        match self {
            GameResult::Win => 1.0,
            GameResult::Loss => 0.0,
            GameResult::Draw => 0.5,
        }
    }

    fn opposite(self) -> Self {
        match self {
            GameResult::Win => GameResult::Loss,
            GameResult::Loss => GameResult::Win,
            GameResult::Draw => GameResult::Draw,
        }
    }
}

/// Rating and record of a single named player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub name: String,
    pub rating: f64,
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl PlayerRating {
    pub fn new(name: impl Into<String>, rating: f64) -> Self {
        Self {
            name: name.into(),
            rating,
            matches_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
        }
    }

    /// Fraction of matches won; 0.0 before the first match.
    pub fn win_rate(&self) -> f64 {
        if self.matches_played == 0 {
            return 0.0;
        }
        self.wins as f64 / self.matches_played as f64
    }

    fn record(&mut self, change: f64, result: GameResult) {
        self.rating += change;
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Loss => self.losses += 1,
            GameResult::Draw => self.draws += 1,
        }
        self.matches_played += 1;
    }
}

/// Owned rating population.
///
/// Players are created lazily on first reference and never removed. Storage
/// keeps insertion order, which is also the tie-break order of the
/// leaderboard. Not designed for concurrent mutation: callers sharing one
/// system across threads must serialize writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RatingSnapshot", into = "RatingSnapshot")]
pub struct RatingSystem {
    config: RatingConfig,
    players: Vec<PlayerRating>,
    index: HashMap<String, usize>,
}

/// Serialized form of a [`RatingSystem`]; the name index is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RatingSnapshot {
    config: RatingConfig,
    players: Vec<PlayerRating>,
}

impl From<RatingSnapshot> for RatingSystem {
    fn from(snapshot: RatingSnapshot) -> Self {
        RatingSystem::from_players(snapshot.config, snapshot.players)
    }
}

impl From<RatingSystem> for RatingSnapshot {
    fn from(system: RatingSystem) -> Self {
        RatingSnapshot {
            config: system.config,
            players: system.players,
        }
    }
}

impl Default for RatingSystem {
    fn default() -> Self {
        Self::new(RatingConfig::default())
    }
}

impl RatingSystem {
    pub fn new(config: RatingConfig) -> Self {
        Self {
            config,
            players: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a population from previously exported players.
    ///
    /// If a name appears more than once, the first record wins.
    pub fn from_players(config: RatingConfig, players: Vec<PlayerRating>) -> Self {
        let mut system = Self::new(config);
        for player in players {
            if system.index.contains_key(&player.name) {
                debug!(player = %player.name, "duplicate player record ignored");
                continue;
            }
            system.index.insert(player.name.clone(), system.players.len());
            system.players.push(player);
        }
        system
    }

    /// Hand the population back to the caller, in insertion order.
    pub fn into_players(self) -> Vec<PlayerRating> {
        self.players
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn players(&self) -> &[PlayerRating] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Look up a player without creating one.
    pub fn rating(&self, name: &str) -> Option<&PlayerRating> {
        self.index.get(name).map(|&idx| &self.players[idx])
    }

    /// Existing rating for `name`, or a fresh default one.
    pub fn get_rating(&mut self, name: &str) -> &PlayerRating {
        let idx = self.slot(name);
        &self.players[idx]
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.players.len();
        self.players
            .push(PlayerRating::new(name, self.config.initial_rating));
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Expected score of a player rated `rating_a` against one rated `rating_b`.
    ///
    /// Always in (0, 1) for finite ratings, and
    /// `expected_score(a, b) + expected_score(b, a) == 1`.
    pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
    }

    /// Experience-adjusted K-factor.
    ///
    /// Step function on `matches_played`: `< 10` gives 1.5x, `10..30` gives
    /// the base K, `>= 30` gives 0.75x.
    pub fn k_factor(&self, player: &PlayerRating) -> f64 {
        if player.matches_played < PROVISIONAL_MATCHES {
            self.config.k_factor * PROVISIONAL_K_SCALE
        } else if player.matches_played < ESTABLISHED_MATCHES {
            self.config.k_factor
        } else {
            self.config.k_factor * ESTABLISHED_K_SCALE
        }
    }

    /// Margin-of-victory multiplier, always `>= 1.0`.
    ///
    /// Returns 1.0 when no games were played. The margin is clamped to
    /// [0, 1], so a reversed winner/loser pair cannot shrink the update.
    pub fn margin_multiplier(&self, winner_score: u32, loser_score: u32, total_games: u32) -> f64 {
        if total_games == 0 {
            return 1.0;
        }
        let margin = (winner_score as f64 - loser_score as f64) / total_games as f64;
        let margin = margin.clamp(0.0, 1.0);
        1.0 + self.config.mov_factor * (1.0 + 2.0 * margin).ln()
    }

    /// Apply one match and return the new `(rating_a, rating_b)`.
    ///
    /// A match with no games (or a player against themselves) changes nothing.
    /// Expected scores and K-factors are taken from the pre-update state.
    pub fn update_ratings(
        &mut self,
        player_a: &str,
        player_b: &str,
        score_a: u32,
        score_b: u32,
    ) -> (f64, f64) {
        let ia = self.slot(player_a);
        let ib = self.slot(player_b);
        let total_games = score_a.saturating_add(score_b);

        if total_games == 0 || ia == ib {
            debug!(player_a, player_b, score_a, score_b, "match ignored");
            return (self.players[ia].rating, self.players[ib].rating);
        }

        let (result_a, multiplier) = if score_a > score_b {
            (
                GameResult::Win,
                self.margin_multiplier(score_a, score_b, total_games),
            )
        } else if score_b > score_a {
            (
                GameResult::Loss,
                self.margin_multiplier(score_b, score_a, total_games),
            )
        } else {
            (GameResult::Draw, 1.0)
        };
        let result_b = result_a.opposite();

        let expected_a =
            Self::expected_score(self.players[ia].rating, self.players[ib].rating);
        let expected_b = 1.0 - expected_a;

        let k_a = self.k_factor(&self.players[ia]);
        let k_b = self.k_factor(&self.players[ib]);

        let change_a = k_a * multiplier * (result_a.actual_score() - expected_a);
        let change_b = k_b * multiplier * (result_b.actual_score() - expected_b);

        self.players[ia].record(change_a, result_a);
        self.players[ib].record(change_b, result_b);

        debug!(
            player_a,
            player_b,
            score_a,
            score_b,
            change_a,
            change_b,
            multiplier,
            "ratings updated"
        );

        (self.players[ia].rating, self.players[ib].rating)
    }

    /// All players, highest rating first; equal ratings keep insertion order.
    pub fn leaderboard(&self) -> Vec<&PlayerRating> {
        let mut entries: Vec<&PlayerRating> = self.players.iter().collect();
        entries.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        entries
    }
}
