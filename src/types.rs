//! # Position and Candidate Types
//!
//! Plain data shared by the pool, its workers and the engines. A [`Position`]
//! is a complete snapshot of a tile game in progress: the board, one rack and
//! score per player, the bag and the moves generated for the player on turn.
//! Workers receive their own deep copy at configuration time, so nothing here
//! needs interior mutability.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A letter tile. Upper-case `A`-`Z`, or `?` for a blank.
pub type Tile = char;

/// Marker used for blank tiles.
pub const BLANK: Tile = '?';

/// Number of tiles a full rack holds.
pub const RACK_SIZE: usize = 7;

/// Face value of a tile using the standard English distribution.
pub fn tile_value(tile: Tile) -> i32 {
    match tile.to_ascii_uppercase() {
        'A' | 'E' | 'I' | 'L' | 'N' | 'O' | 'R' | 'S' | 'T' | 'U' => 1,
        'D' | 'G' => 2,
        'B' | 'C' | 'M' | 'P' => 3,
        'F' | 'H' | 'V' | 'W' | 'Y' => 4,
        'K' => 5,
        'J' | 'X' => 8,
        'Q' | 'Z' => 10,
        _ => 0,
    }
}

fn is_tile(c: char) -> bool {
    c == BLANK || c.is_ascii_alphabetic()
}

/// Error produced when parsing racks or candidate moves from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(pub String);

/// The tiles a player holds, in the order they were drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Rack {
    tiles: Vec<Tile>,
}

impl Rack {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn push(&mut self, tile: Tile) {
        self.tiles.push(tile);
    }

    /// Sum of the face values of every tile on the rack.
    pub fn value(&self) -> i32 {
        self.tiles.iter().map(|t| tile_value(*t)).sum()
    }

    /// The rack left after playing `played`. Tiles not on the rack are ignored.
    pub fn without(&self, played: &[Tile]) -> Rack {
        let mut remaining = self.tiles.clone();
        for tile in played {
            let wanted = if tile.is_ascii_lowercase() { BLANK } else { *tile };
            if let Some(pos) = remaining.iter().position(|t| *t == wanted) {
                remaining.remove(pos);
            }
        }
        Rack::new(remaining)
    }
}

impl fmt::Display for Rack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tile in &self.tiles {
            write!(f, "{}", tile)?;
        }
        Ok(())
    }
}

impl FromStr for Rack {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(bad) = s.chars().find(|c| !is_tile(*c)) {
            return Err(ParseError(format!("'{}' is not a tile in rack \"{}\"", bad, s)));
        }
        Ok(Rack::new(s.chars().map(|c| c.to_ascii_uppercase()).collect()))
    }
}

/// Tiles not yet drawn by anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bag {
    tiles: Vec<Tile>,
}

/// (tile, count) pairs of the 100-tile English set.
const ENGLISH_DISTRIBUTION: [(Tile, usize); 27] = [
    ('A', 9), ('B', 2), ('C', 2), ('D', 4), ('E', 12), ('F', 2), ('G', 3),
    ('H', 2), ('I', 9), ('J', 1), ('K', 1), ('L', 4), ('M', 2), ('N', 6),
    ('O', 8), ('P', 2), ('Q', 1), ('R', 6), ('S', 4), ('T', 6), ('U', 4),
    ('V', 2), ('W', 2), ('X', 1), ('Y', 2), ('Z', 1), (BLANK, 2),
];

impl Bag {
    pub fn new(tiles: Vec<Tile>) -> Self {
        Self { tiles }
    }

    /// A full bag with the standard English distribution.
    pub fn standard() -> Self {
        Self::new(
            ENGLISH_DISTRIBUTION
                .iter()
                .flat_map(|(tile, count)| std::iter::repeat(*tile).take(*count))
                .collect(),
        )
    }

    /// This bag with every tile on the given racks taken out.
    pub fn without<'a>(&self, racks: impl IntoIterator<Item = &'a Rack>) -> Bag {
        let mut tiles = self.tiles.clone();
        for rack in racks {
            for tile in rack.tiles() {
                if let Some(pos) = tiles.iter().position(|t| t == tile) {
                    tiles.remove(pos);
                }
            }
        }
        Bag::new(tiles)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Square grid of placed tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    squares: Vec<Option<Tile>>,
}

impl Board {
    pub const STANDARD_SIZE: usize = 15;

    pub fn new(size: usize) -> Self {
        Self {
            size,
            squares: vec![None; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Tile> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.squares[row * self.size + col]
    }

    /// Places a tile; returns false if the square is off the board or taken.
    pub fn place(&mut self, row: usize, col: usize, tile: Tile) -> bool {
        if row >= self.size || col >= self.size {
            return false;
        }
        let square = &mut self.squares[row * self.size + col];
        if square.is_some() {
            return false;
        }
        *square = Some(tile);
        true
    }

    pub fn tile_count(&self) -> usize {
        self.squares.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(Self::STANDARD_SIZE)
    }
}

/// A move under evaluation.
///
/// `equity` is the engine's static (un-simulated) value of the move.
/// `excluded` marks moves the engine will not simulate because of a
/// candidate restriction; the flag is identical on every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMove {
    pub description: String,
    pub tiles: Vec<Tile>,
    pub score: i32,
    pub equity: f64,
    pub excluded: bool,
}

impl CandidateMove {
    pub fn new(description: impl Into<String>, tiles: &str, score: i32) -> Self {
        Self {
            description: description.into(),
            tiles: tiles.chars().collect(),
            score,
            equity: score as f64,
            excluded: false,
        }
    }

    pub fn with_equity(mut self, equity: f64) -> Self {
        self.equity = equity;
        self
    }

    /// Two entries describe the same move regardless of their flags or values.
    pub fn same_play(&self, other: &CandidateMove) -> bool {
        self.description == other.description && self.tiles == other.tiles
    }
}

impl fmt::Display for CandidateMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.score)
    }
}

/// Parses `DESCRIPTION/TILES/SCORE[/EQUITY]`, e.g. `8H QUACK/QUACK/42`.
/// An exchange or pass uses an empty tile field.
impl FromStr for CandidateMove {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(ParseError(format!(
                "expected DESCRIPTION/TILES/SCORE[/EQUITY], got \"{}\"",
                s
            )));
        }
        if parts[0].is_empty() {
            return Err(ParseError(format!("missing move description in \"{}\"", s)));
        }
        if let Some(bad) = parts[1].chars().find(|c| !is_tile(*c)) {
            return Err(ParseError(format!("'{}' is not a tile in \"{}\"", bad, s)));
        }
        let score: i32 = parts[2]
            .parse()
            .map_err(|_| ParseError(format!("bad score \"{}\"", parts[2])))?;
        let mut candidate = CandidateMove::new(parts[0], parts[1], score);
        if let Some(equity) = parts.get(3) {
            candidate.equity = equity
                .parse()
                .map_err(|_| ParseError(format!("bad equity \"{}\"", equity)))?;
        }
        Ok(candidate)
    }
}

/// Complete game snapshot handed to every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub board: Board,
    pub racks: Vec<Rack>,
    pub scores: Vec<i32>,
    pub bag: Bag,
    pub current_player: usize,
    pub moves: Vec<CandidateMove>,
}

impl Position {
    /// Two-player position with an empty board. The bag holds every standard
    /// tile not on either rack.
    pub fn two_player(rack: Rack, opponent: Rack, moves: Vec<CandidateMove>) -> Self {
        let bag = Bag::standard().without([&rack, &opponent]);
        Self {
            board: Board::default(),
            racks: vec![rack, opponent],
            scores: vec![0, 0],
            bag,
            current_player: 0,
            moves,
        }
    }

    pub fn num_players(&self) -> usize {
        self.racks.len()
    }

    pub fn current_rack(&self) -> &Rack {
        &self.racks[self.current_player]
    }

    pub fn set_current_rack(&mut self, rack: Rack) {
        let current = self.current_player;
        self.racks[current] = rack;
    }

    pub fn opponent(&self) -> usize {
        (self.current_player + 1) % self.num_players().max(1)
    }

    /// Score difference from the point of view of the player on turn.
    pub fn spread(&self) -> i32 {
        let me = self.scores.get(self.current_player).copied().unwrap_or(0);
        let best_other = self
            .scores
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.current_player)
            .map(|(_, s)| *s)
            .max()
            .unwrap_or(0);
        me - best_other
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::two_player(Rack::default(), Rack::default(), Vec::new())
    }
}

/// What is known about the opponents during rollouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpponentConstraints {
    /// Opponents pass every turn.
    pub ignore_opponents: bool,
    /// Tiles known to be on the opponent's rack.
    pub partial_rack: Option<Rack>,
}

/// Everything a worker needs to start simulating: the position plus the
/// restrictions applied on top of it. Broadcast identically to every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSetup {
    pub position: Position,
    /// Overrides the rack of the player on turn.
    pub rack: Option<Rack>,
    /// Only these moves are simulated; empty means all of them.
    pub included_moves: Vec<CandidateMove>,
    pub opponents: OpponentConstraints,
}

impl SimSetup {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            rack: None,
            included_moves: Vec::new(),
            opponents: OpponentConstraints::default(),
        }
    }

    pub fn with_rack(mut self, rack: Rack) -> Self {
        self.rack = Some(rack);
        self
    }

    pub fn with_included_moves(mut self, moves: Vec<CandidateMove>) -> Self {
        self.included_moves = moves;
        self
    }

    pub fn ignoring_opponents(mut self, ignore: bool) -> Self {
        self.opponents.ignore_opponents = ignore;
        self
    }

    pub fn with_partial_opponent_rack(mut self, rack: Rack) -> Self {
        self.opponents.partial_rack = Some(rack);
        self
    }
}

/// Metric used to order the combined move list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankBy {
    #[default]
    Equity,
    Win,
}

impl FromStr for RankBy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equity" => Ok(RankBy::Equity),
            "win" | "wins" => Ok(RankBy::Win),
            other => Err(ParseError(format!("unknown ranking \"{}\"", other))),
        }
    }
}

/// One entry of the pool's combined, ranked result.
///
/// The statistic fields are `None` until at least one rollout has been
/// recorded for the candidate on some worker.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedMove {
    /// Position of the candidate in the shared candidate list.
    pub index: usize,
    pub candidate: CandidateMove,
    pub iterations: u64,
    pub equity: Option<f64>,
    pub win_rate: Option<f64>,
    pub equity_std_dev: Option<f64>,
}

impl CombinedMove {
    pub fn unsimulated(index: usize, candidate: CandidateMove) -> Self {
        Self {
            index,
            candidate,
            iterations: 0,
            equity: None,
            win_rate: None,
            equity_std_dev: None,
        }
    }

    /// Simulated equity when available, otherwise the engine's static value.
    pub fn value(&self) -> f64 {
        self.equity.unwrap_or(self.candidate.equity)
    }

    pub fn has_statistics(&self) -> bool {
        self.iterations > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_bag_has_100_tiles() {
        assert_eq!(Bag::standard().len(), 100);
    }

    #[test]
    fn test_bag_without_racks() {
        let rack: Rack = "QUACKLE".parse().unwrap();
        let bag = Bag::standard().without([&rack]);
        assert_eq!(bag.len(), 93);
        assert!(!bag.tiles().contains(&'Q'));
    }

    #[test]
    fn test_rack_parse_and_display() {
        let rack: Rack = "aeiRst?".parse().unwrap();
        assert_eq!(rack.to_string(), "AEIRST?");
        assert_eq!(rack.value(), 6);
        assert!("AB1".parse::<Rack>().is_err());
    }

    #[test]
    fn test_parse_error_is_a_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new("AB1".parse::<Rack>().unwrap_err());
        assert_eq!(err.to_string(), "'1' is not a tile in rack \"AB1\"");
    }

    #[test]
    fn test_rack_leave() {
        let rack: Rack = "QUACKL?".parse().unwrap();
        let leave = rack.without(&['Q', 'U', 'A', 'C', 'K', 'e']);
        assert_eq!(leave.to_string(), "L");
    }

    #[test]
    fn test_candidate_parse() {
        let mv: CandidateMove = "8H QUACK/QUACK/42".parse().unwrap();
        assert_eq!(mv.description, "8H QUACK");
        assert_eq!(mv.tiles, vec!['Q', 'U', 'A', 'C', 'K']);
        assert_eq!(mv.score, 42);
        assert_eq!(mv.equity, 42.0);
        assert!(!mv.excluded);

        let exch: CandidateMove = "-QU//0/3.5".parse().unwrap();
        assert!(exch.tiles.is_empty());
        assert_eq!(exch.equity, 3.5);

        assert!("8H QUACK/QUACK".parse::<CandidateMove>().is_err());
        assert!("8H QUACK/QUACK/x".parse::<CandidateMove>().is_err());
    }

    #[test]
    fn test_board_place() {
        let mut board = Board::default();
        assert!(board.place(7, 7, 'Q'));
        assert!(!board.place(7, 7, 'U'));
        assert!(!board.place(15, 0, 'U'));
        assert_eq!(board.get(7, 7), Some('Q'));
        assert_eq!(board.tile_count(), 1);
    }

    #[test]
    fn test_position_spread() {
        let mut position = Position::default();
        position.scores = vec![120, 95];
        assert_eq!(position.spread(), 25);
        position.current_player = 1;
        assert_eq!(position.spread(), -25);
        assert_eq!(position.opponent(), 0);
    }

    #[test]
    fn test_combined_move_value_falls_back() {
        let mv = CombinedMove::unsimulated(0, CandidateMove::new("8D ZA", "ZA", 22).with_equity(24.5));
        assert_eq!(mv.value(), 24.5);
        assert!(!mv.has_statistics());
    }
}
