//! Randomised tile playouts.
//!
//! After the candidate is played, both sides alternate turns in which the
//! mover scores a random non-empty subset of its rack at double face value and
//! draws replacements from the bag. No lexicon or move generator is involved.

use crate::engine::{RolloutError, RolloutSample, SimulationEngine};
use crate::types::{tile_value, CandidateMove, Position, Rack, Tile, RACK_SIZE};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

pub struct TilePlayoutEngine {
    position: Position,
    candidates: Vec<CandidateMove>,
    ignore_opponents: bool,
    partial_opponent_rack: Rack,
    rng: Xoshiro256PlusPlus,
}

impl TilePlayoutEngine {
    pub fn seeded(seed: u64) -> Self {
        Self {
            position: Position::default(),
            candidates: Vec::new(),
            ignore_opponents: false,
            partial_opponent_rack: Rack::default(),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn with_position(seed: u64, position: &Position) -> Self {
        let mut engine = Self::seeded(seed);
        engine.set_position(position);
        engine
    }

    /// One rollout of `candidate`; returns the equity estimate.
    fn rollout(&mut self, candidate: &CandidateMove, plies: u32) -> Result<f64, RolloutError> {
        let mut bag: Vec<Tile> = self.position.bag.tiles().to_vec();
        bag.shuffle(&mut self.rng);

        // The opponent's rack is drawn first: known tiles, then unknown ones.
        let known = self.partial_opponent_rack.tiles().to_vec();
        let mut theirs = Vec::with_capacity(RACK_SIZE);
        for tile in &known {
            match bag.iter().position(|t| t == tile) {
                Some(pos) => theirs.push(bag.swap_remove(pos)),
                None => {
                    return Err(RolloutError::BagExhausted {
                        needed: known.len(),
                        available: self.position.bag.len(),
                    })
                }
            }
        }
        draw(&mut theirs, &mut bag);

        let mut ours = self.position.current_rack().without(&candidate.tiles).tiles().to_vec();
        draw(&mut ours, &mut bag);

        let (mut our_points, mut their_points) = (0i32, 0i32);
        let mut moved = false;
        for ply in 0..plies {
            let our_turn = ply % 2 == 1;
            if !our_turn && self.ignore_opponents {
                continue;
            }
            let rack = if our_turn { &mut ours } else { &mut theirs };
            if rack.is_empty() {
                continue;
            }
            let points = self.play_turn(rack, &mut bag);
            moved = true;
            if our_turn {
                our_points += points;
            } else {
                their_points += points;
            }
        }
        if plies > 0 && !moved && !(self.ignore_opponents && plies == 1) {
            return Err(RolloutError::NoContinuation);
        }
        Ok(candidate.score as f64 + (our_points - their_points) as f64)
    }

    fn play_turn(&mut self, rack: &mut Vec<Tile>, bag: &mut Vec<Tile>) -> i32 {
        rack.shuffle(&mut self.rng);
        let count = self.rng.random_range(1..=rack.len());
        let points = rack.drain(..count).map(tile_value).sum::<i32>() * 2;
        draw(rack, bag);
        points
    }
}

fn draw(rack: &mut Vec<Tile>, bag: &mut Vec<Tile>) {
    while rack.len() < RACK_SIZE {
        match bag.pop() {
            Some(tile) => rack.push(tile),
            None => break,
        }
    }
}

fn outcome(spread: f64) -> f64 {
    if spread > 0.0 {
        1.0
    } else if spread == 0.0 {
        0.5
    } else {
        0.0
    }
}

impl SimulationEngine for TilePlayoutEngine {
    fn set_position(&mut self, position: &Position) {
        self.position = position.clone();
        self.candidates = position.moves.clone();
    }

    fn position(&self) -> &Position {
        &self.position
    }

    fn set_current_player_rack(&mut self, rack: &Rack) {
        self.position.set_current_rack(rack.clone());
    }

    fn set_included_moves(&mut self, moves: &[CandidateMove]) {
        for candidate in &mut self.candidates {
            candidate.excluded = !moves.is_empty() && !moves.iter().any(|m| m.same_play(candidate));
        }
    }

    fn set_ignore_opponents(&mut self, ignore: bool) {
        self.ignore_opponents = ignore;
    }

    fn set_partial_opponent_rack(&mut self, rack: &Rack) {
        self.partial_opponent_rack = rack.clone();
    }

    fn candidates(&self) -> &[CandidateMove] {
        &self.candidates
    }

    fn advance_batch(&mut self, plies: u32, rollouts: u32) -> Result<Vec<RolloutSample>, RolloutError> {
        let spread = self.position.spread() as f64;
        let candidates = self.candidates.clone();
        let mut samples = Vec::with_capacity(candidates.len() * rollouts as usize);
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.excluded {
                continue;
            }
            for _ in 0..rollouts {
                let equity = self.rollout(candidate, plies)?;
                samples.push(RolloutSample::new(index, equity, outcome(spread + equity)));
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::two_player(
            "QUACKLE".parse().unwrap(),
            Rack::default(),
            vec![
                CandidateMove::new("8D QUACKLE", "QUACKLE", 110),
                CandidateMove::new("8H QUA", "QUA", 24),
                CandidateMove::new("PASS", "", 0),
            ],
        )
    }

    #[test]
    fn test_candidates_follow_position() {
        let engine = TilePlayoutEngine::with_position(7, &position());
        assert_eq!(engine.candidates().len(), 3);
        assert!(engine.candidates().iter().all(|c| !c.excluded));
    }

    #[test]
    fn test_included_moves_flag_the_rest() {
        let mut engine = TilePlayoutEngine::with_position(7, &position());
        let keep = vec![CandidateMove::new("8H QUA", "QUA", 24)];
        engine.set_included_moves(&keep);
        let flags: Vec<bool> = engine.candidates().iter().map(|c| c.excluded).collect();
        assert_eq!(flags, vec![true, false, true]);

        engine.set_included_moves(&[]);
        assert!(engine.candidates().iter().all(|c| !c.excluded));
    }

    #[test]
    fn test_batch_covers_every_included_candidate() {
        let mut engine = TilePlayoutEngine::with_position(11, &position());
        engine.set_included_moves(&[CandidateMove::new("8D QUACKLE", "QUACKLE", 110), CandidateMove::new("PASS", "", 0)]);
        let samples = engine.advance_batch(2, 10).unwrap();
        assert_eq!(samples.len(), 20);
        assert!(samples.iter().all(|s| s.candidate != 1));
        assert!(samples.iter().all(|s| (0.0..=1.0).contains(&s.win)));
    }

    #[test]
    fn test_zero_plies_is_static_score() {
        let mut engine = TilePlayoutEngine::with_position(3, &position());
        let samples = engine.advance_batch(0, 5).unwrap();
        assert!(samples.iter().filter(|s| s.candidate == 0).all(|s| s.equity == 110.0));
    }

    #[test]
    fn test_ignoring_opponents_never_lowers_equity() {
        let mut engine = TilePlayoutEngine::with_position(5, &position());
        engine.set_ignore_opponents(true);
        let samples = engine.advance_batch(2, 20).unwrap();
        assert!(samples.iter().filter(|s| s.candidate == 1).all(|s| s.equity >= 24.0));
    }

    #[test]
    fn test_impossible_partial_rack_is_an_error() {
        let mut engine = TilePlayoutEngine::with_position(5, &position());
        engine.set_partial_opponent_rack(&"QQ".parse().unwrap());
        assert!(matches!(
            engine.advance_batch(2, 1),
            Err(RolloutError::BagExhausted { .. })
        ));
    }

    #[test]
    fn test_empty_game_has_no_continuation() {
        let mut position = position();
        position.bag = crate::types::Bag::new(Vec::new());
        position.racks = vec!["QUA".parse().unwrap(), Rack::default()];
        position.moves = vec![CandidateMove::new("8H QUA", "QUA", 24)];
        let mut engine = TilePlayoutEngine::with_position(1, &position);
        assert_eq!(engine.advance_batch(2, 1), Err(RolloutError::NoContinuation));
    }
}
