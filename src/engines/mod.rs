//! Concrete [`SimulationEngine`](crate::engine::SimulationEngine) implementations.

pub mod tile_playout;

pub use tile_playout::TilePlayoutEngine;
