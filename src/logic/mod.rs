pub mod engine;
pub mod generation;
pub mod mutator;
pub mod reconcile;
pub mod state;
pub mod undo;

pub use engine::*;
pub use generation::*;
pub use mutator::*;
pub use reconcile::*;
pub use state::*;
pub use undo::*;
