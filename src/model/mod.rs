pub mod board;
pub mod card;
pub mod common;
pub mod list;
pub mod relation;
pub mod snapshot;

pub use board::*;
pub use card::*;
pub use common::*;
pub use list::*;
pub use relation::*;
pub use snapshot::*;
