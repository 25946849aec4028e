pub mod memory;
pub mod prefetch_cache;
pub mod traits;

pub use memory::*;
pub use prefetch_cache::*;
pub use traits::*;
