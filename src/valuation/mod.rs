pub mod engine;

pub use engine::{revalue, PositionValue, ValuationSnapshot};
