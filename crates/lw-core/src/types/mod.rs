//! Core data types: enums, order documents, normalized orders, trades, ticks.

pub mod enums;
pub mod market_data;
pub mod order;
pub mod trading;

pub use enums::*;
pub use market_data::*;
pub use order::*;
pub use trading::*;
