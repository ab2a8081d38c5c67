//! Moneta Common Types
//!
//! Shared monetary primitives used across the Moneta engine: the static
//! currency table, money amounts, currency pairs and exchange rates.

pub mod currencies;
pub mod monetary;
pub mod error;
pub mod time;

pub use currencies::CurrencyInfo;
pub use monetary::*;
pub use error::*;
pub use time::*;
