pub mod alphabet;
pub mod bombe;
pub mod error;
pub mod key;
pub mod report;
pub mod search;
pub mod stats;
pub mod wiring;

pub use error::{EnResult, EnigmaError};
pub use key::{Key, MRingScope, Model, ScoreMode};
pub use report::{ConsoleReporter, ResultReporter};
pub use stats::EnigmaStats;
