//! Known-plaintext (crib) attack: menu construction and the stop-test
//! search that reproduces the wartime Bombe procedure.

pub mod crib;
pub mod menu;
pub mod search;

pub use crib::{BombeCrib, BAD_SCORE, MAX_CRIB_LEN};
pub use menu::{BombeMenu, StbAssumption, SubGraph};
pub use search::{BombeParams, BombeSearch};
