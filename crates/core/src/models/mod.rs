//! Data models for DineWheel

mod member;
mod restaurant;
mod room;

pub use member::*;
pub use restaurant::*;
pub use room::*;
