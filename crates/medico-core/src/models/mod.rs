//! Domain models for the medico system.

mod account;
mod catalog;
mod patient;
mod report;
mod staff;

pub use account::*;
pub use catalog::*;
pub use patient::*;
pub use report::*;
pub use staff::*;
