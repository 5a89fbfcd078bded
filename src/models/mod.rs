pub mod control;
pub mod log;

pub use control::*;
pub use log::*;
