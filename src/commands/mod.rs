//! Command implementations

pub mod get;
pub mod list;
pub mod run;

pub use get::*;
pub use list::*;
pub use run::*;
