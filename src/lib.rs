pub mod bridge;
pub mod dag;
pub mod db;
pub mod decompose;
pub mod error;
pub mod facade;
pub mod merge;
pub mod monitor;
pub mod spawn;
pub mod types;

pub use db::CoordDb;
pub use error::{ArchitectError, Result};
pub use types::*;
