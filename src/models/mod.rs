//! Data models for reposcope

pub mod branch;
pub mod change;
pub mod commit;
pub mod filter;
pub mod inline;
pub mod repository;
pub mod settings;

pub use branch::*;
pub use change::*;
pub use commit::*;
pub use filter::*;
pub use inline::*;
pub use repository::*;
pub use settings::*;
