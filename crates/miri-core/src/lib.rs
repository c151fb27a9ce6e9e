pub mod actions;
pub mod analysis;
pub mod config;
pub mod protocol;
pub mod reducer;
pub mod report;
pub mod state;

pub use actions::*;
pub use analysis::*;
pub use config::*;
pub use protocol::*;
pub use reducer::*;
pub use state::*;
