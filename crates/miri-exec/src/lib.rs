pub mod client;
pub mod decoder;
pub mod error;
pub mod runner;

pub use client::*;
pub use decoder::*;
pub use error::*;
pub use runner::*;
