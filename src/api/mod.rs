pub mod client;
pub mod models;

pub use client::{ConsoleStream, LabClient};
pub use models::*;
