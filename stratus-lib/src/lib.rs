pub mod ids;
pub mod error;
pub mod fs;
