pub mod setup;
pub mod owner;
