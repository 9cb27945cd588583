//! json shapes shared between the server and its clients

mod response;
mod payload;

pub mod error;
pub mod fs;

pub use error::{ApiError, ApiErrorKind, Detail};
pub use payload::Payload;
