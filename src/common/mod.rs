pub use limits::Config as LimitsConfig;
pub use status_code::StatusCode;

pub mod limits;
pub(crate) mod mime;
mod status_code;
