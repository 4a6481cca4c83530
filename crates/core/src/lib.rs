pub mod config;
pub mod error;
pub mod source;

pub use config::NotifierConfig;
pub use error::*;
pub use source::*;
