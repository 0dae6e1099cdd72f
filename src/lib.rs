pub mod budget;
pub mod config;
pub mod source;
pub mod upload;
pub mod warehouse;
