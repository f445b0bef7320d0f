//! Regex-driven type hints consumed by the data cleaner and the metadata layer.
pub mod date;
pub mod entity;
