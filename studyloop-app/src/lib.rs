pub mod api;
pub mod cli;
pub mod content;
pub mod rewards;
