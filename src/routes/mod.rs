pub mod donors;
pub mod events;
pub mod operations;
