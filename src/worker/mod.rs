pub mod delivery;
pub mod handler;
pub mod pool;
pub mod processor;
