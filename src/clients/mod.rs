pub mod consumer;
pub mod database;
pub mod health;
pub mod ntfy;
pub mod rbmq;
pub mod redis;
pub mod relay;
pub mod topology;
