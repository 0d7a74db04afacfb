pub mod channel;
pub mod health;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod retry;
pub mod status;
