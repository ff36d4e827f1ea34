pub mod chat;
pub mod digest;
