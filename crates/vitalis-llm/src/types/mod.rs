pub mod message;

pub use message::{ConversationMessage, Message, Role};
