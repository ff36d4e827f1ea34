pub mod types;
pub mod traits;
pub mod error;
pub mod buffering;
pub mod relay;
pub mod gateway;

pub use traits::{ByteStream, ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
pub use error::{GatewayError, Result};
pub use buffering::CircularLineBuffer;
pub use relay::{relay, SentinelDetector, DONE_SENTINEL};
pub use gateway::GatewayClient;
pub use types::{ConversationMessage, Message, Role};
