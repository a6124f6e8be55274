//! Application layer: the conversational turn boundary.

mod chat_service;

pub use chat_service::{
    ChatReply, ChatService, MAX_CONCURRENT_TURNS, PROCESSING_ERROR_FALLBACK, RECURSION_FALLBACK,
};
