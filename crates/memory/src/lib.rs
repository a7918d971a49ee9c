//! Conversation history for Scholar.
//!
//! Each conversation is a JSON file holding its ordered turns, so a user can
//! leave the interactive session and resume the same context later. The
//! agent flow reads the turns back as model input, windowed to the most
//! recent messages.

pub mod store;
pub mod types;

pub use store::ConversationStore;
pub use types::{Conversation, ConversationSummary, Message, StoreConfig};
