pub mod controller;
pub mod intent;
pub mod store;

pub use controller::{
    summarize_analysis, ConversationController, ConversationMessage, PageSizes, SignedInUser,
};
pub use intent::{classify, ClassifyContext, Effect, Intent, Reply};
pub use store::{ChatSessionStore, Cursor, Page};
