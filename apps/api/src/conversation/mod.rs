// Conversation layer: the two-party message channel a match unlocks.

pub mod binder;
pub mod handlers;
