// Matching engine: pair scoring, candidate scanning, match lifecycle.
// All match rows and item status flips go through `lifecycle` — handlers and
// the conversation binder never write them directly.

pub mod handlers;
pub mod lifecycle;
pub mod scanner;
pub mod scoring;
