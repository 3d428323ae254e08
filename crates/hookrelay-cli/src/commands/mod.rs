pub mod check_token;
pub mod serve;

// Re-export command handlers
pub use check_token::CheckTokenCommand;
pub use serve::ServeArgs;
