pub mod client;
pub mod listener;
pub mod messages;
pub mod oauth;
pub mod session;

pub use client::TwitterClient;
pub use listener::{FileListener, StreamHandler};
pub use session::StreamSession;
