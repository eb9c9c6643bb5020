pub mod chat;
pub mod events;
pub mod models;
pub mod notices;
pub mod session;
pub mod storyboard;
