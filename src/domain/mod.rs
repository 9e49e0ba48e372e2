pub mod analytics;
pub mod item;
pub mod matching;
pub mod message;
pub mod moderation;
pub mod user;
