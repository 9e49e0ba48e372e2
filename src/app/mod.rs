pub mod analytics;
pub mod auth;
pub mod items;
pub mod matching;
pub mod messaging;
pub mod moderation;
pub mod rate_limiter;
