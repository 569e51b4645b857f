pub mod auth;
pub mod chats;
pub mod discover;
pub mod profile;
pub mod projects;
pub mod users;
pub mod watches;
