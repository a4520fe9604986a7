pub mod care;
pub mod handlers;
pub mod photos;
pub mod repository;
pub mod slug;
