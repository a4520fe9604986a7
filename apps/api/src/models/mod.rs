pub mod enums;
pub mod notification;
pub mod patch;
pub mod plant;
pub mod upload;
