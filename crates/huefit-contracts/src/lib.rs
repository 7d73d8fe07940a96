pub mod commands;
pub mod events;
pub mod images;
pub mod palette;
pub mod session;
