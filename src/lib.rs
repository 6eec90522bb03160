pub mod deck;
pub mod library;
pub mod protocol;
pub mod room;
pub mod types;
pub mod ws;
