pub mod assistant;
pub mod autoscroll;
pub mod catalog;
pub mod chat_api;
pub mod conversation;
pub mod gui;
pub mod message_store;
pub mod panel;
