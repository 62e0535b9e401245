pub mod command;
pub mod event;
pub mod interact;
pub mod results;
