pub mod game;
pub mod poll;
pub mod scope;
