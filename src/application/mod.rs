pub mod bootstrap;
pub mod commands;
pub mod editor;
pub mod player;
pub mod side_effects;
