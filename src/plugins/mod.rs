pub mod core;
pub mod engine;
pub mod hud;
pub mod map_view;
pub mod saveload;
pub mod view;
