pub mod clock;
pub mod composition;
pub mod models;
pub mod playback;
