pub mod feed;
pub mod playback_bar;
pub mod tile;
