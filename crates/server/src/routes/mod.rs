pub mod download;
pub mod health;
pub mod progress;
pub mod runs;
