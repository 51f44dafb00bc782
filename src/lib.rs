// Library exports for mood-cam - webcam emotion overlay

pub mod annotate;
pub mod app;
pub mod camera;
pub mod config;
pub mod display;
pub mod emotion;
pub mod error;
pub mod models;
pub mod publisher;
