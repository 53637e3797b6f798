//! Linux device runtime for fillcam: LTR-559 over `/dev/i2c-N`, fill-light
//! lines over `/dev/gpiochipN`, `rpicam-still` captures and Azure Blob
//! uploads, driven by the `fillcam-core` round scheduler.

pub mod app;
pub mod camera;
pub mod hardware;
pub mod upload;
