pub mod capture;
pub mod file;
pub mod wav;

pub use capture::{ArtifactHandle, AudioCapture};
pub use wav::{WavCaptureConfig, WavFileCapture};
