//! Sensor collaborators: the camera and the weight backends.

mod camera;
pub mod scale;

pub use camera::{Camera, JpegSplitter, StreamCamera};
pub use scale::{DirectScale, ScaleBackend, SerialScale, WeightSource};
