// Analysis module - per-block DSP for the volume pipeline
//
// The three stages run in order on every captured block:
//   estimate_intensity → map_volume → SmoothingFilter::smooth
// All of them are infallible; degenerate inputs are clamped.

pub mod intensity;
pub mod mapper;
pub mod smoothing;

pub use intensity::{estimate_intensity, intensity_of};
pub use mapper::{clamp_sensitivity, map_volume, MappingConfig};
pub use smoothing::SmoothingFilter;
