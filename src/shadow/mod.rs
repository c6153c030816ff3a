//! CPU model of the shadow pipeline.
//!
//! - [`MomentMap`] - `(z, z²)` per texel, what the light pass renders
//! - [`SummedAreaTable`] - 2D prefix sums built like the compute pass builds them
//! - [`ShadowSampler`] - basic, PCF, PCSS and VSSM visibility estimates
//!
//! The GPU renderer is the production path; this module is the reference it
//! is verified against and the place where filter behaviour is tested.

mod estimate;
mod mode;
mod moments;
mod params;
mod sat;

pub use estimate::{penumbra_radius, project, search_radius, LightSample, ShadowSampler, LIT_FRACTION};
pub use mode::ShadowMode;
pub use moments::{MomentMap, Moments};
pub use params::{DepthRange, ShadowParams, DEFAULT_MAP_SIZE};
pub use sat::{brute_force_sum, centred_moments, window_half_size, SummedAreaTable, TexelRect, WindowStats, SCAN_LANES};
