//! Audio ingestion: decode, downmix, resample.
//!
//! ```text
//! bytes / path ─► loader::load_* ─► RawAudioBuffer (native rate, N channels)
//!                                        │
//!                         normalize::normalize (mean downmix + sinc resample)
//!                                        │
//!                                        ▼
//!                         NormalizedAudio (target rate, mono)
//! ```

pub mod loader;
pub mod normalize;
pub mod resample;
pub mod wav;

pub use loader::{load_bytes, load_file, RawAudioBuffer};
pub use normalize::{downmix, normalize, NormalizedAudio};
pub use resample::RateConverter;
