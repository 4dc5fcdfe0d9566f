// Signal processing blocks shared by the frame generator, synchronizer and sample pipeline

pub mod filter;
pub mod hilbert;
pub mod nco;
pub mod resampler;

pub use filter::{FirInterpolator, MatchedFilterBank};
pub use hilbert::{HilbertDecimator, HilbertInterpolator};
pub use nco::{Nco, PhaseLockedLoop};
pub use resampler::RationalResampler;
