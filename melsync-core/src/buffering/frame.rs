//! Typed fixed-length frame passed from the chunker to the featurizer.

/// One fixed-length block of mono PCM samples.
///
/// Every frame of a chunk sequence has the same length; the last one is
/// right-padded with zeros when the source ran out.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Position in the chunk sequence, starting at 0.
    pub index: usize,
    /// Mono f32 samples, padding included.
    pub samples: Vec<f32>,
    /// Number of leading samples taken from the source; the rest is padding.
    pub valid_len: usize,
}

impl AudioFrame {
    pub fn new(index: usize, samples: Vec<f32>, valid_len: usize) -> Self {
        Self {
            index,
            samples,
            valid_len,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns true if any trailing samples are zero padding.
    pub fn is_padded(&self) -> bool {
        self.valid_len < self.samples.len()
    }

    /// The zero-padded tail (empty for full frames).
    pub fn padding(&self) -> &[f32] {
        &self.samples[self.valid_len.min(self.samples.len())..]
    }
}
