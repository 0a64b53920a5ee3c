//! Dictionary metadata and packed marker codes.

/// A fixed ArUco-style dictionary.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Human-readable name (for logging).
    pub name: &'static str,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Maximum error-correcting Hamming distance supported by the dictionary.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bit `y * marker_size + x` holds cell `(x, y)`, **white = 1**, which is
    /// how the printed OpenCV dictionaries are laid out.
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    /// Code for `id`, if the dictionary has it.
    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Whether cell `(x, y)` of marker `code` is white.
    #[inline]
    pub fn is_white(&self, code: u64, x: usize, y: usize) -> bool {
        (code >> (y * self.marker_size + x)) & 1 == 1
    }
}
