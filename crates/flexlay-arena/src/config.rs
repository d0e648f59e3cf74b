//! Build configuration parameters.

/// Configuration for building composites.
///
/// The defaults impose no limit beyond what the platform allocator accepts
/// and leave padding bytes untouched. `build` and `build_in` always use
/// the defaults; `try_build_in` takes an explicit config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildConfig {
    /// Largest block, in bytes, a single build may request.
    ///
    /// Default: `isize::MAX`, the largest size a `Layout` can describe.
    pub max_block_bytes: usize,

    /// Byte written into every alignment padding gap between regions.
    ///
    /// Default: `None` (padding is left uninitialised). Useful when
    /// inspecting blocks in a debugger.
    pub padding_fill: Option<u8>,
}

impl BuildConfig {
    /// Default block cap.
    pub const DEFAULT_MAX_BLOCK_BYTES: usize = isize::MAX as usize;

    /// Create a config with default values.
    pub const fn new() -> Self {
        Self {
            max_block_bytes: Self::DEFAULT_MAX_BLOCK_BYTES,
            padding_fill: None,
        }
    }

    /// Cap the block size.
    pub const fn with_max_block_bytes(mut self, max_block_bytes: usize) -> Self {
        self.max_block_bytes = max_block_bytes;
        self
    }

    /// Fill alignment padding with `byte`.
    pub const fn with_padding_fill(mut self, byte: u8) -> Self {
        self.padding_fill = Some(byte);
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new()
    }
}
