// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring a [`BoundedMemoryStore`].

use strata_backend::Clock;
use strata_codec::CodecConfig;

use crate::store::BoundedMemoryStore;

/// Default byte budget: 32 MiB.
pub const DEFAULT_MAX_SIZE: usize = 32 * 1024 * 1024;

/// Builder for [`BoundedMemoryStore`].
///
/// # Examples
///
/// ```
/// use strata_backend::Clock;
/// use strata_memory::BoundedMemoryStore;
///
/// let store = BoundedMemoryStore::builder()
///     .max_size(8 * 1024 * 1024)
///     .clock(Clock::new())
///     .build();
/// ```
#[derive(Debug)]
pub struct BoundedMemoryStoreBuilder {
    pub(crate) max_size: usize,
    pub(crate) codec_config: CodecConfig,
    pub(crate) clock: Option<Clock>,
}

impl BoundedMemoryStoreBuilder {
    pub(crate) fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            codec_config: CodecConfig::default(),
            clock: None,
        }
    }

    /// Sets the byte budget that triggers pruning.
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the codec configuration used to encode stored entries.
    #[must_use]
    pub fn codec_config(mut self, config: CodecConfig) -> Self {
        self.codec_config = config;
        self
    }

    /// Sets the clock used for expiration sweeps and counter TTLs.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> BoundedMemoryStore {
        BoundedMemoryStore::from_builder(self)
    }
}
