//! Display options that change what a tile load produces.

use dsf_decode::ReadOptions;

bitflags::bitflags! {
    /// Editor display switches relevant to tile loading.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct DisplayOptions: u32 {
        const NONE      = 0;
        /// Index the real terrain mesh instead of the flat stand-in.
        const ELEVATION = 1 << 0;
        /// Decode road, rail and power line chains.
        const NETWORKS  = 1 << 1;
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self::ELEVATION | Self::NETWORKS
    }
}

impl DisplayOptions {
    /// Command families to decode. Terrain is always read since patches are
    /// kept on the scene even when the index is flat.
    #[must_use]
    pub fn read_options(self) -> ReadOptions {
        ReadOptions {
            networks: self.contains(Self::NETWORKS),
            ..ReadOptions::default()
        }
    }
}
