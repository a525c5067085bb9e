//! Specular mip chain packing
//!
//! Compute shaders write storage textures one mip at a time, so the whole
//! prefiltered chain is rendered side by side into mip 0 of a single 2D
//! array (one layer per cube face) and copied into place afterwards.
//!
//! ```text
//! x: 0          B          B + B/2
//!    +----------+-----+--+-+
//!    |  mip 0   |mip 1|m2|.|
//!    |          +-----+--+-+
//!    +----------+
//! ```

/// Placement of one mip level in the packed texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipRegion {
    pub level: u32,
    pub size: u32,
    pub offset_x: u32,
}

/// Packing plan shared by the dispatch loop and the copy loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecularMipLayout {
    base_size: u32,
    regions: Vec<MipRegion>,
}

impl SpecularMipLayout {
    /// Plan at most `max_mips` levels for a chain starting at `base_size`.
    /// The chain stops once a level would be smaller than one texel.
    pub fn new(base_size: u32, max_mips: u32) -> Self {
        let base_size = base_size.max(1);
        let full_chain = u32::BITS - base_size.leading_zeros();
        let mip_count = max_mips.clamp(1, full_chain);

        let mut offset_x = 0;
        let regions = (0..mip_count)
            .map(|level| {
                let size = (base_size >> level).max(1);
                let region = MipRegion { level, size, offset_x };
                offset_x += size;
                region
            })
            .collect();

        Self { base_size, regions }
    }

    pub fn base_size(&self) -> u32 {
        self.base_size
    }

    pub fn mip_count(&self) -> u32 {
        self.regions.len() as u32
    }

    /// Width of the packed texture
    pub fn packed_width(&self) -> u32 {
        self.regions.iter().map(|r| r.size).sum()
    }

    pub fn regions(&self) -> &[MipRegion] {
        &self.regions
    }

    /// GGX roughness prefiltered into `level`
    pub fn roughness(&self, level: u32) -> f32 {
        level as f32 / self.mip_count() as f32
    }
}
