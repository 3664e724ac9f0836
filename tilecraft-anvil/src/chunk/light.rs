/// Block and sky light of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightingData {
    pub block_light: u8,
    pub sky_light: u8,
}

/// Sky light lost at night.
const NIGHT_SKY_PENALTY: i32 = 11;

impl LightingData {
    pub fn new(block_light: u8, sky_light: u8) -> Self {
        Self { block_light, sky_light }
    }

    /// Effective light level. At night sky light counts 11 levels less.
    pub fn light_level(&self, day: bool) -> u8 {
        if day {
            return self.block_light.max(self.sky_light);
        }
        let night_sky = self.sky_light as i32 - NIGHT_SKY_PENALTY;
        (self.block_light as i32).max(night_sky) as u8
    }
}
