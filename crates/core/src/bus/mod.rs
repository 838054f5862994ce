use crate::memory::{AccessSize, LinearMemory, MemoryWindow, ProgramImage};
use anyhow::Result;
use mcmon_config::MonitorConfig;

/// Simulated target memory made of disjoint RAM regions.
#[derive(Debug, Default)]
pub struct SystemBus {
    pub regions: Vec<LinearMemory>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let mut bus = Self::new();
        for region in &config.memory {
            let size = mcmon_config::parse_size(&region.size)?;
            tracing::debug!(
                "Mapping region '{}' at {:#x}, {} bytes",
                region.name,
                region.base,
                size
            );
            bus.add_region(LinearMemory::new(
                region.name.clone(),
                size as usize,
                region.base,
            ));
        }
        Ok(bus)
    }

    pub fn add_region(&mut self, region: LinearMemory) {
        self.regions.push(region);
    }

    fn region_for(&self, addr: u64) -> Option<&LinearMemory> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    fn byte(&self, addr: u64) -> u8 {
        match self.region_for(addr).and_then(|r| r.read_u8(addr)) {
            Some(b) => b,
            None => {
                tracing::warn!("Read from unmapped address {:#x}", addr);
                0
            }
        }
    }

    fn set_byte(&mut self, addr: u64, value: u8) {
        let stored = self
            .regions
            .iter_mut()
            .find(|r| r.contains(addr))
            .map(|r| r.write_u8(addr, value))
            .unwrap_or(false);
        if !stored {
            tracing::warn!("Write to unmapped address {:#x} dropped", addr);
        }
    }

    /// Copies every segment of `image` into memory. Returns the number of
    /// segments that did not fit inside a single region.
    pub fn load_image(&mut self, image: &ProgramImage) -> usize {
        let mut skipped = 0;
        for segment in &image.segments {
            let loaded = self
                .regions
                .iter_mut()
                .any(|r| r.load_from_segment(segment));
            if !loaded {
                tracing::warn!(
                    "Failed to load segment at {:#x} - outside of memory map",
                    segment.start_addr
                );
                skipped += 1;
            }
        }
        skipped
    }
}

impl MemoryWindow for SystemBus {
    fn read(&self, addr: u64, size: AccessSize) -> u64 {
        // Little Endian
        (0..size.bytes()).fold(0u64, |acc, i| {
            acc | (self.byte(addr.wrapping_add(i)) as u64) << (8 * i)
        })
    }

    fn write(&mut self, addr: u64, size: AccessSize, value: u64) {
        for i in 0..size.bytes() {
            self.set_byte(addr.wrapping_add(i), (value >> (8 * i)) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> SystemBus {
        let mut bus = SystemBus::new();
        bus.add_region(LinearMemory::new("ram", 0x100, 0x1000));
        bus
    }

    #[test]
    fn test_sized_write_read_back() {
        let mut bus = bus();
        for (addr, size, value) in [
            (0x1000, AccessSize::Byte, 0xa5),
            (0x1002, AccessSize::Half, 0xbeef),
            (0x1004, AccessSize::Word, 0xdead_beef),
            (0x1008, AccessSize::Quad, 0x0123_4567_89ab_cdef),
        ] {
            bus.write(addr, size, value);
            assert_eq!(bus.read(addr, size), value);
        }
    }

    #[test]
    fn test_little_endian_layout() {
        let mut bus = bus();
        bus.write(0x1010, AccessSize::Word, 0x1122_3344);
        assert_eq!(bus.read_u8(0x1010), 0x44);
        assert_eq!(bus.read_u8(0x1013), 0x11);
        assert_eq!(bus.read(0x1012, AccessSize::Half), 0x1122);
    }

    #[test]
    fn test_unmapped_reads_zero_and_drops_writes() {
        let mut bus = bus();
        bus.write(0x2000, AccessSize::Word, 0xffff_ffff);
        assert_eq!(bus.read(0x2000, AccessSize::Word), 0);
        // Straddles the end of the region
        bus.write(0x10fe, AccessSize::Word, 0x4433_2211);
        assert_eq!(bus.read(0x10fe, AccessSize::Half), 0x2211);
    }

    #[test]
    fn test_from_config_default() {
        let bus = SystemBus::from_config(&MonitorConfig::default()).unwrap();
        assert_eq!(bus.regions.len(), 1);
        assert_eq!(bus.regions[0].data.len(), 64 * 1024);
    }

    #[test]
    fn test_load_image() {
        let mut bus = bus();
        let mut image = ProgramImage::new(0x1000);
        image.add_segment(0x1020, vec![1, 2, 3]);
        image.add_segment(0x5000, vec![9]);
        assert_eq!(bus.load_image(&image), 1);
        assert_eq!(bus.read(0x1020, AccessSize::Byte), 1);
        assert_eq!(bus.read_u8(0x1022), 3);
    }

    #[test]
    fn test_load_image_at_top_of_address_space() {
        let mut bus = bus();
        let mut image = ProgramImage::new(u64::MAX);
        image.add_segment(u64::MAX, vec![1, 2]);
        assert_eq!(bus.load_image(&image), 1);
    }
}
