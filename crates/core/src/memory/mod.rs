use serde::{Deserialize, Serialize};

/// Width of a single memory cell access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessSize {
    Byte,
    Half,
    Word,
    Quad,
}

impl AccessSize {
    pub fn from_bytes(n: u64) -> Option<Self> {
        match n {
            1 => Some(Self::Byte),
            2 => Some(Self::Half),
            4 => Some(Self::Word),
            8 => Some(Self::Quad),
            _ => None,
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::Quad => 8,
        }
    }

    /// Hex digits needed to print or type a full cell.
    pub fn digits(self) -> usize {
        self.bytes() as usize * 2
    }

    pub fn mask(self) -> u64 {
        match self {
            Self::Quad => u64::MAX,
            _ => (1u64 << (self.bytes() * 8)) - 1,
        }
    }

    pub fn is_aligned(self, addr: u64) -> bool {
        addr & (self.bytes() - 1) == 0
    }
}

/// Sized access to target memory.
///
/// Implementations perform no validation; callers check alignment first.
pub trait MemoryWindow {
    fn read(&self, addr: u64, size: AccessSize) -> u64;
    fn write(&mut self, addr: u64, size: AccessSize, value: u64);

    fn read_u8(&self, addr: u64) -> u8 {
        self.read(addr, AccessSize::Byte) as u8
    }

    fn write_u8(&mut self, addr: u64, value: u8) {
        self.write(addr, AccessSize::Byte, value as u64)
    }
}

/// Direct access to the physical address space of the running target.
///
/// This is the only place in the monitor that dereferences an address typed
/// by the operator.
#[derive(Debug)]
pub struct RawWindow {
    _private: (),
}

impl RawWindow {
    /// # Safety
    ///
    /// Every address later passed to `read` or `write` must be mapped and
    /// safe to access at the requested width, and nothing else in the
    /// program may hold references into memory written through the window.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryWindow for RawWindow {
    fn read(&self, addr: u64, size: AccessSize) -> u64 {
        let p = addr as usize;
        // SAFETY: upheld by the contract of `RawWindow::new`; callers have
        // checked alignment for `size`.
        unsafe {
            match size {
                AccessSize::Byte => core::ptr::read_volatile(p as *const u8) as u64,
                AccessSize::Half => core::ptr::read_volatile(p as *const u16) as u64,
                AccessSize::Word => core::ptr::read_volatile(p as *const u32) as u64,
                AccessSize::Quad => core::ptr::read_volatile(p as *const u64),
            }
        }
    }

    fn write(&mut self, addr: u64, size: AccessSize, value: u64) {
        let p = addr as usize;
        // SAFETY: see `read`.
        unsafe {
            match size {
                AccessSize::Byte => core::ptr::write_volatile(p as *mut u8, value as u8),
                AccessSize::Half => core::ptr::write_volatile(p as *mut u16, value as u16),
                AccessSize::Word => core::ptr::write_volatile(p as *mut u32, value as u32),
                AccessSize::Quad => core::ptr::write_volatile(p as *mut u64, value),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u64,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u64) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    /// Appends one byte, extending the last segment when `addr` follows it.
    pub fn push_byte(&mut self, addr: u64, value: u8) {
        if let Some(last) = self.segments.last_mut() {
            if last.start_addr.checked_add(last.data.len() as u64) == Some(addr) {
                last.data.push(value);
                return;
            }
        }
        self.add_segment(addr, vec![value]);
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A simple flat memory storage
#[derive(Debug)]
pub struct LinearMemory {
    pub name: String,
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(name: impl Into<String>, size: usize, base_addr: u64) -> Self {
        Self {
            name: name.into(),
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base_addr && addr - self.base_addr < self.data.len() as u64
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    /// Copies `segment` in when it lies wholly inside this region.
    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        let Some(end_addr) = segment.start_addr.checked_add(segment.data.len() as u64) else {
            return false;
        };
        let Some(mem_end) = self.base_addr.checked_add(self.data.len() as u64) else {
            return false;
        };

        if segment.start_addr >= self.base_addr && end_addr <= mem_end {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_size_alignment() {
        assert!(AccessSize::Byte.is_aligned(0x1003));
        assert!(AccessSize::Half.is_aligned(0x1002));
        assert!(!AccessSize::Half.is_aligned(0x1001));
        assert!(AccessSize::Word.is_aligned(0x1004));
        assert!(!AccessSize::Word.is_aligned(0x1002));
        assert!(AccessSize::Quad.is_aligned(0x1008));
        assert!(!AccessSize::Quad.is_aligned(0x1004));
    }

    #[test]
    fn test_access_size_from_bytes() {
        assert_eq!(AccessSize::from_bytes(4), Some(AccessSize::Word));
        assert_eq!(AccessSize::from_bytes(3), None);
        assert_eq!(AccessSize::from_bytes(0), None);
        assert_eq!(AccessSize::Half.mask(), 0xffff);
        assert_eq!(AccessSize::Quad.mask(), u64::MAX);
        assert_eq!(AccessSize::Word.digits(), 8);
    }

    #[test]
    fn test_raw_window_on_local_buffer() {
        let mut cell = [0u64; 2];
        let addr = cell.as_mut_ptr() as u64;
        // SAFETY: only addresses inside `cell` are touched.
        let mut window = unsafe { RawWindow::new() };
        window.write(addr, AccessSize::Quad, 0x1122_3344_5566_7788);
        window.write(addr + 8, AccessSize::Half, 0xbeef);
        assert_eq!(window.read(addr, AccessSize::Quad), 0x1122_3344_5566_7788);
        assert_eq!(window.read(addr + 8, AccessSize::Half), 0xbeef);
        assert_eq!(cell[0], 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_image_push_byte_merges_contiguous() {
        let mut image = ProgramImage::new(0x100);
        image.push_byte(0x100, 1);
        image.push_byte(0x101, 2);
        image.push_byte(0x200, 3);
        assert_eq!(image.segments.len(), 2);
        assert_eq!(image.segments[0].data, vec![1, 2]);
        assert_eq!(image.len(), 3);
    }

    #[test]
    fn test_image_push_byte_at_top_of_address_space() {
        let mut image = ProgramImage::new(0);
        image.push_byte(u64::MAX, 1);
        image.push_byte(0, 2);
        assert_eq!(image.segments.len(), 2);
        assert_eq!(image.segments[1].start_addr, 0);
    }

    #[test]
    fn test_segment_past_end_of_address_space_does_not_fit() {
        let mut mem = LinearMemory::new("ram", 16, 0x1000);
        let wrapping = Segment {
            start_addr: u64::MAX,
            data: vec![1, 2],
        };
        assert!(!mem.load_from_segment(&wrapping));
        let inside = Segment {
            start_addr: 0x100e,
            data: vec![1, 2],
        };
        assert!(mem.load_from_segment(&inside));
        assert_eq!(mem.read_u8(0x100f), Some(2));
    }

    #[test]
    fn test_linear_memory_bounds() {
        let mut mem = LinearMemory::new("ram", 16, 0x1000);
        assert!(mem.write_u8(0x100f, 0xaa));
        assert!(!mem.write_u8(0x1010, 0xaa));
        assert_eq!(mem.read_u8(0x100f), Some(0xaa));
        assert_eq!(mem.read_u8(0x0fff), None);
    }
}
