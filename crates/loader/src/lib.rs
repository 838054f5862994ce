use anyhow::{anyhow, Context, Result};
use mcmon_core::memory::ProgramImage;
use mcmon_core::srec::{self, Record, RecordStats};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Decodes S-record text into an image. Stops at the first end-of-file
/// record; the entry point is the address of the first data record.
pub fn parse_srec(text: &str) -> Result<ProgramImage> {
    let mut image = ProgramImage::new(0);
    let mut entry = None;
    let mut stats = RecordStats::default();

    for (n, raw) in text.lines().enumerate() {
        let line = mcmon_core::lexer::skip_spaces(raw).trim_end();
        if line.is_empty() {
            continue;
        }
        let res = srec::decode(line, &mut stats, |addr, b| image.push_byte(addr, b));
        match res.map_err(|e| anyhow!("Bad S-record on line {}: {}", n + 1, e))? {
            Record::Data { address, len } => {
                debug!("Data record: Addr={:#x}, Size={} bytes", address, len);
                entry.get_or_insert(address);
            }
            Record::EndOfFile => break,
            Record::StartOfFile | Record::Count => {}
        }
    }

    image.entry_point = entry.unwrap_or(0);
    if image.is_empty() {
        warn!("No data records found in S-record file");
    }
    info!(
        "S-record image: {} bytes in {} segments, {} records",
        image.len(),
        image.segments.len(),
        stats.good
    );
    Ok(image)
}

pub fn load_srec(path: &Path) -> Result<ProgramImage> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read S-record file: {:?}", path))?;
    parse_srec(&text).with_context(|| format!("Failed to decode S-record file: {:?}", path))
}

/// Wraps a raw binary as one segment at `load_addr`, which is also its entry
/// point.
pub fn load_binary(path: &Path, load_addr: u64) -> Result<ProgramImage> {
    let data = fs::read(path).with_context(|| format!("Failed to read binary: {:?}", path))?;
    if data.is_empty() {
        warn!("Binary {:?} is empty", path);
    }
    info!("Binary image: {} bytes at {:#x}", data.len(), load_addr);

    let mut image = ProgramImage::new(load_addr);
    image.add_segment(load_addr, data);
    Ok(image)
}
