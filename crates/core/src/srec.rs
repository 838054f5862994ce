// MCMon - Multi-Core Debug Monitor
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! S-record decoding.
//!
//! A record line is `S`, a type digit, a two-digit byte count, then `count`
//! bytes as hex pairs: the address, the data and a checksum chosen so that
//! the count plus every byte sums to `0xff` modulo 256.

use crate::lexer::Cursor;
use crate::RecordError;
use serde::{Deserialize, Serialize};

/// Shortest line that can hold a data record.
const MIN_DATA_LINE: usize = 10;

/// Successfully classified record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// S0: resets the record counters.
    StartOfFile,
    /// S1/S2/S3: `len` bytes were written starting at `address`.
    Data { address: u64, len: usize },
    /// S5/S6: accepted and ignored.
    Count,
    /// S7/S8/S9: ends a load session.
    EndOfFile,
}

/// Good/bad record counters, reported to the operator only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    pub good: u32,
    pub bad: u32,
}

impl RecordStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Hex digits in the address field of a data record type.
fn address_digits(kind: u8) -> Option<usize> {
    match kind {
        b'1' => Some(4),
        b'2' => Some(6),
        b'3' => Some(8),
        _ => None,
    }
}

/// Decodes one record line (starting at the `S`), writing the data bytes of
/// a valid data record through `poke`.
///
/// Every call updates `stats`: data, count and end-of-file records count as
/// good, failures as bad. A start-of-file record clears both counters before
/// being counted.
pub fn decode<F>(line: &str, stats: &mut RecordStats, poke: F) -> Result<Record, RecordError>
where
    F: FnMut(u64, u8),
{
    let res = classify(line, stats, poke);
    match res {
        Ok(_) => stats.good = stats.good.wrapping_add(1),
        Err(_) => stats.bad = stats.bad.wrapping_add(1),
    }
    tracing::debug!(
        "S-record {:?}: good={} bad={}",
        res,
        stats.good,
        stats.bad
    );
    res
}

fn classify<F>(line: &str, stats: &mut RecordStats, poke: F) -> Result<Record, RecordError>
where
    F: FnMut(u64, u8),
{
    let kind = line.as_bytes().get(1).copied().unwrap_or(0);
    match kind {
        b'1' | b'2' | b'3' => {
            let digits = address_digits(kind).ok_or(RecordError::BadType)?;
            decode_data(line, digits, poke)
        }
        b'5' | b'6' => Ok(Record::Count),
        b'7' | b'8' | b'9' => Ok(Record::EndOfFile),
        b'0' => {
            stats.reset();
            Ok(Record::StartOfFile)
        }
        _ => Err(RecordError::BadType),
    }
}

fn decode_data<F>(line: &str, addr_digits: usize, mut poke: F) -> Result<Record, RecordError>
where
    F: FnMut(u64, u8),
{
    let len = line.len();
    let mut cur = Cursor::new(line);
    cur.advance(2);
    let count = cur.hex(2).unwrap_or(0) as usize;
    if len < MIN_DATA_LINE || count < 3 || len < 2 * count + 4 {
        return Err(RecordError::BadLength);
    }

    // The sum covers the count, the address, the data and the checksum byte.
    let mut ck = count as u64;
    let mut cur = Cursor::new(line);
    cur.advance(2);
    let _ = cur.hex(2);
    for _ in 0..count {
        if !cur.at_hex_pair() {
            return Err(RecordError::NonHex);
        }
        ck += cur.hex(2).unwrap_or(0);
    }
    if ck & 0xff != 0xff {
        return Err(RecordError::BadChecksum);
    }

    let mut cur = Cursor::new(line);
    cur.advance(4);
    let address = cur.hex(addr_digits).unwrap_or(0);
    let data_len = count.saturating_sub(1 + addr_digits / 2);
    let mut addr = address;
    for _ in 0..data_len {
        poke(addr, cur.hex(2).unwrap_or(0) as u8);
        addr = addr.wrapping_add(1);
    }

    Ok(Record::Data {
        address,
        len: data_len,
    })
}
