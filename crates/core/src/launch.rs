// MCMon - Multi-Core Debug Monitor
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Handing entry points from the control core to the worker cores.
//!
//! Each worker owns one slot. The control core is the only writer of a slot
//! and its worker the only reader; the worker clears the slot in the same
//! atomic operation that reads it, so every posted entry point is taken
//! exactly once.

use crate::LaunchError;
use mcmon_config::{MonitorConfig, MAX_CORES};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

const EMPTY: u64 = 0;

/// Per-core launch mailboxes. Core 0 is the control core and has no slot.
#[derive(Debug)]
pub struct LaunchSlots {
    cores: usize,
    slots: [AtomicU64; MAX_CORES],
}

impl LaunchSlots {
    /// `cores` counts every core including the control core.
    pub const fn new(cores: usize) -> Self {
        Self {
            cores: if cores > MAX_CORES { MAX_CORES } else { cores },
            slots: [const { AtomicU64::new(EMPTY) }; MAX_CORES],
        }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    fn slot(&self, core: usize) -> Result<&AtomicU64, LaunchError> {
        if core == 0 {
            return Err(LaunchError::ControlCore);
        }
        if core >= self.cores {
            return Err(LaunchError::NoSuchCore(core));
        }
        Ok(&self.slots[core])
    }

    /// Publishes `entry` for `core`. A launch still pending is replaced.
    pub fn post(&self, core: usize, entry: NonZeroU64) -> Result<(), LaunchError> {
        let slot = self.slot(core)?;
        slot.store(entry.get(), Ordering::Release);
        tracing::debug!("Posted entry {:#x} to core {}", entry.get(), core);
        Ok(())
    }

    /// Takes the pending entry point of `core`, leaving the slot empty.
    pub fn take(&self, core: usize) -> Result<Option<NonZeroU64>, LaunchError> {
        let slot = self.slot(core)?;
        Ok(NonZeroU64::new(slot.swap(EMPTY, Ordering::AcqRel)))
    }

    pub fn is_pending(&self, core: usize) -> bool {
        self.slot(core)
            .map(|s| s.load(Ordering::Acquire) != EMPTY)
            .unwrap_or(false)
    }
}

/// Calls program entry points. The callee receives the index of the core it
/// runs on and returns a status.
pub trait EntryPoints: Send + Sync {
    fn invoke(&self, entry: u64, core: usize) -> i32;
}

/// Jumps to entry points in the target's own address space.
#[derive(Debug)]
pub struct RawEntryPoints {
    _private: (),
}

impl RawEntryPoints {
    /// # Safety
    ///
    /// Every address later passed to `invoke` must be the start of a function
    /// with the signature `extern "C" fn(usize) -> i32`.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl EntryPoints for RawEntryPoints {
    fn invoke(&self, entry: u64, core: usize) -> i32 {
        // SAFETY: guaranteed by the contract of `RawEntryPoints::new`.
        let f: extern "C" fn(usize) -> i32 =
            unsafe { core::mem::transmute::<usize, extern "C" fn(usize) -> i32>(entry as usize) };
        f(core)
    }
}

type HostedEntry = Box<dyn Fn(usize) -> i32 + Send + Sync>;

/// Entry points backed by host closures, for running the monitor against
/// simulated memory.
#[derive(Default)]
pub struct EntryTable {
    entries: HashMap<u64, HostedEntry>,
}

impl fmt::Debug for EntryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut addrs: Vec<_> = self.entries.keys().collect();
        addrs.sort();
        f.debug_struct("EntryTable").field("entries", &addrs).finish()
    }
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        let mut table = Self::new();
        for stub in &config.entry_points {
            let status = stub.status;
            table.register(stub.address, move |core| {
                status.unwrap_or(core as i32)
            });
        }
        table
    }

    pub fn register<F>(&mut self, entry: u64, f: F)
    where
        F: Fn(usize) -> i32 + Send + Sync + 'static,
    {
        self.entries.insert(entry, Box::new(f));
    }
}

impl EntryPoints for EntryTable {
    fn invoke(&self, entry: u64, core: usize) -> i32 {
        match self.entries.get(&entry) {
            Some(f) => {
                tracing::debug!("Core {} calling entry {:#x}", core, entry);
                f(core)
            }
            None => {
                tracing::warn!("Core {}: no program at {:#x}", core, entry);
                -1
            }
        }
    }
}

/// The idle loop of one worker core.
pub struct Worker<'a, E: EntryPoints + ?Sized> {
    core: usize,
    slots: &'a LaunchSlots,
    entries: &'a E,
}

impl<'a, E: EntryPoints + ?Sized> Worker<'a, E> {
    pub fn new(core: usize, slots: &'a LaunchSlots, entries: &'a E) -> Self {
        Self {
            core,
            slots,
            entries,
        }
    }

    pub fn core(&self) -> usize {
        self.core
    }

    /// Checks the slot once. When a launch is pending it is consumed, the
    /// entry point runs to completion and its status is reported on `out`.
    pub fn poll_once<W: fmt::Write>(&self, out: &mut W) -> Option<i32> {
        let entry = self.slots.take(self.core).ok().flatten()?;
        let status = self.entries.invoke(entry.get(), self.core);
        let _ = writeln!(
            out,
            "Core {}: start function returned {}",
            self.core, status
        );
        Some(status)
    }

    /// Busy-waits for launches forever.
    pub fn run<W: fmt::Write>(&self, out: &mut W) -> ! {
        self.run_with(out, core::hint::spin_loop)
    }

    /// Like `run`, calling `relax` between empty polls.
    pub fn run_with<W: fmt::Write>(&self, out: &mut W, relax: impl Fn()) -> ! {
        loop {
            if self.poll_once(out).is_none() {
                relax();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn nz(v: u64) -> NonZeroU64 {
        NonZeroU64::new(v).unwrap()
    }

    #[test]
    fn test_post_then_take_exactly_once() {
        let slots = LaunchSlots::new(4);
        assert_eq!(slots.take(2), Ok(None));
        slots.post(2, nz(0x8000)).unwrap();
        assert!(slots.is_pending(2));
        assert!(!slots.is_pending(1));
        assert_eq!(slots.take(2), Ok(Some(nz(0x8000))));
        assert_eq!(slots.take(2), Ok(None));
        assert_eq!(slots.take(2), Ok(None));
    }

    #[test]
    fn test_repost_overwrites_pending() {
        let slots = LaunchSlots::new(2);
        slots.post(1, nz(0x1000)).unwrap();
        slots.post(1, nz(0x2000)).unwrap();
        assert_eq!(slots.take(1), Ok(Some(nz(0x2000))));
        assert_eq!(slots.take(1), Ok(None));
    }

    #[test]
    fn test_slots_are_independent() {
        let slots = LaunchSlots::new(4);
        slots.post(1, nz(0x10)).unwrap();
        slots.post(3, nz(0x30)).unwrap();
        assert_eq!(slots.take(3), Ok(Some(nz(0x30))));
        assert!(slots.is_pending(1));
        assert!(!slots.is_pending(2));
    }

    #[test]
    fn test_slot_index_checks() {
        let slots = LaunchSlots::new(4);
        assert_eq!(slots.post(0, nz(1)), Err(LaunchError::ControlCore));
        assert_eq!(slots.post(4, nz(1)), Err(LaunchError::NoSuchCore(4)));
        assert_eq!(slots.take(9), Err(LaunchError::NoSuchCore(9)));
        assert!(!slots.is_pending(0));
        assert_eq!(LaunchSlots::new(99).cores(), MAX_CORES);
    }

    #[test]
    fn test_worker_runs_entry_and_reports() {
        let slots = LaunchSlots::new(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = EntryTable::new();
        let seen = calls.clone();
        table.register(0x8000, move |core| {
            seen.fetch_add(1, Ordering::SeqCst);
            core as i32 * 10
        });

        let worker = Worker::new(3, &slots, &table);
        let mut out = String::new();
        assert_eq!(worker.poll_once(&mut out), None);

        slots.post(3, nz(0x8000)).unwrap();
        assert_eq!(worker.poll_once(&mut out), Some(30));
        assert_eq!(worker.poll_once(&mut out), None);
        assert_eq!(out, "Core 3: start function returned 30\n");

        // Relaunch after return
        slots.post(3, nz(0x8000)).unwrap();
        assert_eq!(worker.poll_once(&mut out), Some(30));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    extern "C" fn add_hundred(core: usize) -> i32 {
        core as i32 + 100
    }

    #[test]
    fn test_raw_entry_points_call_function_address() {
        let entry = add_hundred as usize as u64;
        // SAFETY: `entry` is the address of an `extern "C" fn(usize) -> i32`.
        let raw = unsafe { RawEntryPoints::new() };
        assert_eq!(raw.invoke(entry, 0), 100);

        let slots = LaunchSlots::new(3);
        slots.post(2, nz(entry)).unwrap();
        let worker = Worker::new(2, &slots, &raw);
        let mut out = String::new();
        assert_eq!(worker.poll_once(&mut out), Some(102));
        assert_eq!(out, "Core 2: start function returned 102\n");
    }

    #[test]
    fn test_unknown_hosted_entry_returns_error_status() {
        let table = EntryTable::new();
        assert_eq!(table.invoke(0x1234, 1), -1);
    }

    #[test]
    fn test_entry_table_from_config() {
        let mut config = MonitorConfig::default();
        config.entry_points = vec![
            mcmon_config::EntryPointStub {
                address: 0x100,
                status: Some(5),
            },
            mcmon_config::EntryPointStub {
                address: 0x200,
                status: None,
            },
        ];
        let table = EntryTable::from_config(&config);
        assert_eq!(table.invoke(0x100, 2), 5);
        assert_eq!(table.invoke(0x200, 2), 2);
    }

    #[test]
    fn test_worker_thread_picks_up_launch() {
        let slots = Arc::new(LaunchSlots::new(2));
        let mut table = EntryTable::new();
        table.register(0x4000, |core| core as i32 + 40);
        let table = Arc::new(table);

        let handle = {
            let slots = slots.clone();
            let table = table.clone();
            std::thread::spawn(move || {
                let worker = Worker::new(1, &slots, &*table);
                let mut out = String::new();
                loop {
                    if let Some(status) = worker.poll_once(&mut out) {
                        return (status, out);
                    }
                    std::thread::yield_now();
                }
            })
        };

        slots.post(1, nz(0x4000)).unwrap();
        let (status, out) = handle.join().unwrap();
        assert_eq!(status, 41);
        assert!(out.contains("Core 1"));
        assert!(!slots.is_pending(1));
    }
}
