// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use std::fmt;
use crate::host::{paging::PAGE_SIZE, ProcessTable};

mod walk;
pub use self::walk::{translate, TranslationFault};

#[cfg(test)]
mod tests;

/// Header line printed before every measurement.
pub const REPORT_HEADER: &str = "[PID] : [WSS]";

/// One measurement: a pid paired with a byte total. Displayed in
/// kilobytes, produced and reported, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pid: u32,
    bytes: u64,
}

impl Sample {
    pub fn new(pid: u32, bytes: u64) -> Self {
        Sample { pid, bytes }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] : [{} kB]", self.pid, self.bytes / 1024)
    }
}

/// How a walk over the address space ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every page of every region was examined.
    Completed(u64),
    /// A translation fault stopped the walk, the total covers only
    /// the pages examined strictly before the faulting address.
    Aborted(u64),
}

impl WalkOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            WalkOutcome::Completed(bytes) | WalkOutcome::Aborted(bytes) => *bytes,
        }
    }

    pub fn aborted(&self) -> bool {
        matches!(self, WalkOutcome::Aborted(_))
    }
}

/// Measures the working set size of a single process: the sum of page
/// sizes of every mapped page with the accessed flag set. The flag is
/// only read, never cleared, so successive totals are cumulative.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    pid: u32,
}

impl Sampler {
    pub fn new(pid: u32) -> Self {
        Sampler { pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Walks every region of the process page by page and reports the
    /// total. A missing process or address space counts as zero. The
    /// report is emitted even when the walk aborts, with whatever
    /// total was accumulated by then.
    pub fn sample<T>(&self, table: &T) -> WalkOutcome
    where
        T: ProcessTable,
    {
        let outcome = self.walk(table);
        log::info!("{}", REPORT_HEADER);
        log::info!("{}", Sample::new(self.pid, outcome.bytes()));
        outcome
    }

    fn walk<T>(&self, table: &T) -> WalkOutcome
    where
        T: ProcessTable,
    {
        let space = match table.find(self.pid).and_then(|process| process.space()) {
            Some(space) => space,
            None => return WalkOutcome::Completed(0),
        };

        let mut total = 0;
        for region in space.regions() {
            let mut addr = region.start;
            while addr < region.end {
                match translate(space.tables(), addr) {
                    Ok(leaf) => {
                        if leaf.accessed() {
                            total += PAGE_SIZE;
                        }
                    },
                    Err(fault) => {
                        log::debug!("sample of pid {} truncated: {}", self.pid, fault);
                        return WalkOutcome::Aborted(total);
                    },
                }
                addr += PAGE_SIZE;
            }
        }
        WalkOutcome::Completed(total)
    }
}
