// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

pub mod paging;

mod fixture;
pub use self::fixture::FixtureTable;

mod procfs;
pub use self::procfs::{ProcSnapshot, process_cmdline};


use self::paging::{PageFlags, TopTable, PAGE_SIZE};

/// Contiguous page-aligned virtual range, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        debug_assert_eq!(start % PAGE_SIZE, 0);
        debug_assert_eq!(end % PAGE_SIZE, 0);
        Region { start, end }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn pages(&self) -> u64 {
        self.size() / PAGE_SIZE
    }
}

/// Ordered region list plus the root of the translation hierarchy.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    regions: Vec<Region>,
    tables: TopTable,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace {
            regions: Vec::new(),
            tables: TopTable::new(),
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn tables(&self) -> &TopTable {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut TopTable {
        &mut self.tables
    }

    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    /// Registers a region of `pages` pages at `start` and maps every
    /// page in it with the given flags.
    pub fn map_region(&mut self, start: u64, pages: u64, flags: PageFlags) -> Region {
        let region = Region::new(start, start + pages * PAGE_SIZE);
        self.regions.push(region);
        let mut addr = region.start;
        while addr < region.end {
            self.tables.map_page(addr, flags);
            addr += PAGE_SIZE;
        }
        region
    }
}

/// A process as the host exposes it. The address space is missing for
/// kernel-style helper tasks that own no user memory.
#[derive(Debug, Clone)]
pub struct Process {
    pid: u32,
    space: Option<AddressSpace>,
}

impl Process {
    pub fn new(pid: u32) -> Self {
        Process { pid, space: None }
    }

    pub fn with_space(pid: u32, space: AddressSpace) -> Self {
        Process {
            pid,
            space: Some(space),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn space(&self) -> Option<&AddressSpace> {
        self.space.as_ref()
    }

    pub fn space_mut(&mut self) -> Option<&mut AddressSpace> {
        self.space.as_mut()
    }
}

/// Read-only process lookup, a linear scan by pid.
pub trait ProcessTable {
    fn find(&self, pid: u32) -> Option<&Process>;
}
