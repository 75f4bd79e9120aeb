// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use std::fmt;
use bitflags::bitflags;

/// Each table covers 512 slots, each slot a 9-bit slice of the address.
pub const TABLE_LEN: usize = 512;
pub const PAGE_SIZE: u64 = 0x1000;

fn top_index(addr: u64) -> usize {
    ((addr >> 39) & 0x1ff) as usize
}

fn upper_index(addr: u64) -> usize {
    ((addr >> 30) & 0x1ff) as usize
}

fn middle_index(addr: u64) -> usize {
    ((addr >> 21) & 0x1ff) as usize
}

fn leaf_index(addr: u64) -> usize {
    ((addr >> 12) & 0x1ff) as usize
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        const PRESENT  = 1 << 0;
        const WRITABLE = 1 << 1;
        const ACCESSED = 1 << 2;
        const DIRTY    = 1 << 3;
    }
}

/// Bottom of the hierarchy, describes a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    flags: PageFlags,
}

impl LeafEntry {
    pub fn new(flags: PageFlags) -> Self {
        LeafEntry { flags }
    }

    pub fn flags(&self) -> PageFlags {
        self.flags
    }

    pub fn accessed(&self) -> bool {
        self.flags.contains(PageFlags::ACCESSED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Top,
    Upper,
    Middle,
    Leaf,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Top => write!(f, "top"),
            Level::Upper => write!(f, "upper"),
            Level::Middle => write!(f, "middle"),
            Level::Leaf => write!(f, "leaf"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TopEntry {
    Absent,
    Malformed,
    Table(UpperTable),
}

#[derive(Debug, Clone)]
pub enum UpperEntry {
    Absent,
    Malformed,
    Table(MiddleTable),
}

#[derive(Debug, Clone)]
pub enum MiddleEntry {
    Absent,
    Malformed,
    Table(LeafTable),
}

/// Root of the four-level hierarchy. Hosts populate it through the
/// mutation api, the sampler only reads it.
#[derive(Debug, Clone)]
pub struct TopTable {
    slots: Vec<TopEntry>,
}

#[derive(Debug, Clone)]
pub struct UpperTable {
    slots: Vec<UpperEntry>,
}

#[derive(Debug, Clone)]
pub struct MiddleTable {
    slots: Vec<MiddleEntry>,
}

#[derive(Debug, Clone)]
pub struct LeafTable {
    slots: Vec<Option<LeafEntry>>,
}

impl TopTable {
    pub fn new() -> Self {
        TopTable {
            slots: (0..TABLE_LEN).map(|_| TopEntry::Absent).collect(),
        }
    }

    pub fn entry(&self, addr: u64) -> &TopEntry {
        &self.slots[top_index(addr)]
    }

    /// Installs a leaf entry for the page containing `addr`, creating
    /// intermediate tables on the way down as needed.
    pub fn map_page(&mut self, addr: u64, flags: PageFlags) {
        let leaf = self
            .ensure_upper(addr)
            .ensure_middle(addr)
            .ensure_leaf(addr);
        leaf.slots[leaf_index(addr)] = Some(LeafEntry::new(flags));
    }

    /// Sets the accessed flag on an already mapped page.
    /// Returns false if no leaf entry exists for `addr`.
    pub fn mark_accessed(&mut self, addr: u64) -> bool {
        let upper = match &mut self.slots[top_index(addr)] {
            TopEntry::Table(table) => table,
            _ => return false,
        };
        let middle = match &mut upper.slots[upper_index(addr)] {
            UpperEntry::Table(table) => table,
            _ => return false,
        };
        let leaf = match &mut middle.slots[middle_index(addr)] {
            MiddleEntry::Table(table) => table,
            _ => return false,
        };
        match &mut leaf.slots[leaf_index(addr)] {
            Some(entry) => {
                entry.flags |= PageFlags::ACCESSED;
                true
            },
            None => false,
        }
    }

    /// Replaces the entry covering `addr` at `level` with an absent one.
    /// At the leaf level this removes the slot.
    pub fn set_absent(&mut self, addr: u64, level: Level) {
        self.poison(addr, level, false)
    }

    /// Replaces the entry covering `addr` at `level` with a malformed
    /// one. At the leaf level this removes the slot.
    pub fn set_malformed(&mut self, addr: u64, level: Level) {
        self.poison(addr, level, true)
    }

    /// Drops the leaf entry for the page containing `addr`.
    pub fn remove_leaf(&mut self, addr: u64) {
        self.poison(addr, Level::Leaf, false)
    }

    fn poison(&mut self, addr: u64, level: Level, malformed: bool) {
        if let Level::Top = level {
            self.slots[top_index(addr)] = if malformed {
                TopEntry::Malformed
            } else {
                TopEntry::Absent
            };
            return;
        }
        let upper = self.ensure_upper(addr);
        if let Level::Upper = level {
            upper.slots[upper_index(addr)] = if malformed {
                UpperEntry::Malformed
            } else {
                UpperEntry::Absent
            };
            return;
        }
        let middle = upper.ensure_middle(addr);
        if let Level::Middle = level {
            middle.slots[middle_index(addr)] = if malformed {
                MiddleEntry::Malformed
            } else {
                MiddleEntry::Absent
            };
            return;
        }
        let leaf = middle.ensure_leaf(addr);
        leaf.slots[leaf_index(addr)] = None;
    }

    fn ensure_upper(&mut self, addr: u64) -> &mut UpperTable {
        let index = top_index(addr);
        if !matches!(self.slots[index], TopEntry::Table(_)) {
            self.slots[index] = TopEntry::Table(UpperTable::new());
        }
        match &mut self.slots[index] {
            TopEntry::Table(table) => table,
            _ => unreachable!(),
        }
    }
}

impl UpperTable {
    pub fn new() -> Self {
        UpperTable {
            slots: (0..TABLE_LEN).map(|_| UpperEntry::Absent).collect(),
        }
    }

    pub fn entry(&self, addr: u64) -> &UpperEntry {
        &self.slots[upper_index(addr)]
    }

    fn ensure_middle(&mut self, addr: u64) -> &mut MiddleTable {
        let index = upper_index(addr);
        if !matches!(self.slots[index], UpperEntry::Table(_)) {
            self.slots[index] = UpperEntry::Table(MiddleTable::new());
        }
        match &mut self.slots[index] {
            UpperEntry::Table(table) => table,
            _ => unreachable!(),
        }
    }
}

impl MiddleTable {
    pub fn new() -> Self {
        MiddleTable {
            slots: (0..TABLE_LEN).map(|_| MiddleEntry::Absent).collect(),
        }
    }

    pub fn entry(&self, addr: u64) -> &MiddleEntry {
        &self.slots[middle_index(addr)]
    }

    fn ensure_leaf(&mut self, addr: u64) -> &mut LeafTable {
        let index = middle_index(addr);
        if !matches!(self.slots[index], MiddleEntry::Table(_)) {
            self.slots[index] = MiddleEntry::Table(LeafTable::new());
        }
        match &mut self.slots[index] {
            MiddleEntry::Table(table) => table,
            _ => unreachable!(),
        }
    }
}

impl LeafTable {
    pub fn new() -> Self {
        LeafTable {
            slots: (0..TABLE_LEN).map(|_| None).collect(),
        }
    }

    pub fn entry(&self, addr: u64) -> Option<&LeafEntry> {
        self.slots[leaf_index(addr)].as_ref()
    }
}
