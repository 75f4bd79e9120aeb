// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use thiserror::Error;
use crate::host::paging::{Level, LeafEntry, MiddleEntry, TopEntry, TopTable, UpperEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslationFault {
    #[error("{0} level entry absent at {1:#x}")]
    Absent(Level, u64),
    #[error("{0} level entry malformed at {1:#x}")]
    Malformed(Level, u64),
    #[error("leaf entry unobtainable at {0:#x}")]
    Unobtainable(u64),
}

/// Walks the hierarchy top to leaf for the page containing `addr`.
/// Every level is checked explicitly, a bad intermediate entry must
/// not be dereferenced at the next level.
pub fn translate(tables: &TopTable, addr: u64) -> Result<&LeafEntry, TranslationFault> {
    let upper = match tables.entry(addr) {
        TopEntry::Absent => return Err(TranslationFault::Absent(Level::Top, addr)),
        TopEntry::Malformed => return Err(TranslationFault::Malformed(Level::Top, addr)),
        TopEntry::Table(table) => table,
    };
    let middle = match upper.entry(addr) {
        UpperEntry::Absent => return Err(TranslationFault::Absent(Level::Upper, addr)),
        UpperEntry::Malformed => return Err(TranslationFault::Malformed(Level::Upper, addr)),
        UpperEntry::Table(table) => table,
    };
    let leaf = match middle.entry(addr) {
        MiddleEntry::Absent => return Err(TranslationFault::Absent(Level::Middle, addr)),
        MiddleEntry::Malformed => return Err(TranslationFault::Malformed(Level::Middle, addr)),
        MiddleEntry::Table(table) => table,
    };
    leaf.entry(addr).ok_or(TranslationFault::Unobtainable(addr))
}
