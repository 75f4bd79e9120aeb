// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use crate::host::{
    paging::{Level, PageFlags, PAGE_SIZE},
    AddressSpace, FixtureTable, Process,
};
use super::{Sample, Sampler, WalkOutcome, REPORT_HEADER};

const BASE: u64 = 0x7f00_0000_0000;

fn accessed() -> PageFlags {
    PageFlags::PRESENT | PageFlags::ACCESSED
}

fn resident() -> PageFlags {
    PageFlags::PRESENT
}

fn table_with(pid: u32, space: AddressSpace) -> FixtureTable {
    let mut table = FixtureTable::new();
    table.insert(Process::with_space(pid, space));
    table
}

#[test]
fn empty_space_counts_zero() {
    let table = table_with(1, AddressSpace::new());
    assert_eq!(Sampler::new(1).sample(&table), WalkOutcome::Completed(0));
}

#[test]
fn missing_process_counts_zero() {
    let table = FixtureTable::new();
    assert_eq!(Sampler::new(7).sample(&table), WalkOutcome::Completed(0));
}

#[test]
fn process_without_address_space_counts_zero() {
    let mut table = FixtureTable::new();
    table.insert(Process::new(3));
    assert_eq!(Sampler::new(3).sample(&table), WalkOutcome::Completed(0));
}

#[test]
fn counts_every_accessed_page() {
    let mut space = AddressSpace::new();
    space.map_region(BASE, 16, accessed());
    let table = table_with(5, space);
    assert_eq!(
        Sampler::new(5).sample(&table),
        WalkOutcome::Completed(16 * PAGE_SIZE),
    );
}

#[test]
fn resident_pages_alone_count_nothing() {
    let mut space = AddressSpace::new();
    space.map_region(BASE, 8, resident());
    let table = table_with(5, space);
    assert_eq!(Sampler::new(5).sample(&table), WalkOutcome::Completed(0));
}

#[test]
fn total_does_not_depend_on_which_pages_are_accessed() {
    let pages = 64;
    let picked = 23;
    let mut totals = Vec::new();
    for _ in 0..2 {
        let mut space = AddressSpace::new();
        space.map_region(BASE, pages as u64, resident());
        for index in rand::seq::index::sample(&mut rand::thread_rng(), pages, picked) {
            assert!(space.tables_mut().mark_accessed(BASE + index as u64 * PAGE_SIZE));
        }
        totals.push(Sampler::new(9).sample(&table_with(9, space)));
    }
    assert_eq!(totals[0], WalkOutcome::Completed(picked as u64 * PAGE_SIZE));
    assert_eq!(totals[1], totals[0]);
}

#[test]
fn fault_mid_region_reports_the_partial_total() {
    let mut space = AddressSpace::new();
    space.map_region(BASE, 10, accessed());
    space.map_region(BASE + (1 << 21), 10, accessed());
    space.tables_mut().remove_leaf(BASE + 4 * PAGE_SIZE);
    let table = table_with(11, space);
    assert_eq!(
        Sampler::new(11).sample(&table),
        WalkOutcome::Aborted(4 * PAGE_SIZE),
    );
}

#[test]
fn fault_propagates_past_region_boundaries() {
    let mut space = AddressSpace::new();
    space.map_region(BASE, 10, accessed());
    let second = BASE + (1 << 21);
    space.map_region(second, 10, accessed());
    space.tables_mut().set_malformed(second, Level::Middle);
    let table = table_with(11, space);
    assert_eq!(
        Sampler::new(11).sample(&table),
        WalkOutcome::Aborted(10 * PAGE_SIZE),
    );
}

#[test]
fn malformed_entries_abort_at_every_level() {
    let spans = [
        (1u64 << 39, Level::Top),
        (1 << 30, Level::Upper),
        (1 << 21, Level::Middle),
    ];
    for &(span, level) in &spans {
        let boundary = 2 * span;
        let mut space = AddressSpace::new();
        space.map_region(boundary - PAGE_SIZE, 2, accessed());
        space.tables_mut().set_malformed(boundary, level);
        let table = table_with(13, space);
        assert_eq!(
            Sampler::new(13).sample(&table),
            WalkOutcome::Aborted(PAGE_SIZE),
            "{} level",
            level,
        );
    }
}

#[test]
fn absent_entries_abort_the_same_way() {
    let boundary = 4 * (1u64 << 21);
    let mut space = AddressSpace::new();
    space.map_region(boundary - PAGE_SIZE, 2, accessed());
    space.tables_mut().set_absent(boundary, Level::Middle);
    let table = table_with(17, space);
    let outcome = Sampler::new(17).sample(&table);
    assert!(outcome.aborted());
    assert_eq!(outcome.bytes(), PAGE_SIZE);
}

#[test]
fn repeated_samples_never_shrink() {
    let mut table = FixtureTable::new();
    let mut space = AddressSpace::new();
    space.map_region(BASE, 32, resident());
    for page in 0..8 {
        space.tables_mut().mark_accessed(BASE + page * PAGE_SIZE);
    }
    table.insert(Process::with_space(21, space));
    let sampler = Sampler::new(21);

    let first = sampler.sample(&table);
    assert_eq!(first, WalkOutcome::Completed(8 * PAGE_SIZE));
    assert_eq!(sampler.sample(&table), first);

    let space = table.process_mut(21).unwrap().space_mut().unwrap();
    for page in 8..13 {
        space.tables_mut().mark_accessed(BASE + page * PAGE_SIZE);
    }
    assert_eq!(sampler.sample(&table), WalkOutcome::Completed(13 * PAGE_SIZE));
}

#[test]
fn report_lines_pair_pid_with_kilobytes() {
    assert_eq!(REPORT_HEADER, "[PID] : [WSS]");
    assert_eq!(Sample::new(42, 8192).to_string(), "[42] : [8 kB]");
    assert_eq!(Sample::new(1, 0).to_string(), "[1] : [0 kB]");
    assert_eq!(Sample::new(1, 4096).to_string(), "[1] : [4 kB]");
}
