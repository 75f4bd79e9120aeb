// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    str::FromStr,
    sync::Once,
};
use byteorder::{ByteOrder, LittleEndian};
use super::{
    paging::{Level, PageFlags, TopTable, PAGE_SIZE},
    AddressSpace, Process, ProcessTable, Region,
};

// the kernel half of the 64-bit address space starts here
const USERSPACE_END: u64 = 0xffff_8000_0000_0000;

// /proc/<pid>/pagemap, one 64-bit word per page
const PM_PRESENT: u64 = 1 << 63;
const PM_SWAPPED: u64 = 1 << 62;
const PM_PFN_MASK: u64 = 0x007f_ffff_ffff_ffff;
const PAGEMAP_ENTRY_BYTES: u64 = 8;
const CHUNK_PAGES: usize = 512;

// /proc/kpageflags, one 64-bit word per page frame
const KPAGEFLAGS_PATH: &str = "/proc/kpageflags";
const KPF_REFERENCED: u64 = 1 << 2;
const KPF_DIRTY: u64 = 1 << 4;

/// One process captured from procfs at a single point in time.
///
/// The capture is a snapshot: the sampler walks it without touching
/// procfs again, so a process exiting mid-sample can only be seen as
/// a malformed entry recorded at capture time.
#[derive(Debug)]
pub struct ProcSnapshot {
    processes: Vec<Process>,
}

impl ProcSnapshot {
    /// Reads the memory layout of `pid`. A process that cannot be read
    /// at all yields an empty snapshot, which samples as zero.
    pub fn capture(pid: u32) -> Self {
        let mut processes = Vec::new();
        match capture_process(pid) {
            Ok(process) => processes.push(process),
            Err(error) => log::debug!("cannot capture pid {}: {}", pid, error),
        }
        ProcSnapshot { processes }
    }
}

impl ProcessTable for ProcSnapshot {
    fn find(&self, pid: u32) -> Option<&Process> {
        self.processes.iter().find(|p| p.pid() == pid)
    }
}

/// Command line of the process as procfs records it.
pub fn process_cmdline(pid: u32) -> io::Result<String> {
    let mut raw = String::new();
    File::open(format!("/proc/{}/cmdline", pid))?.read_to_string(&mut raw)?;
    Ok(raw.replace('\0', " ").trim().to_string())
}

fn capture_process(pid: u32) -> io::Result<Process> {
    let entries = parse_maps(pid)?;

    let mut space = AddressSpace::new();
    for entry in &entries {
        space.add_region(entry.region);
    }

    let mut pagemap = match File::open(format!("/proc/{}/pagemap", pid)) {
        Ok(file) => file,
        Err(error) => {
            // the regions are known but none of them can be walked
            log::debug!("cannot open pagemap of pid {}: {}", pid, error);
            if let Some(first) = entries.first() {
                space
                    .tables_mut()
                    .set_malformed(first.region.start, Level::Middle);
            }
            return Ok(Process::with_space(pid, space));
        },
    };
    let mut kpageflags = open_kpageflags();

    let mut stats = CaptureStats::default();
    for entry in &entries {
        let populated = populate_region(
            space.tables_mut(),
            &mut pagemap,
            &mut kpageflags,
            entry,
            &mut stats,
        );
        if let Err(error) = populated {
            log::debug!(
                "pagemap of pid {} unreadable at {:#x}: {}",
                pid,
                entry.region.start,
                error,
            );
            space
                .tables_mut()
                .set_malformed(entry.region.start, Level::Middle);
            break;
        }
    }
    log::debug!(
        "captured pid {}: {} pages, {} present, {} swapped",
        pid,
        stats.pages,
        stats.present,
        stats.swapped,
    );

    Ok(Process::with_space(pid, space))
}

fn parse_maps(pid: u32) -> io::Result<Vec<MapsEntry>> {
    let mut content = String::new();
    File::open(format!("/proc/{}/maps", pid))?.read_to_string(&mut content)?;

    let mut entries = Vec::new();
    for line in content.lines() {
        match line.parse::<MapsEntry>() {
            Ok(entry) => {
                if entry.region.start < USERSPACE_END {
                    entries.push(entry);
                }
            },
            Err(error) => log::warn!("skipping maps line {:?}: {}", line, error),
        }
    }
    Ok(entries)
}

fn populate_region(
    tables: &mut TopTable,
    pagemap: &mut File,
    kpageflags: &mut Option<File>,
    entry: &MapsEntry,
    stats: &mut CaptureStats,
) -> io::Result<()> {
    let region = entry.region;
    let writable = entry.writable();
    pagemap.seek(SeekFrom::Start(
        (region.start / PAGE_SIZE) * PAGEMAP_ENTRY_BYTES,
    ))?;

    let mut buf = [0u8; CHUNK_PAGES * 8];
    let mut addr = region.start;
    while addr < region.end {
        let pages = (((region.end - addr) / PAGE_SIZE) as usize).min(CHUNK_PAGES);
        let chunk = &mut buf[..pages * 8];
        pagemap.read_exact(chunk)?;
        for i in 0..pages {
            let word = LittleEndian::read_u64(&chunk[i * 8..(i + 1) * 8]);
            stats.pages += 1;
            let mut kflags = 0;
            if word & PM_PRESENT != 0 {
                stats.present += 1;
                kflags = read_kpageflags(kpageflags, word & PM_PFN_MASK);
            } else if word & PM_SWAPPED != 0 {
                stats.swapped += 1;
            }
            // a page that is not resident still gets a leaf entry,
            // otherwise the walk would abort on it
            tables.map_page(addr, leaf_flags(word, kflags, writable));
            addr += PAGE_SIZE;
        }
    }
    Ok(())
}

fn read_kpageflags(kpageflags: &mut Option<File>, pfn: u64) -> u64 {
    static WARN: Once = Once::new();
    if pfn == 0 {
        WARN.call_once(|| {
            log::warn!("page frame numbers are hidden, run as root to see accessed flags");
        });
        return 0;
    }
    let file = match kpageflags {
        Some(file) => file,
        None => return 0,
    };
    let mut buf = [0u8; 8];
    let read = file
        .seek(SeekFrom::Start(pfn * PAGEMAP_ENTRY_BYTES))
        .and_then(|_| file.read_exact(&mut buf));
    match read {
        Ok(()) => LittleEndian::read_u64(&buf),
        Err(error) => {
            log::debug!("cannot read kpageflags of pfn {:#x}: {}", pfn, error);
            0
        },
    }
}

fn open_kpageflags() -> Option<File> {
    static WARN: Once = Once::new();
    match File::open(KPAGEFLAGS_PATH) {
        Ok(file) => Some(file),
        Err(error) => {
            WARN.call_once(|| {
                log::warn!(
                    "cannot open {}: {}, accessed flags will be empty",
                    KPAGEFLAGS_PATH,
                    error,
                );
            });
            None
        },
    }
}

fn leaf_flags(word: u64, kflags: u64, writable: bool) -> PageFlags {
    let mut flags = PageFlags::empty();
    if word & PM_PRESENT != 0 {
        flags |= PageFlags::PRESENT;
        if writable {
            flags |= PageFlags::WRITABLE;
        }
        if kflags & KPF_REFERENCED != 0 {
            flags |= PageFlags::ACCESSED;
        }
        if kflags & KPF_DIRTY != 0 {
            flags |= PageFlags::DIRTY;
        }
    }
    flags
}

#[derive(Debug, Default)]
struct CaptureStats {
    pages: u64,
    present: u64,
    swapped: u64,
}

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone)]
struct MapsEntry {
    region: Region,
    perms: String,
}

impl MapsEntry {
    fn writable(&self) -> bool {
        self.perms.contains('w')
    }
}

impl FromStr for MapsEntry {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut columns = s.split_ascii_whitespace();

        let range_str = columns.next().ok_or(io::ErrorKind::InvalidData)?;
        let mut range_items = range_str.split('-');
        let start = range_items.next().ok_or(io::ErrorKind::InvalidData)?;
        let end = range_items.next().ok_or(io::ErrorKind::InvalidData)?;
        let start = u64::from_str_radix(start, 16).map_err(|_| io::ErrorKind::InvalidData)?;
        let end = u64::from_str_radix(end, 16).map_err(|_| io::ErrorKind::InvalidData)?;
        if end < start || start % PAGE_SIZE != 0 || end % PAGE_SIZE != 0 {
            return Err(io::ErrorKind::InvalidData.into());
        }

        let perms = columns.next().ok_or(io::ErrorKind::InvalidData)?.to_string();

        Ok(MapsEntry {
            region: Region::new(start, end),
            perms,
        })
    }
}
