// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use super::{Process, ProcessTable};

/// In-memory process table populated by hand.
#[derive(Debug, Clone, Default)]
pub struct FixtureTable {
    processes: Vec<Process>,
}

impl FixtureTable {
    pub fn new() -> Self {
        FixtureTable {
            processes: Vec::new(),
        }
    }

    pub fn insert(&mut self, process: Process) {
        self.processes.push(process);
    }

    pub fn process_mut(&mut self, pid: u32) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.pid() == pid)
    }
}

impl ProcessTable for FixtureTable {
    fn find(&self, pid: u32) -> Option<&Process> {
        self.processes.iter().find(|p| p.pid() == pid)
    }
}
