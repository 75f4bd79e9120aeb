// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

fn main() -> anyhow::Result<()> {
    use std::{
        thread,
        time::Duration,
        sync::{
            Arc,
            atomic::{Ordering, AtomicBool},
        },
    };
    use wss_monitor::{
        host::{ProcSnapshot, process_cmdline},
        AppConfig, CancelStatus, Sampler, Scheduler,
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(config.interval > 0, "sampling interval must be positive");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))?;
    }

    match process_cmdline(config.pid) {
        Ok(cmdline) => log::info!("monitoring pid {} ({})", config.pid, cmdline),
        Err(error) => log::warn!("pid {} is not visible yet: {}", config.pid, error),
    }

    let sampler = Sampler::new(config.pid);
    let scheduler = Scheduler::start(config.period(), move || {
        let snapshot = ProcSnapshot::capture(sampler.pid());
        sampler.sample(&snapshot);
    });

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    if let CancelStatus::Busy = scheduler.cancel() {
        log::warn!("timer was still in use");
    }
    log::info!("sampling timer removed");

    Ok(())
}
