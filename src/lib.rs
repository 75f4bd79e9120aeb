// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]

pub mod host;

mod sampler;
pub use self::sampler::{Sampler, Sample, WalkOutcome, TranslationFault, translate, REPORT_HEADER};

mod scheduler;
pub use self::scheduler::{Scheduler, CancelStatus};

mod configuration;
pub use self::configuration::AppConfig;
