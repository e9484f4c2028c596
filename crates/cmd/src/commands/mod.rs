// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod refresh;
pub mod stats;
pub mod touch;

pub use refresh::{refresh_command, refresh_command_as_string};
pub use stats::{stats_command, stats_command_as_string};
pub use touch::{StoreChange, touch_command, touch_command_as_string};

use anyhow::Result;
use std::io::Write;

/// Write command output to stdout
pub(crate) fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
