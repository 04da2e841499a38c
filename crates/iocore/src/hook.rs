// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Userland event hook
//!
//! When `exec_path_on_error` is configured, device events spawn the
//! executable as `exec_path minor_id event`. Defined event: "overflow".
//! Spawn failures are logged, never propagated; the pipeline does not
//! depend on the hook.

use std::process::Command;
use walb_core::Tunables;

pub fn invoke_userland_exec(tunables: &Tunables, minor: u32, event: &str) {
    let Some(path) = &tunables.exec_path_on_error else {
        return;
    };
    match Command::new(path)
        .arg(minor.to_string())
        .arg(event)
        .spawn()
    {
        Ok(_child) => {
            tracing::info!(path = %path.display(), minor, event, "invoked userland hook");
        }
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                minor,
                event,
                error = %e,
                "failed to invoke userland hook"
            );
        }
    }
}
