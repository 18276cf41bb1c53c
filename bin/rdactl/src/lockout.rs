//! ---
//! rda_section: "05-networking-external-interfaces"
//! rda_subsection: "binary"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Control CLI for administrators managing dashboard access."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use clap::Args;
use rda_api::Runtime;
use rda_security::{LockoutOutcome, LockoutRequest};
use tracing::debug;

use crate::GlobalOptions;

/// Arguments for an offline lockout check.
#[derive(Debug, Args)]
pub struct CheckLockoutArgs {
    /// Configured operator to check.
    #[arg(long)]
    pub operator: String,
    /// Capability about to be selected. Defaults to the effective capability.
    #[arg(long)]
    pub cap: Option<String>,
    /// Switch value giving the warning its context. Defaults to the stored switch.
    #[arg(long)]
    pub switch: Option<String>,
}

pub fn run(args: CheckLockoutArgs, global: &GlobalOptions) -> Result<()> {
    let config = global.load_config()?;
    let runtime = Runtime::from_config(&config)?;
    let operator = runtime
        .operators
        .get(&args.operator)
        .ok_or_else(|| anyhow!("unknown operator '{}'", args.operator))?;

    let snapshot = runtime.resolver.snapshot();
    let request = LockoutRequest {
        cap: Some(args.cap.unwrap_or_else(|| runtime.resolver.capability())),
        switch: Some(args.switch.unwrap_or_else(|| snapshot.access_switch.clone())),
        nonce: Some(runtime.guard.issue_token(operator)),
    };
    debug!(operator = %operator.id, cap = ?request.cap, switch = ?request.switch, "running lockout check");

    match runtime.guard.check(&request, operator)? {
        LockoutOutcome::Allowed => println!("OK: '{}' holds the capability", operator.id),
        LockoutOutcome::Warning(warning) => {
            println!("{}", warning.message_with(|cap| format!("'{cap}'")));
            std::process::exit(2);
        }
    }
    Ok(())
}
