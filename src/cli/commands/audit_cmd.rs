//! `keyvault audit`: display the audit log (admin only).
//!
//! Usage:
//!   keyvault audit                          # last 50 entries
//!   keyvault audit --last 20                # last 20
//!   keyvault audit --since 7d               # entries from the last 7 days
//!   keyvault audit --action secret_viewed   # one kind of event

use chrono::{DateTime, Utc};

use crate::audit::AuditQuery;
use crate::cli::output;
use crate::cli::{open_as_caller, parse_duration, Cli};
use crate::errors::{VaultError, Result};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>, action: Option<&str>) -> Result<()> {
    let query = AuditQuery {
        limit: Some(last),
        since: since.map(since_cutoff).transpose()?,
        action: action.map(str::to_string),
        ..AuditQuery::default()
    };

    let (service, caller) = open_as_caller(cli)?;
    let entries = service.audit_log(&caller, &query)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    output::print_audit_table(&entries);
    Ok(())
}

/// Turn "7d", "24h" or "30m" into the instant that long ago.
fn since_cutoff(input: &str) -> Result<DateTime<Utc>> {
    let duration = parse_duration(input).ok_or_else(|| {
        VaultError::CommandFailed(format!(
            "invalid duration '{input}': use a format like 7d, 24h, or 30m"
        ))
    })?;
    Ok(Utc::now() - duration)
}
