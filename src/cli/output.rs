//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::AuditEntry;
use crate::identity::{Group, User};
use crate::vault::{Folder, SecretSummary, Share, ShareTarget};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Print a table of secret summaries.
pub fn print_secrets_table(secrets: &[SecretSummary]) {
    if secrets.is_empty() {
        info("No secrets found.");
        tip("Run `keyvault add --name <NAME>` to add your first secret.");
        return;
    }

    let mut table = new_table(vec![
        "ID", "Name", "Category", "Username", "Domain", "Tags", "Updated",
    ]);
    for s in secrets {
        let mut name = s.name.clone();
        if s.is_favorite {
            name = format!("\u{2605} {name}");
        }
        if s.shared {
            name = format!("{name} {}", style("(shared)").dim());
        }
        table.add_row(vec![
            s.id.to_string(),
            name,
            s.category.to_string(),
            s.username.display_text().to_string(),
            or_dash(s.url_domain.as_deref()),
            s.tags.join(", "),
            format_time(s.updated_at.unwrap_or(s.created_at)),
        ]);
    }
    println!("{table}");
}

pub fn print_users_table(users: &[User], groups: &[Group]) {
    let mut table = new_table(vec!["ID", "Username", "Name", "Role", "Groups", "Last login"]);
    for user in users {
        let names: Vec<&str> = groups
            .iter()
            .filter(|g| user.in_group(g.id))
            .map(|g| g.name.as_str())
            .collect();
        table.add_row(vec![
            user.id.to_string(),
            user.username.clone(),
            user.full_name.clone(),
            user.role.to_string(),
            names.join(", "),
            user.last_login_at.map(format_time).unwrap_or_else(|| "-".into()),
        ]);
    }
    println!("{table}");
}

pub fn print_groups_table(groups: &[Group]) {
    if groups.is_empty() {
        info("No groups yet.");
        return;
    }
    let mut table = new_table(vec!["ID", "Name", "Description"]);
    for group in groups {
        table.add_row(vec![
            group.id.to_string(),
            group.name.clone(),
            or_dash(group.description.as_deref()),
        ]);
    }
    println!("{table}");
}

pub fn print_folders_table(folders: &[Folder]) {
    if folders.is_empty() {
        info("No folders yet.");
        return;
    }
    let mut table = new_table(vec!["ID", "Name", "Parent", "Created"]);
    for folder in folders {
        table.add_row(vec![
            folder.id.to_string(),
            folder.name.clone(),
            folder
                .parent_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".into()),
            format_time(folder.created_at),
        ]);
    }
    println!("{table}");
}

/// Print the shares on a secret, resolving targets to names.
pub fn print_shares_table(shares: &[Share], users: &[User], groups: &[Group]) {
    if shares.is_empty() {
        info("This secret is not shared.");
        return;
    }
    let now = Utc::now();
    let mut table = new_table(vec!["ID", "Target", "Permission", "Expires", "Status"]);
    for share in shares {
        let target = match share.target {
            ShareTarget::User(id) => users
                .iter()
                .find(|u| u.id == id)
                .map(|u| format!("user {}", u.username))
                .unwrap_or_else(|| format!("user #{id}")),
            ShareTarget::Group(id) => groups
                .iter()
                .find(|g| g.id == id)
                .map(|g| format!("group {}", g.name))
                .unwrap_or_else(|| format!("group #{id}")),
        };
        let status = if share.is_active(now) {
            style("active").green().to_string()
        } else {
            style("expired").red().to_string()
        };
        table.add_row(vec![
            share.id.to_string(),
            target,
            share.permission.to_string(),
            share.expires_at.map(format_time).unwrap_or_else(|| "never".into()),
            status,
        ]);
    }
    println!("{table}");
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    let mut table = new_table(vec!["Time", "Actor", "Action", "Resource", "Details", "Origin"]);

    for entry in entries {
        let resource = match (&entry.resource_type, entry.resource_id) {
            (Some(kind), Some(id)) => match &entry.resource_name {
                Some(name) => format!("{kind} {id} ({name})"),
                None => format!("{kind} {id}"),
            },
            _ => "-".to_string(),
        };
        let action = if entry.success {
            colorize_action(&entry.action)
        } else {
            format!("{} {}", colorize_action(&entry.action), style("[failed]").red())
        };
        table.add_row(vec![
            format_time(entry.created_at),
            entry.actor_name.clone(),
            action,
            resource,
            or_dash(entry.details.as_deref()),
            or_dash(entry.origin.as_deref()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize action names for display.
fn colorize_action(action: &str) -> String {
    match action {
        "secret_created" | "user_created" | "group_created" | "folder_created" => {
            style(action).green().to_string()
        }
        "secret_updated" | "role_changed" => style(action).blue().to_string(),
        "secret_deleted" | "folder_deleted" | "secret_unshared" => {
            style(action).red().to_string()
        }
        "secret_viewed" | "password_copied" => style(action).yellow().to_string(),
        "secrets_exported" | "secrets_imported" => style(action).cyan().to_string(),
        "secret_shared" | "group_member_added" | "group_member_removed" => {
            style(action).magenta().to_string()
        }
        _ => action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorize_action_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(colorize_action("secret_viewed"), "secret_viewed");
        assert_eq!(colorize_action("something_else"), "something_else");
    }

    #[test]
    fn format_time_is_second_precision() {
        let at = DateTime::parse_from_rfc3339("2030-05-06T07:08:09.123Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_time(at), "2030-05-06 07:08:09");
    }
}
