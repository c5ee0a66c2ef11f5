//! App info aggregation: turn a raw attribute bag into display lines.

use std::fmt::Write as _;

use crate::client::AppAttributes;
use crate::output::{format_bytes, format_date, quantify};

/// Current-generation stack. Legacy dyno/worker counts only apply to apps
/// on older stacks.
const CURRENT_STACK: &str = "cedar";

/// Render the attribute bag as sorted `key=value` lines.
///
/// Every key the server sent appears exactly once. The addon and
/// collaborator lists are flattened to sorted comma-joined names/emails;
/// all other values are rendered as-is.
pub fn raw_lines(attrs: &AppAttributes) -> Vec<String> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    pairs.push(("name".to_string(), attrs.name.clone()));
    pairs.push(("owner".to_string(), attrs.owner.clone()));
    pairs.push(("stack".to_string(), attrs.stack.clone()));

    let mut addon_names: Vec<&str> = attrs.addons.iter().map(|a| a.name.as_str()).collect();
    addon_names.sort_unstable();
    pairs.push(("addons".to_string(), addon_names.join(",")));

    let mut emails: Vec<&str> = attrs
        .collaborators
        .iter()
        .map(|c| c.email.as_str())
        .collect();
    emails.sort_unstable();
    pairs.push(("collaborators".to_string(), emails.join(",")));

    let optional_strings = [
        ("domain_name", &attrs.domain_name),
        ("create_status", &attrs.create_status),
        ("web_url", &attrs.web_url),
        ("git_url", &attrs.git_url),
        ("cron_finished_at", &attrs.cron_finished_at),
        ("cron_next_run", &attrs.cron_next_run),
    ];
    for (key, value) in optional_strings {
        if let Some(value) = value {
            pairs.push((key.to_string(), value.clone()));
        }
    }

    let optional_counts = [
        ("repo_size", attrs.repo_size),
        ("slug_size", attrs.slug_size),
        ("database_size", attrs.database_size),
        ("database_tables", attrs.database_tables),
        ("dynos", attrs.dynos),
        ("workers", attrs.workers),
    ];
    for (key, value) in optional_counts {
        if let Some(value) = value {
            pairs.push((key.to_string(), value.to_string()));
        }
    }

    if let Some(hours) = &attrs.dyno_hours {
        let rendered: Vec<String> = hours
            .iter()
            .map(|(kind, value)| format!("{}:{}", kind, value))
            .collect();
        pairs.push(("dyno_hours".to_string(), rendered.join(",")));
    }

    for (key, value) in &attrs.extra {
        pairs.push((key.clone(), render_json(value)));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

fn render_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the formatted display record for an app.
///
/// Rules apply in a fixed order; later rules extend values produced by
/// earlier ones (the table count suffix on the database size), so the order
/// here is not cosmetic.
pub fn display_record(attrs: &AppAttributes) -> Vec<(String, String)> {
    let mut record: Vec<(String, String)> = Vec::new();

    if let Some(domain) = &attrs.domain_name {
        record.push(("Domain Name".to_string(), domain.clone()));
    }
    record.push(("Owner".to_string(), attrs.owner.clone()));
    record.push(("Stack".to_string(), attrs.stack.clone()));

    let mut descriptions: Vec<&str> = attrs
        .addons
        .iter()
        .map(|a| a.description.as_str())
        .collect();
    descriptions.sort_unstable();
    if !descriptions.is_empty() {
        record.push(("Addons".to_string(), descriptions.join("\n")));
    }

    let collaborators: Vec<&str> = attrs
        .collaborators
        .iter()
        .map(|c| c.email.as_str())
        .filter(|email| *email != attrs.owner)
        .collect();
    if !collaborators.is_empty() {
        record.push(("Collaborators".to_string(), collaborators.join("\n")));
    }

    if let Some(status) = &attrs.create_status {
        if status != "complete" {
            record.push(("Create Status".to_string(), status.clone()));
        }
    }

    if let Some(value) = &attrs.cron_finished_at {
        record.push(("Cron Finished At".to_string(), format_date(value)));
    }
    if let Some(value) = &attrs.cron_next_run {
        record.push(("Cron Next Run".to_string(), format_date(value)));
    }

    if let Some(size) = attrs.database_size {
        record.push(("Database Size".to_string(), format_bytes(size)));
    }
    if let Some(size) = attrs.repo_size {
        record.push(("Repo Size".to_string(), format_bytes(size)));
    }
    if let Some(size) = attrs.slug_size {
        record.push(("Slug Size".to_string(), format_bytes(size)));
    }

    if let Some(url) = &attrs.git_url {
        record.push(("Git URL".to_string(), url.clone()));
    }
    if let Some(url) = &attrs.web_url {
        record.push(("Web URL".to_string(), url.clone()));
    }

    // Legacy stacks run fixed dyno/worker counts; the current stack does not.
    if attrs.stack != CURRENT_STACK {
        if let Some(dynos) = attrs.dynos {
            record.push(("Dynos".to_string(), dynos.to_string()));
        }
        if let Some(workers) = attrs.workers {
            record.push(("Workers".to_string(), workers.to_string()));
        }
    }

    if let Some(tables) = attrs.database_tables {
        if let Some(entry) = record.iter_mut().find(|(label, _)| label == "Database Size") {
            // An empty database still has its schema tables.
            if entry.1 == "(empty)" {
                entry.1 = "0K".to_string();
            }
            let _ = write!(entry.1, " in {}", quantify("table", tables));
        }
    }

    if let Some(hours) = &attrs.dyno_hours {
        let lines: Vec<String> = hours
            .iter()
            .map(|(kind, value)| format!("{} - {:.2} dyno-hours", capitalize(kind), value))
            .collect();
        if !lines.is_empty() {
            record.push(("Dyno Hours".to_string(), lines.join("\n")));
        }
    }

    record
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
