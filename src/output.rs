//! Output formatting for CLI commands.

use colored::Colorize;
use tabled::{Table, Tabled};

/// Print a table of items, or a placeholder when empty.
pub fn print_table<T: Tabled>(data: &[T], empty_message: &str) {
    if data.is_empty() {
        println!("{}", empty_message.dimmed());
    } else {
        let table = Table::new(data).to_string();
        println!("{}", table);
    }
}

/// Print a section header for a single resource.
pub fn print_header(title: &str) {
    println!("{} {}", "===".bold(), title.bold());
}

/// Print an ordered label/value record with aligned labels.
///
/// Values may span multiple lines; continuation lines are indented to the
/// value column.
pub fn print_record(record: &[(String, String)]) {
    let width = record.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

    for (label, value) in record {
        let mut lines = value.lines();
        let first = lines.next().unwrap_or("");
        println!("{:<width$}  {}", format!("{}:", label), first, width = width + 1);
        for line in lines {
            println!("{:<width$}  {}", "", line, width = width + 1);
        }
    }
}

/// Format a byte count the way the API's size fields are displayed.
///
/// Zero renders as `(empty)`; sub-kilobyte counts render as the raw number;
/// larger counts round to whole K/M/G.
pub fn format_bytes(amount: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = 1024 * KB;
    const GB: i64 = 1024 * MB;

    if amount == 0 {
        "(empty)".to_string()
    } else if amount < KB {
        amount.to_string()
    } else if amount < MB {
        format!("{}K", div_round(amount, KB))
    } else if amount < GB {
        format!("{}M", div_round(amount, MB))
    } else {
        format!("{}G", div_round(amount, GB))
    }
}

fn div_round(amount: i64, unit: i64) -> i64 {
    (amount + unit / 2) / unit
}

/// Format an API timestamp for display as `YYYY-MM-DD HH:MM TZ`.
///
/// Unparseable input is passed through unchanged rather than dropped.
pub fn format_date(value: &str) -> String {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
        return parsed.format("%Y-%m-%d %H:%M %z").to_string();
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return parsed.format("%Y-%m-%d %H:%M %z").to_string();
    }
    value.to_string()
}

/// Pluralize a counted noun: `quantify("table", 1)` is `"1 table"`,
/// `quantify("table", 3)` is `"3 tables"`.
pub fn quantify(word: &str, count: i64) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}
