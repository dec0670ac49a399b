use colored::*;
use tabled::{Table, Tabled};

pub fn print_success(message: &str, color: bool) {
    if color {
        println!("{} {}", "✓".green().bold(), message);
    } else {
        println!("✓ {}", message);
    }
}

pub fn print_warning(message: &str, color: bool) {
    if color {
        println!("{} {}", "⚠️".yellow().bold(), message);
    } else {
        println!("⚠️ {}", message);
    }
}

pub fn print_error(message: &str, color: bool) {
    if color {
        eprintln!("{} {}", "✗".red().bold(), message);
    } else {
        eprintln!("✗ {}", message);
    }
}

pub fn print_info(message: &str, color: bool) {
    if color {
        println!("{} {}", "ℹ".blue().bold(), message);
    } else {
        println!("ℹ {}", message);
    }
}

pub fn format_table<T: Tabled>(data: Vec<T>, _color: bool) -> String {
    let table = Table::new(data);
    table.to_string()
}

/// Render a mismatch tally for the end-of-run summary.
pub fn format_mismatches(count: usize, color: bool) -> String {
    let text = match count {
        0 => "all sensor echoes matched".to_string(),
        1 => "1 sensor echo mismatch".to_string(),
        n => format!("{n} sensor echo mismatches"),
    };

    if !color {
        return text;
    }

    if count == 0 {
        text.green().to_string()
    } else {
        text.yellow().to_string()
    }
}
