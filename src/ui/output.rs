use crate::ui::{theme, Icons};
use crate::Value;
use owo_colors::OwoColorize;

pub fn header(icon: &str, text: &str) {
    println!("{} {}", icon, text.style(theme().header));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info),
        label.style(theme().dim),
        value
    );
}

pub fn address(text: &str) -> String {
    text.style(theme().address).to_string()
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim).to_string()
}

/// Render one cell of a query result
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".style(theme().null).to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
