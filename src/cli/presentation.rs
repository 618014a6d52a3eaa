//! CLI presentation: text and json formatters per command family.

use crate::error::StackError;
use crate::identity::StackIdentity;
use crate::workflow::{BuildReport, TeardownReport};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// One stack as listed by `list` and `show`
#[derive(Debug, Clone, Serialize)]
pub struct StackSummary {
    pub kind: String,
    pub stack_name: String,
    pub owner: String,
    pub logical_name: String,
    pub serial: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

impl StackSummary {
    pub fn new(identity: &StackIdentity, commands: Vec<String>) -> Self {
        Self {
            kind: identity.kind.to_string(),
            stack_name: identity.stack_name.clone(),
            owner: identity.owner.clone(),
            logical_name: identity.logical_name.clone(),
            serial: identity.serial.to_string(),
            created_at: identity.created_at.to_rfc3339(),
            commands,
        }
    }
}

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn rule(width: usize) -> String {
    "=".repeat(width)
}

pub fn format_build_report(report: &BuildReport) -> String {
    let identity = &report.identity;
    let mut out = String::new();
    out.push_str(&format!("{}\n", rule(80)));
    out.push_str(&format!(
        "Finished creating {} stack {}\n",
        identity.kind,
        identity.stack_name.green()
    ));
    out.push_str(&format!("  Serial:   {}\n", identity.serial));
    out.push_str(&format!("  Document: {}\n", report.vars_file.display()));
    if let Some(uri) = &report.archived {
        out.push_str(&format!("  Record:   {}\n", uri));
    }
    if !report.created.is_empty() || !report.found.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Resource", "Outcome"]);
        for name in &report.created {
            table.add_row(vec![name.as_str(), "created"]);
        }
        for name in &report.found {
            table.add_row(vec![name.as_str(), "found"]);
        }
        out.push_str(&format!("{}\n", table));
    }
    out.push_str(&rule(80));
    out
}

pub fn format_teardown_report(report: &TeardownReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", rule(80)));
    for item in &report.removed {
        out.push_str(&format!("Removed  ===> {}\n", item));
    }
    out.push_str(&format!("{}\n", rule(80)));
    out.push_str(&format!(
        "Destroyed {} stack {} (serial {})",
        report.identity.kind,
        report.identity.stack_name.yellow(),
        report.identity.serial
    ));
    out
}

pub fn format_stack_list_text(stacks: &[StackSummary]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Active stacks"));
    if stacks.is_empty() {
        out.push_str("No active stacks.");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Kind", "Stack", "Owner", "Serial", "Created"]);
    for stack in stacks {
        table.add_row(vec![
            stack.kind.clone(),
            stack.stack_name.clone(),
            stack.owner.clone(),
            stack.serial.clone(),
            stack.created_at.clone(),
        ]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_stack_show_text(stack: &StackSummary) -> String {
    let mut out = format!("{}\n\n", format_section_heading(&stack.stack_name));
    out.push_str(&format!("  Kind:    {}\n", stack.kind));
    out.push_str(&format!("  Owner:   {}\n", stack.owner));
    out.push_str(&format!("  Serial:  {}\n", stack.serial));
    out.push_str(&format!("  Created: {}\n", stack.created_at));
    match stack.commands.last() {
        Some(last) => {
            out.push_str("\nRecorded commands:\n");
            for command in &stack.commands {
                out.push_str(&format!("  $ {}\n", command));
            }
            out.push_str(&format!("\nTo rebuild:\n  $ {}", last));
        }
        None => out.push_str("\nNo commands recorded (build did not complete)."),
    }
    out
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, StackError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StackError::ConfigError(format!("Failed to serialize output: {}", e)))
}
