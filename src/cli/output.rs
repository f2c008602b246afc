use serde::Serialize;

use crate::cli::commands::{RunReport, ToolStatus};
use crate::modules::interface::ModuleDocumentation;

/// Pretty JSON, falling back to the error text when serialization fails
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

pub fn print_run_report(report: &RunReport) {
    println!("{}", to_json(report));
}

pub fn print_module_list(modules: &[&str]) {
    for module in modules {
        println!("{module}");
    }
}

pub fn print_documentation(module: &str, version: &str, doc: &ModuleDocumentation) {
    println!("{module} {version}");
    println!("{}", doc.description);
    println!();

    println!("Actions:");
    for action in &doc.actions {
        if action.required.is_empty() {
            println!("  {:<20} {}", action.name, action.description);
        } else {
            println!(
                "  {:<20} {} (requires: {})",
                action.name,
                action.description,
                action.required.join(", ")
            );
        }
    }

    if !doc.examples.is_empty() {
        println!();
        println!("Examples:");
        for example in &doc.examples {
            println!("  rustle-winadmin run {example}");
        }
    }
}

pub fn print_tool_report(report: &[ToolStatus]) {
    for status in report {
        match &status.path {
            Some(path) => println!("  found    {:<12} {}", status.tool, path.display()),
            None => println!("  missing  {}", status.tool),
        }
    }
}
