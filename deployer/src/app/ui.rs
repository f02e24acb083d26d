//! Console output for operators

use std::io::Write;

use colored::Colorize;

use crate::deploy::orchestrator::DeploymentOutcome;
use crate::utils::format_duration;

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

fn print_field(label: &str, value: &str) {
    println!("  {:<18} {}", format!("{}:", label).bright_black(), value);
}

/// Print what a deployment run produced
pub fn print_outcome(outcome: &DeploymentOutcome) {
    print_section("Deployment ready");
    print_field("Endpoint", &outcome.endpoint.name);
    print_field("Location", &outcome.endpoint.location);
    print_field("Deployment", &outcome.deployment.name);
    print_field(
        "Instances",
        &format!(
            "{} x {}",
            outcome.deployment.instance_count, outcome.deployment.instance_type
        ),
    );
    print_field("Model", &outcome.model.to_string());
    print_field("Scoring URL", &outcome.credentials.scoring_url);
    print_field("Client model", &outcome.client.model);
    print_field("Elapsed", &format_duration(outcome.elapsed));
    println!();

    if !outcome.model.is_registered() {
        print_warning("Model is not registered in the workspace; the raw identifier was deployed.");
    }
    print_success("Endpoint traffic updated successfully.");
}

/// Write a streamed delta without a newline
pub fn print_delta(delta: &str) {
    print!("{}", delta);
    let _ = std::io::stdout().flush();
}
