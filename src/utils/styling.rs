//! Terminal styling for the run log

use console::{style, Emoji};
use std::path::Path;

use crate::pipeline::AnalysisConfig;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static SEED: Emoji<'_, '_> = Emoji("🌱 ", "");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
    ██╗  ██╗ █████╗ ██████╗ ██╗   ██╗███████╗███████╗████████╗
    ██║  ██║██╔══██╗██╔══██╗██║   ██║██╔════╝██╔════╝╚══██╔══╝
    ███████║███████║██████╔╝██║   ██║█████╗  ███████╗   ██║
    ██╔══██║██╔══██║██╔══██╗╚██╗ ██╔╝██╔══╝  ╚════██║   ██║
    ██║  ██║██║  ██║██║  ██║ ╚████╔╝ ███████╗███████║   ██║
    ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝  ╚═══╝  ╚══════╝╚══════╝   ╚═╝
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {}",
        style("Activity recognition: clean, explore, compare, predict").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(training: &Path, evaluation: &Path, output: &Path, config: &AnalysisConfig) {
    let box_width = 60;
    let line = "─".repeat(box_width - 2);
    let models: Vec<String> = config.models.iter().map(|m| m.to_string()).collect();

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Training:   {:<39}│", FOLDER, truncate_path(training, 38));
    println!("    │  {} Evaluation: {:<39}│", FOLDER, truncate_path(evaluation, 38));
    println!("    │  {} Label:      {:<39}│", TARGET, truncate_string(&config.label_column, 38));
    println!("    │  {} Output:     {:<39}│", SAVE, truncate_path(output, 38));
    println!("    ├{}┤", line);
    println!(
        "    │  {} Missing threshold:  {:<31}│",
        CHART,
        style(format!("{:.1}%", config.missing_threshold * 100.0)).yellow()
    );
    println!(
        "    │  {} Split / CV folds:   {:<31}│",
        CHART,
        style(format!("{:.2} / {}", config.split_fraction, config.cv_folds)).yellow()
    );
    println!(
        "    │  {} PCA variance:       {:<31}│",
        CHART,
        style(format!("{:.1}%", config.pca_variance * 100.0)).yellow()
    );
    println!(
        "    │  {} Models:             {:<31}│",
        CHART,
        style(models.join(", ")).yellow()
    );
    println!(
        "    │  {} Seed:               {:<31}│",
        SEED,
        style(config.seed).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

/// Print the elapsed time of a step
pub fn print_step_time(elapsed: std::time::Duration) {
    println!(
        "      {}",
        style(format!("done in {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!("    {} {}", ROCKET, style("Harvest run complete!").green().bold());
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, threshold_info: Option<&str>) {
    if let Some(info) = threshold_info {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

// Helper functions

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghijkl", 8), "...hijkl");
    }
}
