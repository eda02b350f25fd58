//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{CaptionProvider, Settings};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Tubesage Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("Caption Tools").bold());
    let ytdlp = check_ytdlp(settings);
    ytdlp.print();
    checks.push(ytdlp);

    println!();

    println!("{}", style("Model Backend").bold());
    let mut api_checks = vec![check_api_key(&settings.llm.api_key_env)];
    if settings.embedding.api_key_env != settings.llm.api_key_env {
        api_checks.push(check_api_key(&settings.embedding.api_key_env));
    }
    api_checks.push(CheckResult::ok(
        "Endpoint",
        settings
            .llm
            .api_base
            .as_deref()
            .unwrap_or("https://api.openai.com/v1"),
    ));
    api_checks.push(CheckResult::ok(
        "Models",
        &format!("{} / {}", settings.llm.model, settings.embedding.model),
    ));
    for check in &api_checks {
        check.print();
    }
    checks.extend(api_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Tubesage.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Tubesage is ready to use.");
    }

    Ok(())
}

/// yt-dlp is required only when it is the sole caption source.
fn check_ytdlp(settings: &Settings) -> CheckResult {
    let path = &settings.captions.ytdlp_path;
    let hint = install_hint_ytdlp();

    match Command::new(path).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok("yt-dlp", &version)
        }
        Ok(_) => CheckResult::error("yt-dlp", "installed but not working", hint),
        Err(_) => match settings.captions.provider {
            CaptionProvider::YtDlp => CheckResult::error("yt-dlp", "not found", hint),
            CaptionProvider::Auto => CheckResult::warning(
                "yt-dlp",
                "not found (fallback caption source disabled)",
                hint,
            ),
            CaptionProvider::TimedText => CheckResult::ok("yt-dlp", "not needed"),
        },
    }
}

fn check_api_key(var: &str) -> CheckResult {
    match std::env::var(var) {
        Ok(key) if key.trim().is_empty() => {
            CheckResult::error(var, "empty", &format!("Set with: export {}='...'", var))
        }
        Ok(key) => CheckResult::ok(var, &format!("configured ({})", mask_key(&key))),
        Err(_) => CheckResult::error(var, "not set", &format!("Set with: export {}='...'", var)),
    }
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: tubesage config init",
        )
    }
}

/// Show only the edges of a secret.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("gsk_abcdefghijklmnop"), "gsk_...mnop");
    }

    #[test]
    fn test_missing_ytdlp_severity_follows_provider() {
        let mut settings = Settings::default();
        settings.captions.ytdlp_path = "tubesage-no-such-binary".to_string();

        settings.captions.provider = CaptionProvider::Auto;
        assert_eq!(check_ytdlp(&settings).status, CheckStatus::Warning);

        settings.captions.provider = CaptionProvider::YtDlp;
        assert_eq!(check_ytdlp(&settings).status, CheckStatus::Error);

        settings.captions.provider = CaptionProvider::TimedText;
        assert_eq!(check_ytdlp(&settings).status, CheckStatus::Ok);
    }
}
