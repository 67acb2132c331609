//! ollqd-pii: mask text and inspect the PII service from the command line.

use std::io::Read;
use std::path::PathBuf;

use ollqd_core::PiiConfig;
use ollqd_pii::PiiService;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Mask(Option<String>),
    Status,
    Help,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut config_path = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                config_path = Some(PathBuf::from(path));
            }
            _ => positional.push(arg.as_str()),
        }
    }

    let command = match positional.split_first() {
        None => Command::Help,
        Some((&"mask", rest)) if rest.is_empty() => Command::Mask(None),
        Some((&"mask", rest)) => Command::Mask(Some(rest.join(" "))),
        Some((&"status", _)) => Command::Status,
        Some((&("help" | "--help" | "-h"), _)) => Command::Help,
        Some((other, _)) => anyhow::bail!("Unknown command: {}. Use 'ollqd-pii help' for usage.", other),
    };

    Ok(Args {
        config_path,
        command,
    })
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PiiConfig> {
    match path {
        Some(path) => {
            info!("Loading PII config from {}", path.display());
            Ok(PiiConfig::load(path)?)
        }
        None => Ok(PiiConfig::from_env()),
    }
}

fn build_service(config_path: Option<&PathBuf>) -> anyhow::Result<PiiService> {
    let config = load_config(config_path)?;
    Ok(PiiService::new(config)?)
}

fn print_help() {
    println!("ollqd-pii: PII masking for chat prompts");
    println!();
    println!("Usage: ollqd-pii [--config <file>] <command>");
    println!();
    println!("Commands:");
    println!("  mask [text]     Mask text (reads stdin when omitted) and print the report");
    println!("  status          Show masking configuration and classifier availability");
    println!("  help            Show this help message");
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries JSON only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Help => print_help(),
        Command::Mask(text) => {
            let service = build_service(args.config_path.as_ref())?;
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf.trim_end_matches(['\r', '\n']).to_string()
                }
            };
            if text.is_empty() {
                eprintln!("Usage: ollqd-pii mask <text>  (or pipe text on stdin)");
                std::process::exit(1);
            }
            let report = service.test_masking(&text)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status => {
            let service = build_service(args.config_path.as_ref())?;
            let config = service.config();
            let status = serde_json::json!({
                "enabled": config.enabled,
                "use_classifier": config.use_classifier,
                "classifier_available": service.is_classifier_available(),
                "enabled_types": config.enabled_types,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_mask_with_text() {
        let parsed = parse_args(&args(&["mask", "call", "555-123-4567"])).unwrap();
        assert_eq!(parsed.command, Command::Mask(Some("call 555-123-4567".into())));
        assert_eq!(parsed.config_path, None);
    }

    #[test]
    fn test_parse_mask_from_stdin() {
        let parsed = parse_args(&args(&["mask"])).unwrap();
        assert_eq!(parsed.command, Command::Mask(None));
    }

    #[test]
    fn test_parse_config_anywhere() {
        let parsed = parse_args(&args(&["status", "--config", "pii.json"])).unwrap();
        assert_eq!(parsed.command, Command::Status);
        assert_eq!(parsed.config_path, Some(PathBuf::from("pii.json")));

        let parsed = parse_args(&args(&["-c", "pii.json", "mask", "x"])).unwrap();
        assert_eq!(parsed.command, Command::Mask(Some("x".into())));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
        assert_eq!(parse_args(&[]).unwrap().command, Command::Help);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pii.json");
        std::fs::write(&path, r#"{"enabled": true, "enabled_types": "EMAIL,SSN"}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.enabled);
        assert_eq!(config.enabled_types, "EMAIL,SSN");
    }
}
