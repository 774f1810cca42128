//! Print the effective harness config (defaults + `.env` + env overrides) and
//! the resolved connection profile as JSON.
//!
//! Usage: `print_effective_config [CONFIG_PATH] [ENV_FILE]`

use backup_harness_config::{load_harness_config_std_env, resolve_connection_profile};
use std::io;
use std::io::Write;
use std::path::PathBuf;

fn main() -> std::process::ExitCode {
    match run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::ExitCode::from(1)
        },
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let config_path = args.next();
    let env_file = args.next();

    let (env, config) =
        load_harness_config_std_env(config_path.as_deref(), env_file.as_deref(), None)?;
    let profile = resolve_connection_profile(&env);

    let document = serde_json::json!({
        "config": config.as_ref(),
        "connection": profile,
    });
    let mut output = serde_json::to_string_pretty(&document)?;
    output.push('\n');

    let mut stdout = io::stdout();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;

    Ok(())
}
