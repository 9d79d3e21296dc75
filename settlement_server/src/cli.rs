use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets are deliberately left off this list
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "MPS_HOST",
        "MPS_PORT",
        "MPS_DATABASE_URL",
        "MPS_PAYMENT_WINDOW_SECS",
        "MPS_FEE_RATE_BPS",
        "MPS_BANK_ACCOUNT_DIGITS",
        "MPS_SWEEP_STALE_ORDERS",
        "MPS_WEBHOOK_IP_WHITELIST",
        "MPS_WEBHOOK_SECRET_HEADER",
        "MPS_USE_X_FORWARDED_FOR",
        "MPS_USE_FORWARDED",
        "MPS_GATEWAY_URL",
        "MPS_GATEWAY_TIMEOUT_SECS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
