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
    // Secrets are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "RECON_HOST",
        "RECON_PORT",
        "RECON_DATABASE_URL",
        "RECON_GATEWAY_HMAC_CHECKS",
        "RECON_SHIPPING_API_URL",
        "RECON_SHIPPING_PICKUP_LOCATION",
        "RECON_EXTERNAL_CALL_TIMEOUT",
        "RECON_NOTIFICATION_URL",
        "RECON_CACHE_INVALIDATION_URL",
        "RECON_OUTBOX_GRACE_PERIOD",
        "RECON_OUTBOX_INTERVAL",
        "RECON_OUTBOX_LEASE",
        "RECON_WEIGHT_TOLERANCE_GRAMS",
        "RECON_USE_X_FORWARDED_FOR",
        "RECON_USE_FORWARDED",
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
