//! Produce an `ADMIN_HASH_PASSWORD` value for the seeded admin account.
//!
//! On startup the server seeds the `ADMIN_EMAIL` account from this hash when
//! that account does not exist yet. The hash wins over `ADMIN_PASSWORD`.

use bcrypt::{hash, verify, DEFAULT_COST};
use eqostack_backend::config::Config;
use std::env;

/// `.env` lines for the given admin config and bcrypt hash.
fn env_lines(config: &Config, hashed: &str) -> Vec<String> {
    let mut lines = vec![
        format!("# Admin account: {}", config.admin_email),
        format!(
            "# bcrypt cost {}; seeded on the next start if the account is missing.",
            DEFAULT_COST
        ),
    ];
    if config.admin_password.is_some() {
        lines.push("# ADMIN_PASSWORD is also set; this hash takes precedence.".to_string());
    }
    lines.push(format!("ADMIN_EMAIL={}", config.admin_email));
    lines.push(format!("ADMIN_HASH_PASSWORD={}", hashed));
    lines
}

fn main() {
    dotenvy::dotenv().ok();

    let password = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: hash-password <PASSWORD>");
        std::process::exit(1);
    });
    let config = Config::from_env();

    let hashed = match hash(&password, DEFAULT_COST) {
        Ok(hashed) => hashed,
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    };

    if !matches!(verify(&password, &hashed), Ok(true)) {
        eprintln!("Generated hash failed verification");
        std::process::exit(1);
    }

    for line in env_lines(&config, &hashed) {
        println!("{}", line);
    }
}
