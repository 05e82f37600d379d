// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - headless runner for the messaging and notification sync core.

mod cache;
mod run;
mod shutdown;

use clap::{Parser, Subcommand};

use courier_core::{Identity, Role};

/// Courier - real-time messaging and notification sync.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect, sync and log updates until interrupted.
    Run {
        #[arg(long)]
        user_id: String,
        /// admin or driver.
        #[arg(long, value_parser = parse_role)]
        role: Role,
        /// Session token for the channel handshake and REST calls.
        #[arg(long)]
        token: Option<String>,
    },
    /// Print the resolved configuration as TOML.
    Config,
    /// Inspect the offline cache.
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Print the last active conversation snapshot.
    Show,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>()
        .map_err(|_| format!("unknown role `{raw}` (expected admin or driver)"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match courier_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Some(Commands::Run {
            user_id,
            role,
            token,
        }) => {
            run::init_tracing(&config.logging.level);
            let mut identity = Identity::new(user_id, role);
            if let Some(token) = token {
                identity = identity.with_token(token);
            }
            run::run_sync(config, identity).await
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => {
                print!("{rendered}");
                Ok(())
            }
            Err(e) => Err(courier_core::CourierError::Config(e.to_string())),
        },
        Some(Commands::Cache {
            action: CacheCommand::Show,
        }) => cache::show(&config).await,
        None => {
            println!("courier: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("courier: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = courier_config::load_and_validate().expect("default config should be valid");
        assert!(config.connection.url.starts_with("ws"));
    }

    #[test]
    fn run_requires_identity() {
        let cli = Cli::try_parse_from([
            "courier", "run", "--user-id", "d1", "--role", "driver", "--token", "t",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run {
                user_id,
                role,
                token,
            }) => {
                assert_eq!(user_id, "d1");
                assert_eq!(role, Role::Driver);
                assert_eq!(token.as_deref(), Some("t"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["courier", "run", "--role", "admin"]).is_err());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = Cli::try_parse_from(["courier", "run", "--user-id", "x", "--role", "pilot"])
            .unwrap_err();
        assert!(err.to_string().contains("pilot"));
    }

    #[test]
    fn cache_show_parses() {
        let cli = Cli::try_parse_from(["courier", "cache", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                action: CacheCommand::Show
            })
        ));
    }
}
