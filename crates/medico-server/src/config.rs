//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "medico-server", version, about = "Laboratory records API server")]
pub struct Cli {
    /// SQLite database file (created if missing)
    #[arg(long, env = "MEDICO_DATABASE", default_value = "medico.db", global = true)]
    pub database: PathBuf,

    /// Address to listen on
    #[arg(long, env = "MEDICO_BIND", default_value = "127.0.0.1:8000", global = true)]
    pub bind: SocketAddr,

    /// Require `Authorization: Token <key>` on resource routes
    #[arg(
        long,
        env = "MEDICO_REQUIRE_AUTH",
        default_value_t = true,
        action = ArgAction::Set,
        global = true
    )]
    pub require_auth: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Provision a login account
    CreateUser(CreateUserArgs),
}

#[derive(Args, Debug, PartialEq)]
pub struct CreateUserArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub password: String,
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
    #[arg(long, default_value = "")]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["medico-server", "--database", "lab.db"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.database, PathBuf::from("lab.db"));
    }

    #[test]
    fn test_auth_can_be_disabled() {
        let cli = Cli::try_parse_from([
            "medico-server",
            "--require-auth",
            "false",
            "--bind",
            "0.0.0.0:9000",
            "serve",
        ])
        .unwrap();
        assert!(!cli.require_auth);
        assert_eq!(cli.bind.port(), 9000);
        assert_eq!(cli.command, Some(Command::Serve));
    }

    #[test]
    fn test_create_user_args() {
        let cli = Cli::try_parse_from([
            "medico-server",
            "create-user",
            "--username",
            "admin",
            "--password",
            "s3cret",
            "--first-name",
            "Asha",
        ])
        .unwrap();
        match cli.command {
            Some(Command::CreateUser(args)) => {
                assert_eq!(args.username, "admin");
                assert_eq!(args.first_name, "Asha");
                assert_eq!(args.email, "");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_create_user_requires_password() {
        assert!(Cli::try_parse_from(["medico-server", "create-user", "--username", "x"]).is_err());
    }
}
