use crate::domain::model::Strategy;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "slot-reserver")]
#[command(about = "Grabs a reservation slot as soon as one opens up")]
pub struct CliConfig {
    #[arg(short, long, default_value = "reserver.toml", help = "Path to the TOML config")]
    pub config: String,

    /// Bearer token; overrides `[auth] token` and the JWT environment variable
    #[arg(long)]
    pub token: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Poll the target date until slots show up (default)
    #[command(visible_alias = "r")]
    Reserve,
    /// Scan the coming business days, sleeping SECONDS between passes
    #[command(visible_alias = "w")]
    Watch {
        /// Pause between passes, 1 to 3600 seconds
        #[arg(default_value_t = 5)]
        seconds: u64,
    },
    /// Race probes of the target date, at most LIMIT in flight
    #[command(visible_aliases = ["a", "async"])]
    Race {
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// Race the first seven dates the service reports
    #[command(visible_alias = "d")]
    Dates,
    /// Run the two-factor exchange and print the resulting token
    Mfa,
}

impl CliConfig {
    pub fn selected_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Reserve)
    }

    /// `None` for commands that are not acquisition strategies.
    pub fn strategy(&self) -> Option<Strategy> {
        match self.selected_command() {
            Command::Reserve => Some(Strategy::RetrySingleDate),
            Command::Watch { seconds } => Some(Strategy::Watch {
                interval: Duration::from_secs(seconds),
            }),
            Command::Race { limit } => Some(Strategy::BoundedRace { limit }),
            Command::Dates => Some(Strategy::FixedWindow),
            Command::Mfa => None,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match self.selected_command() {
            Command::Race { limit } => validate_positive_number("race.limit", limit, 1),
            Command::Watch { seconds } => validate_range("watch.seconds", seconds, 1, 3600),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(std::iter::once("slot-reserver").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_default_command_is_reserve() {
        let cli = parse(&[]);
        assert_eq!(cli.config, "reserver.toml");
        assert_eq!(cli.strategy(), Some(Strategy::RetrySingleDate));
    }

    #[test]
    fn test_race_with_limit_and_alias() {
        assert_eq!(
            parse(&["race", "3"]).strategy(),
            Some(Strategy::BoundedRace { limit: 3 })
        );
        assert_eq!(
            parse(&["async"]).strategy(),
            Some(Strategy::BoundedRace { limit: 10 })
        );
    }

    #[test]
    fn test_watch_default_interval() {
        assert_eq!(
            parse(&["--verbose", "w"]).strategy(),
            Some(Strategy::Watch {
                interval: Duration::from_secs(5)
            })
        );
    }

    #[test]
    fn test_mfa_is_not_a_strategy() {
        let cli = parse(&["--token", "abc", "mfa"]);
        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert!(cli.strategy().is_none());
    }

    #[test]
    fn test_watch_help_states_interval_bounds() {
        let cli = <CliConfig as clap::CommandFactory>::command();
        let watch = cli.find_subcommand("watch").unwrap();
        let seconds = watch
            .get_arguments()
            .find(|arg| arg.get_id().as_str() == "seconds")
            .unwrap();

        let help = seconds.get_help().unwrap().to_string();
        assert!(help.contains("1 to 3600"));
    }

    #[test]
    fn test_validation() {
        assert!(parse(&["race", "0"]).validate().is_err());
        assert!(parse(&["watch", "0"]).validate().is_err());
        assert!(parse(&["dates"]).validate().is_ok());
    }
}
