use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hive",
    version,
    about = "Verify research papers against the proof backend and publish them to the hive"
)]
pub struct Cli {
    /// YAML config file; environment variables are used when absent
    #[arg(long, global = true, env = "HIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make sure the verifier is reachable and print its availability
    Status(StatusArgs),
    /// Print the claims that would be sent for verification
    Claims(ClaimsArgs),
    /// Run a paper through verification, correction, and publishing
    Publish(PublishArgs),
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Probe only; never start the verifier container
    #[arg(long)]
    pub no_start: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClaimsArgs {
    /// Markdown paper
    pub file: PathBuf,

    /// Print claims as a JSON array
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Markdown paper
    pub file: PathBuf,

    /// Paper title (default: first `#` heading, then the file stem)
    #[arg(long)]
    pub title: Option<String>,

    /// Author name (default: configured agent name)
    #[arg(long)]
    pub author: Option<String>,

    /// Explicit claim; repeat for several. Extracted from the paper when omitted.
    #[arg(long = "claim")]
    pub claims: Vec<String>,

    /// Probe only; never start the verifier container
    #[arg(long)]
    pub no_start: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_collects_repeated_claims() {
        let cli = Cli::try_parse_from([
            "hive",
            "publish",
            "paper.md",
            "--claim",
            "first claim",
            "--claim",
            "second claim",
            "--no-start",
        ])
        .unwrap();

        match cli.cmd {
            Command::Publish(args) => {
                assert_eq!(args.claims, vec!["first claim", "second claim"]);
                assert!(args.no_start);
                assert!(args.title.is_none());
            }
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["hive", "status", "--config", "hive.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("hive.yaml")));
    }
}
