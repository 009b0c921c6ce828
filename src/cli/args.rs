use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "meeting-orchestrator")]
#[command(about = "Task orchestrator for the meeting processing pipeline", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the orchestrator service (default)
    Serve,
    /// Print version information
    Version,
    /// Show a meeting's status, notify address and tasks
    Inspect(MeetingArgs),
    /// Re-evaluate the stage cascades of an ended meeting
    Rescan(MeetingArgs),
    /// Delete every ledger entry, document and directory of a meeting
    Cleanup(MeetingArgs),
}

#[derive(ClapArgs, Debug)]
pub struct MeetingArgs {
    /// Meeting identifier
    pub meeting_id: String,
    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["meeting-orchestrator"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_meeting_subcommands() {
        let cli = Cli::try_parse_from(["meeting-orchestrator", "-v", "inspect", "abc123", "--json"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(CliCommand::Inspect(args)) => {
                assert_eq!(args.meeting_id, "abc123");
                assert!(args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["meeting-orchestrator", "cleanup", "abc123"]).unwrap();
        assert!(matches!(cli.command, Some(CliCommand::Cleanup(_))));
    }

    #[test]
    fn test_meeting_id_required() {
        assert!(Cli::try_parse_from(["meeting-orchestrator", "rescan"]).is_err());
    }
}
