use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the tsgd binary.
#[derive(Parser, Debug)]
#[command(name = "tsgd", version, about = "Compiles TypeScript game scripts to GDScript")]
pub struct CliArgs {
    /// Project directory holding `tsgd.toml` (defaults to the current directory).
    #[arg(short = 'p', long, global = true)]
    pub path: Option<PathBuf>,

    /// Raise log verbosity (`-v` info, `-vv` debug).
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create `tsgd.toml` with the source and output directories.
    Init,
    /// Compile every source and write the GDScript output.
    Build,
    /// Compile without writing anything and report diagnostics.
    Check {
        /// Print diagnostics as a JSON array.
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_accepts_json_and_global_flags() {
        let args = CliArgs::try_parse_from(["tsgd", "check", "--json", "-vv", "--path", "game"]).unwrap();
        assert!(matches!(args.command, Command::Check { json: true }));
        assert_eq!(args.path, Some(PathBuf::from("game")));
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn a_subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["tsgd"]).is_err());
    }
}
