pub mod device;
pub mod hid;

use std::error::Error;
use std::io;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use device::handle_device;
use hid::{handle_hid, HidCommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the Handheld Daemon (default)
    Run,
    /// Inspect HID report descriptors
    Hid {
        #[command(subcommand)]
        cmd: HidCommand,
    },
    /// Display the DMI data of this system and the detected handheld
    Device,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Run a command that is not the daemon itself
pub fn main_cli(args: Args) -> Result<(), Box<dyn Error>> {
    let Some(cmd) = args.cmd else {
        return Ok(());
    };

    match cmd {
        Commands::Run => (),
        Commands::Hid { cmd } => handle_hid(cmd)?,
        Commands::Device => handle_device(),
        Commands::Completions { shell } => {
            let mut command = Args::command();
            clap_complete::generate(shell, &mut command, "hhd", &mut io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        let args = Args::try_parse_from(["hhd"]).unwrap();
        assert!(args.cmd.is_none());

        let args = Args::try_parse_from(["hhd", "hid", "dump", "rdesc.bin", "--format", "c"]).unwrap();
        assert!(matches!(args.cmd, Some(Commands::Hid { .. })));

        let args = Args::try_parse_from(["hhd", "completions", "bash"]).unwrap();
        assert!(matches!(
            args.cmd,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
        assert!(Args::try_parse_from(["hhd", "hid", "dump", "x", "--format", "json"]).is_err());
    }

    #[test]
    fn command_is_valid() {
        Args::command().debug_assert();
    }
}
