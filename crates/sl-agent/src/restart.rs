//! Process restart for hard label updates

use std::io;
use std::process::Command;

use sl_core::traits::Restarter;

/// Re-executes the running binary with its original arguments
#[derive(Debug, Default, Clone, Copy)]
pub struct ReexecRestarter;

impl ReexecRestarter {
    fn command(argv: &[String]) -> io::Result<Command> {
        let exe = std::env::current_exe()?;
        let mut command = Command::new(exe);
        command.args(argv.iter().skip(1));
        Ok(command)
    }
}

impl Restarter for ReexecRestarter {
    #[cfg(unix)]
    fn restart(&self, argv: &[String]) -> io::Result<()> {
        use std::os::unix::process::CommandExt;

        tracing::info!("Re-executing {:?}", argv);
        // exec only returns on failure
        Err(Self::command(argv)?.exec())
    }

    #[cfg(not(unix))]
    fn restart(&self, argv: &[String]) -> io::Result<()> {
        tracing::info!("Starting replacement process {:?}", argv);
        Self::command(argv)?.spawn()?;
        std::process::exit(0)
    }
}
