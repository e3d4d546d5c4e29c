//! Command fixtures for shell-backed tests.

use crate::command::StageCommand;

/// A foreground `/bin/sh -c` command.
#[must_use]
pub fn sh(script: &str) -> StageCommand {
    StageCommand::new("/bin/sh").arg("-c").arg(script)
}

/// A background `/bin/sh -c` command.
#[must_use]
pub fn background_sh(script: &str) -> StageCommand {
    sh(script).background()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_fixture() {
        let cmd = sh("exit 0");
        assert_eq!(cmd.program(), "/bin/sh");
        assert!(!cmd.is_background());
    }

    #[test]
    fn test_background_sh_fixture() {
        assert!(background_sh("sleep 1").is_background());
    }
}
