//! Process spawning helpers.
//!
//! Renderer and probe invocations go through these helpers so platform flags are
//! applied in one place. On Windows, console binaries spawned from a service or GUI
//! host would otherwise open a console window per invocation.

use std::ffi::OsStr;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a std process command.
pub fn configure_std_command(cmd: &mut std::process::Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Apply platform-specific flags to a tokio process command.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Builds a configured tokio command that is killed if its handle is dropped.
///
/// A render abandoned by its caller (timeout, cancellation) must not keep writing
/// into the partial output file.
pub fn tool_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    configure_tokio_command(&mut cmd);
    cmd.kill_on_drop(true);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_command_configuration_is_idempotent() {
        #[cfg(target_os = "windows")]
        let mut cmd = std::process::Command::new("cmd");
        #[cfg(not(target_os = "windows"))]
        let mut cmd = std::process::Command::new("echo");

        configure_std_command(&mut cmd);
        configure_std_command(&mut cmd);
    }

    #[tokio::test]
    async fn tool_command_can_execute_successfully() {
        #[cfg(target_os = "windows")]
        let output = tool_command("cmd").args(["/C", "echo", "test"]).output().await;
        #[cfg(not(target_os = "windows"))]
        let output = tool_command("echo").arg("test").output().await;

        let output = output.expect("echo should spawn");
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("test"));
    }
}
