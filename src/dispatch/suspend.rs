// src/dispatch/suspend.rs

//! Suspends the target machine by running a PowerShell snippet over SSH.

use crate::core::BridgeError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// The PowerShell invocation that puts a Windows machine into suspend.
const SUSPEND_SCRIPT: &str = "Add-Type -AssemblyName System.Windows.Forms;\
$PowerState = [System.Windows.Forms.PowerState]::Suspend;\
[System.Windows.Forms.Application]::SetSuspendState($PowerState, $false, $false);";

/// Runs `ssh -i <identity_file> <host> powershell <script>` and logs its
/// output. The outcome never feeds back into the protocol client; a failed
/// suspend is only visible in the logs.
pub async fn suspend_host(host: &str, identity_file: &Path) -> Result<(), BridgeError> {
    let output = Command::new("ssh")
        .arg("-i")
        .arg(identity_file)
        .arg(host)
        .arg("powershell")
        .arg(SUSPEND_SCRIPT)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    info!(
        "Suspend: stdout: {}",
        String::from_utf8_lossy(&output.stdout).trim()
    );
    info!(
        "Suspend: stderr: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    );
    if !output.status.success() {
        warn!("Suspend command for {host} exited with {}", output.status);
    }
    Ok(())
}
