use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Result, anyhow};

/// Copy commands tried in order; the first one that spawns wins.
const COPY_COMMANDS: [(&str, &[&str]); 3] = [
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
];

pub fn copy(text: &str) -> Result<()> {
    for (program, args) in COPY_COMMANDS {
        match pipe_to(program, args, text)? {
            Some(true) => return Ok(()),
            Some(false) => tracing::debug!(program, "clipboard command failed"),
            None => continue,
        }
    }

    Err(anyhow!("no clipboard command available (tried pbcopy, wl-copy, xclip)"))
}

/// Feeds `text` to the program's stdin. `None` if it could not be spawned,
/// otherwise whether it exited successfully.
fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<Option<bool>> {
    let Ok(mut child) = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    else {
        return Ok(None);
    };

    // stdin is closed at the end of this block so the child sees EOF
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    // Always reap the child, even when the write failed
    let status = child.wait()?;
    written?;
    Ok(Some(status.success()))
}
