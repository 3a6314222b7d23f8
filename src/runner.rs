use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

/// Run a command, handing every stdout/stderr line to `sink` as it arrives.
///
/// Both streams are read on their own thread and merged in arrival order.
/// Returns whether the command exited successfully.
pub fn run_streaming<F>(
    cmd: &str,
    args: &[String],
    envs: &[(&str, String)],
    mut sink: F,
) -> Result<bool>
where
    F: FnMut(&str),
{
    let mut child = Command::new(cmd)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward(stderr, tx.clone()));
    }
    drop(tx);

    for line in rx {
        sink(&line);
    }
    join_readers(readers, cmd);

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for: {cmd}"))?;
    log::debug!("{cmd} {} exited with {status}", args.join(" "));
    Ok(status.success())
}

fn forward<R: Read + Send + 'static>(stream: R, tx: mpsc::Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("Stopped reading child output: {e}");
                    break;
                }
            }
        }
    })
}

/// Wait for the output readers. Returns how many of them panicked.
fn join_readers(readers: Vec<thread::JoinHandle<()>>, cmd: &str) -> usize {
    let mut panicked = 0;
    for reader in readers {
        if reader.join().is_err() {
            log::warn!("Output reader of {cmd} panicked; the captured output may be incomplete");
            panicked += 1;
        }
    }
    panicked
}

/// Run a command and capture stdout
pub fn run_capture(cmd: &str, args: &[String], dir: Option<&Path>) -> Result<String> {
    let mut command = Command::new(cmd);
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let output = command
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    if cmd.contains('/') {
        return Path::new(cmd).is_file();
    }
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_collects_both_streams() {
        let mut lines = Vec::new();
        let ok = run_streaming(
            "sh",
            &["-c".to_string(), "echo out; echo err >&2".to_string()],
            &[],
            |line| lines.push(line.to_string()),
        )
        .unwrap();
        assert!(ok);
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);
    }

    #[test]
    fn test_streaming_reports_failure_and_env() {
        let mut lines = Vec::new();
        let ok = run_streaming(
            "sh",
            &["-c".to_string(), "echo $APAF_MARKER; exit 3".to_string()],
            &[("APAF_MARKER", "marker".to_string())],
            |line| lines.push(line.to_string()),
        )
        .unwrap();
        assert!(!ok);
        assert_eq!(lines, vec!["marker".to_string()]);
    }

    #[test]
    fn test_join_counts_panicked_readers() {
        let readers = vec![
            thread::spawn(|| {}),
            thread::spawn(|| panic!("reader failed")),
        ];
        assert_eq!(join_readers(readers, "terraform"), 1);
    }

    #[test]
    fn test_capture() {
        let out = run_capture("sh", &["-c".to_string(), "echo hello".to_string()], None).unwrap();
        assert_eq!(out, "hello");
        assert!(run_capture("sh", &["-c".to_string(), "exit 1".to_string()], None).is_err());
    }

    #[test]
    fn test_command_exists() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-command-12345"));
    }
}
