use std::{path::Path, process::ExitStatus, process::Stdio};

use eyre::{Context, Result, eyre};
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, stdout},
    process::Command,
};
use tracing::debug;

/// Runs an external tool without a shell, copying its stdout line by line to
/// `log`, or to our own stdout when no log file is given.
pub async fn run_to_log(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    log: Option<&Path>,
) -> Result<ExitStatus> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    debug!("Running {program} {}", args.join(" "));

    let mut child = cmd.spawn().context(format!("Spawn {program}"))?;
    let pipe = child
        .stdout
        .take()
        .ok_or_else(|| eyre!("Missing stdout pipe for {program}"))?;
    let reader = BufReader::new(pipe);

    let copied = match log {
        Some(path) => {
            let mut file = File::create(path)
                .await
                .context(format!("Create log {}", path.display()))?;
            copy_lines(reader, &mut file).await?
        }
        None => copy_lines(reader, &mut stdout()).await?,
    };
    debug!("{program} printed {copied} line(s)");

    Ok(child.wait().await?)
}

/// Copies `reader` to `out` a line at a time, returning the line count
pub async fn copy_lines<R, W>(reader: R, out: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        count += 1;
    }
    out.flush().await?;
    Ok(count)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdout_lands_in_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("result.log");
        let status = run_to_log(
            "/bin/sh",
            &["-c".to_owned(), "echo one; echo two".to_owned()],
            Some(dir.path()),
            Some(&log),
        )
        .await
        .unwrap();
        assert!(status.success());
        assert_eq!(std::fs::read_to_string(log).unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn lines_are_copied_with_newlines() {
        let mut out = Vec::new();
        let copied = copy_lines(&b"one\r\ntwo"[..], &mut out).await.unwrap();
        assert_eq!(copied, 2);
        assert_eq!(out, b"one\ntwo\n");
    }

    #[tokio::test]
    async fn output_without_a_log_goes_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let status = run_to_log(
            "/bin/sh",
            &["-c".to_owned(), "echo parsed 3 packets".to_owned()],
            Some(dir.path()),
            None,
        )
        .await
        .unwrap();
        assert!(status.success());
        // Nothing is written next to the tool when no log is asked for
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn exit_status_is_returned() {
        let status = run_to_log("/bin/sh", &["-c".to_owned(), "exit 3".to_owned()], None, None)
            .await
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
