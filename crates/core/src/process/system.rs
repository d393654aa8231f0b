//! Process spawner backed by `tokio::process`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Split};
use tokio::process::{Child, ChildStderr, Command};
use tracing::debug;

use super::error::ProcessError;
use super::traits::{ProcessExit, ProcessSpawner, RunningProcess};

/// Spawns a real encoder binary.
#[derive(Debug, Clone)]
pub struct SystemProcessSpawner {
    program: PathBuf,
}

impl SystemProcessSpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ProcessSpawner for SystemProcessSpawner {
    fn program(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    async fn spawn(&self, args: &[String]) -> Result<Box<dyn RunningProcess>, ProcessError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::from_spawn(&self.program, e))?;

        debug!("Spawned {:?} (pid {:?})", self.program, child.id());

        let stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\r'));
        Ok(Box::new(SystemProcess {
            child,
            stderr,
            pending: VecDeque::new(),
        }))
    }
}

/// A running child process.
///
/// ffmpeg rewrites its stats line with carriage returns, so stderr is split
/// on `\r` first and every chunk again on `\n`.
struct SystemProcess {
    child: Child,
    stderr: Option<Split<BufReader<ChildStderr>>>,
    pending: VecDeque<String>,
}

#[async_trait]
impl RunningProcess for SystemProcess {
    async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }

            let reader = self.stderr.as_mut()?;
            match reader.next_segment().await {
                Ok(Some(chunk)) => {
                    let text = String::from_utf8_lossy(&chunk);
                    self.pending.extend(
                        text.split('\n')
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string),
                    );
                }
                Ok(None) | Err(_) => {
                    self.stderr = None;
                    return None;
                }
            }
        }
    }

    async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        let status = self.child.wait().await?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ProcessError::Io(e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary() {
        let spawner = SystemProcessSpawner::new("/nonexistent/ffmpeg-binary");
        let result = spawner.spawn(&["-version".to_string()]).await;
        assert!(matches!(result, Err(ProcessError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_reads_carriage_return_lines() {
        let spawner = SystemProcessSpawner::new("sh");
        let args = vec![
            "-c".to_string(),
            r"printf 'first\rtime=00:00:01.00\rtime=00:00:02.00\nlast\n' 1>&2; exit 3".to_string(),
        ];
        let mut process = spawner.spawn(&args).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = process.next_line().await {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec!["first", "time=00:00:01.00", "time=00:00:02.00", "last"]
        );

        let exit = process.wait().await.unwrap();
        assert_eq!(exit.code, Some(3));
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn test_kill_running_process() {
        let spawner = SystemProcessSpawner::new("sleep");
        let mut process = spawner.spawn(&["30".to_string()]).await.unwrap();
        process.kill().await.unwrap();
        let exit = process.wait().await.unwrap();
        assert_eq!(exit.code, None);
    }
}
