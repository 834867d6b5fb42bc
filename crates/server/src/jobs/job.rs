//! A single remote-pipe job: the subprocess and its byte cursor.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Lifecycle of a job's subprocess.
///
/// `Running` until `/done` closes stdin, `Closed` while waiting (or after a
/// failed wait, so the client may retry), `Reaped` once the child exited
/// cleanly. Removal from the registry is the final step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    Running = 0,
    Closed = 1,
    Reaped = 2,
}

impl JobState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => JobState::Running,
            1 => JobState::Closed,
            _ => JobState::Reaped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Closed => "closed",
            JobState::Reaped => "reaped",
        }
    }
}

/// Outcome of a `/done` round.
#[derive(Debug)]
pub enum DoneOutcome {
    /// First successful close + wait; the caller removes the job.
    Completed(ExitStatus),
    /// The job was already reaped; a retried `/done` gets `ok` again.
    AlreadyDone,
}

/// Mutable body of a job, guarded by the per-job mutex in [`JobEntry`].
struct Body {
    child: Child,
    /// Owned stdin pipe; taken (and thereby closed) by `/done`.
    stdin: Option<ChildStdin>,
    /// Bytes durably written into the child's stdin. Advanced only after a
    /// full write succeeds.
    bytes_processed: u64,
    state: JobState,
}

/// A registered job.
///
/// All request-path mutation goes through the `body` mutex, which is the
/// only road to the child's stdin: at most one upload/resume/done executes
/// at a time for a given job. The atomics mirror the counter and state so
/// the debug listener can snapshot without contending with an in-flight
/// upload.
pub struct JobEntry {
    id: Uuid,
    command: String,
    progress: AtomicU64,
    state_flag: AtomicU8,
    scanners: [JoinHandle<()>; 2],
    body: Mutex<Body>,
}

impl JobEntry {
    /// Spawn `sh -c <command>` with all three stdio pipes and start the
    /// output scanners. The command string is handed to the shell verbatim
    /// so pipelines, redirections, and quoting all work.
    pub fn spawn(command: &str) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
            // Already started; don't leave an orphan behind the error.
            let _ = child.start_kill();
            return Err(io::Error::other("could not acquire subprocess pipes"));
        };

        let scanners = [
            spawn_scanner(id, "stdout", stdout),
            spawn_scanner(id, "stderr", stderr),
        ];

        Ok(Self {
            id,
            command: command.to_string(),
            progress: AtomicU64::new(0),
            state_flag: AtomicU8::new(JobState::Running as u8),
            scanners,
            body: Mutex::new(Body {
                child,
                stdin: Some(stdin),
                bytes_processed: 0,
                state: JobState::Running,
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Write one complete chunk into the subprocess stdin and advance the
    /// cursor. Returns the new total. On error the cursor is unchanged and
    /// the chunk counts as not consumed.
    pub async fn write_chunk(&self, chunk: &[u8]) -> io::Result<u64> {
        let mut body = self.body.lock().await;
        let stdin = body
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::other("job stdin already closed"))?;
        stdin.write_all(chunk).await?;
        stdin.flush().await?;
        body.bytes_processed += chunk.len() as u64;
        self.progress.store(body.bytes_processed, Ordering::Relaxed);
        Ok(body.bytes_processed)
    }

    /// Current resume offset, read under the per-job mutex so the value is
    /// never torn relative to an in-flight upload.
    pub async fn bytes_processed(&self) -> u64 {
        self.body.lock().await.bytes_processed
    }

    /// Close stdin (EOF to the child) and wait for it to exit.
    ///
    /// Idempotent towards retries: once reaped, further calls return
    /// `AlreadyDone`; after a failed wait the job stays `Closed` with stdin
    /// already gone, so a retry skips the close and waits again (tokio
    /// caches the exit status once the child is reaped). A non-zero exit is
    /// reported as an error and leaves the job registered for inspection.
    pub async fn finish(&self) -> io::Result<DoneOutcome> {
        let mut body = self.body.lock().await;
        if body.state == JobState::Reaped {
            return Ok(DoneOutcome::AlreadyDone);
        }

        if let Some(stdin) = body.stdin.take() {
            drop(stdin);
        }
        body.state = JobState::Closed;
        self.state_flag
            .store(JobState::Closed as u8, Ordering::Relaxed);

        let status = body.child.wait().await?;
        if !status.success() {
            return Err(io::Error::other(status.to_string()));
        }

        body.state = JobState::Reaped;
        self.state_flag
            .store(JobState::Reaped as u8, Ordering::Relaxed);
        Ok(DoneOutcome::Completed(status))
    }

    /// Lock-free progress view for the debug listener.
    pub fn progress(&self) -> (u64, JobState) {
        (
            self.progress.load(Ordering::Relaxed),
            JobState::from_u8(self.state_flag.load(Ordering::Relaxed)),
        )
    }

    /// Stop the output scanners. Called when the job is forgotten; the
    /// tasks end on their own at pipe EOF, this just covers removal of a
    /// job whose child is still running.
    pub fn abort_scanners(&self) {
        for scanner in &self.scanners {
            scanner.abort();
        }
    }
}

/// Forward each line of a child output stream to the log, tagged with the
/// job id and stream name, until the pipe closes.
fn spawn_scanner<R>(id: Uuid, stream: &'static str, source: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(source).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => tracing::info!(job_id = %id, stream, "{line}"),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(job_id = %id, stream, error = %err, "output scanner failed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_finish_reaps_child() {
        let job = JobEntry::spawn("cat > /dev/null").unwrap();
        assert_eq!(job.write_chunk(b"hello world\n").await.unwrap(), 12);
        assert_eq!(job.bytes_processed().await, 12);

        match job.finish().await.unwrap() {
            DoneOutcome::Completed(status) => assert!(status.success()),
            DoneOutcome::AlreadyDone => panic!("first finish must reap"),
        }
        let (bytes, state) = job.progress();
        assert_eq!(bytes, 12);
        assert_eq!(state, JobState::Reaped);
    }

    #[tokio::test]
    async fn test_finish_is_idempotent_after_reap() {
        let job = JobEntry::spawn("cat > /dev/null").unwrap();
        assert!(matches!(
            job.finish().await.unwrap(),
            DoneOutcome::Completed(_)
        ));
        assert!(matches!(
            job.finish().await.unwrap(),
            DoneOutcome::AlreadyDone
        ));
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_job_closed() {
        let job = JobEntry::spawn("exit 3").unwrap();
        let err = job.finish().await.unwrap_err();
        assert!(err.to_string().contains('3'), "got: {err}");
        let (_, state) = job.progress();
        assert_eq!(state, JobState::Closed);

        // A retried done re-waits on the cached status and fails the same way.
        assert!(job.finish().await.is_err());
    }

    #[tokio::test]
    async fn test_write_after_close_does_not_advance_cursor() {
        let job = JobEntry::spawn("exit 3").unwrap();
        let _ = job.finish().await;
        assert!(job.write_chunk(b"late").await.is_err());
        assert_eq!(job.bytes_processed().await, 0);
    }

    #[tokio::test]
    async fn test_scanner_forwards_output_until_eof() {
        // The child writes a line and exits; finish succeeds and the
        // scanners terminate at pipe EOF without being aborted.
        let job = JobEntry::spawn("echo hi").unwrap();
        assert!(matches!(
            job.finish().await.unwrap(),
            DoneOutcome::Completed(_)
        ));
    }
}
