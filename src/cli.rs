//! Line-oriented operator console.
//!
//! Replies and worker notifications share one output writer, so lines never
//! interleave mid-write.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::commands::{Command, Dispatcher, Reply};
use crate::error::Error;
use crate::pool::WorkerEvent;

/// Feed `input` to the dispatcher one line at a time, writing replies and
/// worker events to `output`.
///
/// Events raised while a command runs are written before that command's
/// reply. Returns after `stop`. End of input is treated the same as `stop`,
/// so the pool is always shut down when this returns `Ok`.
pub async fn run<R, W>(
    dispatcher: &Dispatcher,
    mut events: broadcast::Receiver<WorkerEvent>,
    input: R,
    mut output: W,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut events_open = true;

    loop {
        let line = tokio::select! {
            biased;
            event = events.recv(), if events_open => {
                match event {
                    Ok(event) => write_line(&mut output, &event.to_string()).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Console lagged behind worker events");
                    }
                    Err(RecvError::Closed) => events_open = false,
                }
                continue;
            }
            line = lines.next_line() => line?,
        };

        let reply = match line {
            Some(line) => dispatcher.dispatch(&line).await,
            None => {
                tracing::info!("Input closed, stopping workers");
                dispatcher.execute(Command::Stop).await
            }
        };

        drain_events(&mut events, &mut output).await?;
        write_reply(&mut output, &reply).await?;
        if reply.is_stop() {
            break;
        }
    }

    Ok(())
}

/// Write every event already queued, without waiting for more.
async fn drain_events<W: AsyncWrite + Unpin>(
    events: &mut broadcast::Receiver<WorkerEvent>,
    output: &mut W,
) -> Result<(), Error> {
    loop {
        match events.try_recv() {
            Ok(event) => write_line(output, &event.to_string()).await?,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Console lagged behind worker events");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &Reply) -> Result<(), Error> {
    let text = reply.to_string();
    if text.is_empty() {
        return Ok(());
    }
    write_line(output, &text).await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<(), Error> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pool::{PoolContext, WorkerPool};

    fn dispatcher() -> Dispatcher {
        let ctx = Arc::new(PoolContext::new(Duration::from_secs(1)));
        Dispatcher::new(Arc::new(WorkerPool::new(ctx)))
    }

    async fn run_session(dispatcher: &Dispatcher, input: &[u8]) -> String {
        let events = dispatcher.pool().context().subscribe();
        let mut output = Vec::new();
        run(dispatcher, events, input, &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("{needle:?} missing from {text:?}"))
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_stop_command() {
        let dispatcher = dispatcher();
        let text = run_session(&dispatcher, b"new 7\ninfo\nstop\nnew 8\n").await;

        let spawned = position(&text, "Spawning worker (id=1)\n");
        let listed = position(&text, "Worker (id=1), value = 7\n");
        let finished = position(&text, "Worker (id=1) was finished, value = 7\n");
        assert!(spawned < listed && listed < finished);
        assert!(text.ends_with("All workers stopped.\n"));
        // Nothing after stop is executed
        assert!(!text.contains("id=2"));
        assert!(dispatcher.pool().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn events_and_replies_share_one_writer() {
        let dispatcher = dispatcher();
        let text = run_session(&dispatcher, b"new 1\nkill 1\nstop\n").await;

        assert!(text.contains("Worker (id=1) was started, init value = 1\n"));
        let finished = position(&text, "Worker (id=1) was finished, value = 1\n");
        let killed = position(&text, "Worker (id=1) was killed\n");
        assert!(finished < killed);
        // Every line is whole
        assert!(text.lines().all(|line| !line.is_empty()));
    }

    #[tokio::test]
    async fn end_of_input_shuts_down() {
        let dispatcher = dispatcher();
        run_session(&dispatcher, b"new\n").await;

        assert!(dispatcher.pool().is_closed());
        assert!(dispatcher.pool().is_empty().await);
    }

    #[tokio::test]
    async fn reports_bad_input() {
        let dispatcher = dispatcher();
        let text = run_session(&dispatcher, b"\nkill\nwhat\nstop\n").await;

        assert_eq!(
            text,
            "Please provide worker id\nUnknown command.\nAll workers stopped.\n"
        );
    }
}
