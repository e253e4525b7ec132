//! Pipe server side: accept host connections and decode their frames.

use std::io::Write;

use anyhow::{Context, Result};
use corebridge_ipc::{LogLevel, LogMessage, decode_frame};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::config::OutputFormat;

/// Read newline-delimited frames from one connection until it closes.
/// Malformed lines are logged and skipped. Returns how many frames were
/// forwarded.
pub async fn handle_connection<R>(reader: R, tx: mpsc::Sender<LogMessage>) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match decode_frame(&line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    break;
                }
                forwarded += 1;
            }
            Err(e) => tracing::warn!(error = %e, "Skipping malformed frame"),
        }
    }
    Ok(forwarded)
}

fn spawn_connection<R>(reader: R, tx: mpsc::Sender<LogMessage>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match handle_connection(reader, tx).await {
            Ok(frames) => tracing::debug!(frames, "Host disconnected"),
            Err(e) => tracing::warn!(error = %e, "Connection failed"),
        }
    });
}

/// Accept hosts on `pipe` forever, forwarding every decoded frame to `tx`.
#[cfg(unix)]
pub async fn serve(pipe: &str, tx: mpsc::Sender<LogMessage>) -> Result<()> {
    use tokio::net::UnixListener;

    let path = corebridge_ipc::endpoint_path(pipe)?;
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("Failed to bind {}", path.display()))?;
    tracing::info!(endpoint = %path.display(), "Listening for hosts");

    loop {
        let (stream, _) = listener.accept().await?;
        tracing::debug!("Host connected");
        spawn_connection(stream, tx.clone());
    }
}

/// Accept hosts on `pipe` forever, forwarding every decoded frame to `tx`.
#[cfg(windows)]
pub async fn serve(pipe: &str, tx: mpsc::Sender<LogMessage>) -> Result<()> {
    use tokio::net::windows::named_pipe::ServerOptions;

    let path = corebridge_ipc::endpoint_path(pipe)?;
    let mut server = ServerOptions::new()
        .first_pipe_instance(true)
        .create(&path)
        .with_context(|| format!("Failed to create pipe {}", path.display()))?;
    tracing::info!(endpoint = %path.display(), "Listening for hosts");

    loop {
        server.connect().await?;
        let connected = server;
        server = ServerOptions::new().create(&path)?;
        tracing::debug!("Host connected");
        spawn_connection(connected, tx.clone());
    }
}

/// Report one frame in the chosen format. JSON goes to `out`.
pub fn report(format: OutputFormat, message: &LogMessage, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let sender = message.sender_id;
            let pid = message.process_id;
            let at = message.timestamp.to_rfc3339();
            match message.level {
                LogLevel::Info => tracing::info!(%sender, pid, %at, "{}", message.message),
                LogLevel::Error => tracing::error!(%sender, pid, %at, "{}", message.message),
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, message)?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebridge_ipc::encode_frame;
    use tokio::io::AsyncWriteExt;
    use uuid::Uuid;

    fn frame(level: LogLevel, text: &str) -> Vec<u8> {
        encode_frame(&LogMessage::new(level, text, Uuid::new_v4())).unwrap()
    }

    #[tokio::test]
    async fn forwards_frames_and_skips_garbage() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (tx, mut rx) = mpsc::channel(8);

        let handler = tokio::spawn(handle_connection(server, tx));
        client.write_all(&frame(LogLevel::Info, "started")).await.unwrap();
        client.write_all(b"not json\n\n").await.unwrap();
        client.write_all(&frame(LogLevel::Error, "failed")).await.unwrap();
        drop(client);

        assert_eq!(handler.await.unwrap().unwrap(), 2);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.level, first.message.as_str()), (LogLevel::Info, "started"));
        assert_eq!((second.level, second.message.as_str()), (LogLevel::Error, "failed"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn accepts_crlf_terminated_frames() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (tx, mut rx) = mpsc::channel(8);

        let mut bytes = frame(LogLevel::Info, "windows");
        bytes.pop();
        bytes.extend_from_slice(b"\r\n");
        client.write_all(&bytes).await.unwrap();
        drop(client);

        assert_eq!(handle_connection(server, tx).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().message, "windows");
    }

    #[test]
    fn json_report_is_one_line() {
        let message = LogMessage::new(LogLevel::Error, "boom", Uuid::new_v4());
        let mut out = Vec::new();
        report(OutputFormat::Json, &message, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        assert_eq!(decode_frame(&text).unwrap(), message);
    }

    #[test]
    fn text_report_writes_nothing_to_stdout_sink() {
        let message = LogMessage::new(LogLevel::Info, "quiet", Uuid::new_v4());
        let mut out = Vec::new();
        report(OutputFormat::Text, &message, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn serves_unix_socket_and_replaces_stale_file() {
        use std::time::Duration;
        use tokio::net::UnixStream;

        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("observer.sock");
        std::fs::write(&socket, b"stale").unwrap();
        let pipe = socket.to_str().unwrap().to_string();

        let (tx, mut rx) = mpsc::channel(8);
        let server = tokio::spawn(async move { serve(&pipe, tx).await });

        let mut stream = None;
        for _ in 0..100 {
            if let Ok(s) = UnixStream::connect(&socket).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut stream = stream.expect("server never bound");
        stream.write_all(&frame(LogLevel::Info, "hello")).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.message, "hello");
        server.abort();
    }
}
