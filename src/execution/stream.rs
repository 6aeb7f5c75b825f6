//! Stdout/stderr draining for child processes.
//!
//! Both streams are always read concurrently so a child that fills one
//! pipe cannot stall the other. Capture and live mode share the same
//! buffers; live mode only adds an echo of each chunk as it arrives.

use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use super::result::{OutputChunk, OutputSource};

/// Buffer size for a single read from a child pipe.
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

/// In-memory buffers for both streams, with optional terminal echo.
#[derive(Debug, Default)]
pub(crate) struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    live: bool,
}

impl Capture {
    pub(crate) fn new(live: bool) -> Self {
        Self {
            live,
            ..Default::default()
        }
    }

    /// Append a chunk, echoing it first in live mode.
    pub(crate) fn push(&mut self, chunk: OutputChunk) {
        trace!(source = ?chunk.source, bytes = chunk.raw.len(), "output chunk");
        match chunk.source {
            OutputSource::Stdout => {
                if self.live {
                    echo(&mut io::stdout().lock(), &chunk.raw);
                }
                self.stdout.extend_from_slice(&chunk.raw);
            }
            OutputSource::Stderr => {
                if self.live {
                    echo(&mut io::stderr().lock(), &chunk.raw);
                }
                self.stderr.extend_from_slice(&chunk.raw);
            }
        }
    }

    /// Decode both buffers as text.
    ///
    /// Decoding happens once over the whole buffer so a multi-byte
    /// character split across chunks is never mangled.
    pub(crate) fn into_text(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

// A closed terminal must not abort the run; the bytes are still captured.
fn echo(out: &mut impl Write, raw: &[u8]) {
    if let Err(e) = out.write_all(raw).and_then(|_| out.flush()) {
        debug!("live echo failed: {}", e);
    }
}

/// Read a blocking stream on its own thread, forwarding chunks to `tx`.
///
/// The thread exits on EOF, on a read error, or when the receiver is gone.
pub(crate) fn spawn_reader<R>(
    mut reader: R,
    source: OutputSource,
    tx: mpsc::Sender<OutputChunk>,
) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("zap-{source:?}").to_lowercase())
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(OutputChunk::new(buf[..n].to_vec(), source)).is_err() {
                            debug!("{:?} reader: receiver dropped", source);
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("{:?} reader error: {}", source, e);
                        break;
                    }
                }
            }
        })
}

/// Drain two async streams into `capture` until both reach EOF.
///
/// Uses a single `select!` over both reads; each read is cancel-safe so an
/// outer timeout can drop this future at any point without losing bytes
/// already pushed.
pub(crate) async fn drain_async<O, E>(
    stdout: &mut O,
    stderr: &mut E,
    capture: &mut Capture,
) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; READ_BUFFER_SIZE];
    let mut err_buf = [0u8; READ_BUFFER_SIZE];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read? {
                0 => out_open = false,
                n => capture.push(OutputChunk::stdout(out_buf[..n].to_vec())),
            },
            read = stderr.read(&mut err_buf), if err_open => match read? {
                0 => err_open = false,
                n => capture.push(OutputChunk::stderr(err_buf[..n].to_vec())),
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_capture_separates_streams() {
        let mut capture = Capture::new(false);
        capture.push(OutputChunk::stdout(b"out1 ".to_vec()));
        capture.push(OutputChunk::stderr(b"err".to_vec()));
        capture.push(OutputChunk::stdout(b"out2".to_vec()));

        let (stdout, stderr) = capture.into_text();
        assert_eq!(stdout, "out1 out2");
        assert_eq!(stderr, "err");
    }

    #[test]
    fn test_capture_joins_split_utf8() {
        let bytes = "héllo".as_bytes();
        let mut capture = Capture::new(false);
        capture.push(OutputChunk::stdout(bytes[..2].to_vec()));
        capture.push(OutputChunk::stdout(bytes[2..].to_vec()));

        assert_eq!(capture.into_text().0, "héllo");
    }

    #[test]
    fn test_reader_thread_forwards_all_bytes() {
        let data = vec![b'x'; READ_BUFFER_SIZE * 3 + 17];
        let (tx, rx) = mpsc::channel();
        let handle = spawn_reader(Cursor::new(data.clone()), OutputSource::Stderr, tx).unwrap();

        let mut received = Vec::new();
        for chunk in rx {
            assert_eq!(chunk.source, OutputSource::Stderr);
            received.extend(chunk.raw);
        }
        handle.join().unwrap();
        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_drain_async_reads_both() {
        let mut out = Cursor::new(b"hello\n".to_vec());
        let mut err = Cursor::new(b"warn\n".to_vec());
        let mut capture = Capture::new(false);

        drain_async(&mut out, &mut err, &mut capture).await.unwrap();

        let (stdout, stderr) = capture.into_text();
        assert_eq!(stdout, "hello\n");
        assert_eq!(stderr, "warn\n");
    }
}
