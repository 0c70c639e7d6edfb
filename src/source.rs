use std::io::BufRead;
use std::sync::{Arc, Mutex, MutexGuard};

use auto_impl::auto_impl;

use crate::error::{Error, Result};

/// Supplier of length-prefixed packets; blocks the calling thread on read.
///
/// One call delivers one whole payload into `buffer` (cleared first),
/// concatenating 16MB continuation packets. Connection establishment and
/// authentication happen before a source is handed to this crate.
#[auto_impl(&mut, Box)]
pub trait PacketSource {
    fn read_packet(&mut self, buffer: &mut Vec<u8>) -> Result<()>;
}

/// Packet source over any buffered reader.
pub struct ReadSource<R> {
    reader: R,
}

impl<R: BufRead> ReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> PacketSource for ReadSource<R> {
    #[tracing::instrument(skip_all)]
    fn read_packet(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.clear();

        let mut header = [0u8; 4];
        self.reader.read_exact(&mut header)?;

        let mut length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;

        loop {
            let start = buffer.len();
            buffer.resize(start + length, 0);
            self.reader.read_exact(&mut buffer[start..])?;

            // A 0xFFFFFF-byte packet continues in the next frame.
            if length != 0xFF_FFFF {
                return Ok(());
            }
            self.reader.read_exact(&mut header)?;
            length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        }
    }
}

/// The connection-scoped fetch boundary.
///
/// One physical connection serves one in-flight command at a time, but a
/// caller may hold several logical cursors from a multi-statement response.
/// Every component that pulls bytes — a streaming fetch here, statement
/// execution elsewhere — must go through this mutex or two readers would
/// corrupt framing. The guard is held for one batch, never across a full
/// drain unless the caller asked for full materialization.
pub struct SharedConnection<S> {
    inner: Arc<Mutex<ConnectionState<S>>>,
}

impl<S> Clone for SharedConnection<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ConnectionState<S> {
    source: S,
    poisoned: bool,
}

impl<S: PacketSource> SharedConnection<S> {
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConnectionState {
                source,
                poisoned: false,
            })),
        }
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ConnectionState<S>>> {
        self.inner.lock().map_err(|_| Error::BrokenConnection)
    }

    /// Force-terminate the connection without touching the wire.
    ///
    /// Every cursor sharing this connection fails with
    /// [`Error::BrokenConnection`] on its next fetch.
    pub fn abort(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.poisoned = true;
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.lock().map(|state| state.poisoned).unwrap_or(true)
    }
}

impl<S: PacketSource> ConnectionState<S> {
    /// Read one payload, poisoning the connection on transport failure.
    ///
    /// Remaining packets of the command are unrecoverable after an IO error,
    /// so every sibling result must observe the failure too.
    pub(crate) fn read_packet(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        if self.poisoned {
            return Err(Error::BrokenConnection);
        }
        match self.source.read_packet(buffer) {
            Ok(()) => Ok(()),
            Err(err) => {
                if matches!(err, Error::IoError(_)) {
                    self.poisoned = true;
                }
                Err(err)
            }
        }
    }
}
