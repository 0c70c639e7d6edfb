use crate::constant::MAX_FETCH_SIZE;
use crate::error::Result;
use crate::protocol::packet::{EndOfStream, EofSemantics, Packet, classify};
use crate::source::{PacketSource, SharedConnection};
use crate::store::RowStore;

/// Pulls bounded row batches on demand and owns the shared-connection fetch
/// boundary for one streaming result.
///
/// One fetch acquires the connection mutex, appends up to `fetch_size` rows,
/// and releases it; a full drain re-acquires per batch so siblings are never
/// starved across the whole stream.
pub struct FetchController<S> {
    conn: SharedConnection<S>,
    fetch_size: usize,
    fetches_issued: u64,
    end_of_stream: bool,
}

/// Clamp a requested batch size to the hard cap, bounding the memory one
/// fetch can pin regardless of what the caller asked for.
pub fn clamp_fetch_size(requested: usize) -> usize {
    requested.clamp(1, MAX_FETCH_SIZE)
}

impl<S: PacketSource> FetchController<S> {
    pub(crate) fn new(conn: SharedConnection<S>, fetch_size: usize) -> Self {
        Self {
            conn,
            fetch_size: clamp_fetch_size(fetch_size),
            fetches_issued: 0,
            end_of_stream: false,
        }
    }

    pub(crate) fn conn(&self) -> &SharedConnection<S> {
        &self.conn
    }

    pub(crate) fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    pub(crate) fn set_fetch_size(&mut self, requested: usize) {
        self.fetch_size = clamp_fetch_size(requested);
    }

    pub(crate) fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub(crate) fn fetches_issued(&self) -> u64 {
        self.fetches_issued
    }

    /// Pull one batch into `store`.
    ///
    /// Reads until `fetch_size` rows are appended or end-of-stream is hit;
    /// increments `fetches_issued` per issued fetch. Once end-of-stream has
    /// been observed every further call is a no-op. With `discard` set the
    /// local window is dropped first (forward-only mode): the logical size
    /// resets and the first new row lands at local index 0.
    #[tracing::instrument(skip_all)]
    pub(crate) fn fetch_batch(
        &mut self,
        store: &mut RowStore,
        window_base: &mut usize,
        eof: EofSemantics,
        discard: bool,
    ) -> Result<Option<EndOfStream>> {
        if self.end_of_stream {
            return Ok(None);
        }

        let mut guard = self.conn.lock()?;

        if discard {
            *window_base += store.len();
            store.clear();
        }

        self.fetches_issued += 1;

        let mut appended = 0;
        let mut end = None;
        while appended < self.fetch_size {
            let mut payload = Vec::new();
            guard.read_packet(&mut payload)?;
            match classify(&payload, eof)? {
                Packet::Row => {
                    store.push(payload.into_boxed_slice());
                    appended += 1;
                }
                Packet::EndOfStream(eos) => {
                    self.end_of_stream = true;
                    end = Some(eos);
                    break;
                }
                Packet::Err(err) => return Err(err.into()),
            }
        }
        tracing::debug!(appended, end = end.is_some(), "fetched batch");
        Ok(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fetch_size_is_clamped() {
        assert_eq!(clamp_fetch_size(1), 1);
        assert_eq!(clamp_fetch_size(500), 500);
        assert_eq!(clamp_fetch_size(MAX_FETCH_SIZE), MAX_FETCH_SIZE);
        assert_eq!(clamp_fetch_size(MAX_FETCH_SIZE + 1), MAX_FETCH_SIZE);
        assert_eq!(clamp_fetch_size(usize::MAX), MAX_FETCH_SIZE);
    }
}
