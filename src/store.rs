/// Growable sequence of opaque row payloads, the central shared datum of a
/// result.
///
/// Each slot owns one row's encoded bytes, sliced from a freshly received
/// packet buffer — never aliased across fetches, so a span stays decodable
/// for as long as its slot lives. Logical size is tracked apart from
/// capacity; capacity grows by `max(10, capacity * 1.5)` for amortized O(1)
/// append.
#[derive(Debug, Default)]
pub struct RowStore {
    rows: Vec<Box<[u8]>>,
}

impl RowStore {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Append one row span, growing capacity by `max(10, capacity * 1.5)`
    /// when full.
    pub fn push(&mut self, payload: Box<[u8]>) {
        if self.rows.len() == self.rows.capacity() {
            let capacity = self.rows.capacity();
            let grown = (capacity + (capacity >> 1)).max(10);
            self.rows.reserve_exact(grown - capacity);
        }
        self.rows.push(payload);
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.rows.get(index).map(AsRef::as_ref)
    }

    /// Replace the span at `index` with a freshly received payload.
    pub fn replace(&mut self, index: usize, payload: Box<[u8]>) {
        self.rows[index] = payload;
    }

    /// Remove one span, shifting later rows down.
    pub fn remove(&mut self, index: usize) -> Box<[u8]> {
        self.rows.remove(index)
    }

    /// Discard all spans but keep the allocation; the forward-only window
    /// reset between fetches.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
