use std::sync::Arc;

use smart_default::SmartDefault;

use crate::error::{Error, NotUpdatableReason, Result};
use crate::fetch::FetchController;
use crate::field::{Encoding, FieldScratch};
use crate::mutation::{self, Executor, Mutation, MutationState};
use crate::protocol::column::{Column, ColumnSet};
use crate::protocol::packet::{EndOfStream, EofSemantics, Packet, classify};
use crate::protocol::primitive::read_int_lenenc;
use crate::source::{ConnectionState, PacketSource, SharedConnection};
use crate::store::RowStore;
use crate::value::{Decode, Param};

/// Per-result wire options, fixed by the command that produced the stream.
#[derive(Debug, Clone, Copy, SmartDefault)]
pub struct ResultOptions {
    /// Which end-of-stream sub-format the connection negotiated.
    #[default(EofSemantics::Deprecated)]
    pub eof: EofSemantics,
    /// Text rows (plain queries) or binary rows (prepared statements).
    #[default(Encoding::Text)]
    pub encoding: Encoding,
}

/// Fetch strategy of a result set.
///
/// One result type with an explicit strategy object instead of an inheritance
/// ladder: buffered results are fully materialized at construction, streaming
/// results pull batches through their controller until demoted.
enum FetchMode<S> {
    Buffered,
    Streaming(FetchController<S>),
}

/// A navigable, typed cursor over one result's row stream.
///
/// Construction reads the column metadata; the buffered assembly then drains
/// the rows to exhaustion while the streaming assembly leaves them on the
/// wire and fetches on demand. Position lives in `[-1, size]` where `-1` is
/// before-first and `size` is after-last.
pub struct ResultSet<S> {
    columns: Arc<ColumnSet>,
    store: RowStore,
    /// Global index of the first locally buffered row. Nonzero only after
    /// forward-only window discards.
    window_base: usize,
    /// Total row count, known once end-of-stream has been observed.
    total: Option<usize>,
    /// Cursor position in `[-1, total]`; written only by navigation.
    pos: i64,
    scratch: FieldScratch,
    fetch: FetchMode<S>,
    end: EndOfStream,
    encoding: Encoding,
    eof: EofSemantics,
    forward_only: bool,
    closed: bool,
    /// Set on transport failure: the whole result is poisoned, not just the
    /// fetch that died.
    broken: bool,
    pub(crate) mutation: Option<Mutation>,
}

impl<S: PacketSource> ResultSet<S> {
    /// Buffered assembly: drain the whole row stream at construction.
    ///
    /// The fetch mutex is held across the drain; this is the one case where
    /// full materialization was explicitly requested.
    pub fn buffered(conn: SharedConnection<S>, opts: ResultOptions) -> Result<Self> {
        let (columns, store, end) = {
            let mut guard = conn.lock()?;
            let columns = read_metadata(&mut guard, opts.eof)?;
            let mut store = RowStore::new();
            let end = drain_rows(&mut guard, opts.eof, &mut store)?;
            (columns, store, end)
        };
        let total = store.len();
        Ok(Self {
            columns: Arc::new(columns),
            store,
            window_base: 0,
            total: Some(total),
            pos: -1,
            scratch: FieldScratch::default(),
            fetch: FetchMode::Buffered,
            end,
            encoding: opts.encoding,
            eof: opts.eof,
            forward_only: false,
            closed: false,
            broken: false,
            mutation: None,
        })
    }

    /// Streaming assembly: read only the metadata now, pull rows in bounded
    /// batches as the cursor advances.
    pub fn streaming(
        conn: SharedConnection<S>,
        opts: ResultOptions,
        fetch_size: usize,
        forward_only: bool,
    ) -> Result<Self> {
        let columns = {
            let mut guard = conn.lock()?;
            read_metadata(&mut guard, opts.eof)?
        };
        Ok(Self {
            columns: Arc::new(columns),
            store: RowStore::new(),
            window_base: 0,
            total: None,
            pos: -1,
            scratch: FieldScratch::default(),
            fetch: FetchMode::Streaming(FetchController::new(conn, fetch_size)),
            end: EndOfStream::default(),
            encoding: opts.encoding,
            eof: opts.eof,
            forward_only,
            closed: false,
            broken: false,
            mutation: None,
        })
    }

    /// Buffered assembly with single-row write-back.
    ///
    /// The updatability precondition is checked here, once: the result must
    /// span exactly one table and expose a discoverable primary key. On
    /// failure the cursor still works; every mutation entry point reports
    /// the recorded reason instead.
    pub fn updatable<E: Executor>(
        conn: SharedConnection<S>,
        opts: ResultOptions,
        exec: &mut E,
    ) -> Result<Self> {
        let mut rs = Self::buffered(conn, opts)?;
        let meta = mutation::discover(&rs.columns, exec)?;
        rs.mutation = Some(Mutation::new(meta));
        Ok(rs)
    }

    // ─── Metadata reflection ─────────────────────────────────────────────

    pub fn columns(&self) -> &[Column] {
        self.columns.columns()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn warnings(&self) -> u16 {
        self.end.warnings
    }

    pub fn more_results_exists(&self) -> bool {
        self.end.more_results_exists()
    }

    pub fn output_parameters(&self) -> bool {
        self.end.output_parameters()
    }

    /// 1-based number of the current row; 0 when not positioned on a row.
    pub fn row_number(&self) -> usize {
        if self.pos < 0 {
            return 0;
        }
        if self.total.is_some_and(|t| self.pos >= t as i64) {
            return 0;
        }
        (self.pos + 1) as usize
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    /// Advance to the next row; at the edge of the local window a streaming
    /// cursor pulls one more batch under the fetch mutex.
    pub fn next(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.on_reposition();
        let target = self.pos + 1;
        loop {
            let local_end = self.local_end();
            if target < local_end {
                self.pos = target;
                return Ok(true);
            }
            if self.stream_ended() {
                self.pos = self.total.map_or(local_end, |t| t as i64);
                return Ok(false);
            }
            let discard = self.forward_only;
            self.fetch_batch_into_window(discard)?;
        }
    }

    /// Move back one row. Backward navigation never touches the wire; a
    /// scrollable cursor keeps every fetched row local.
    pub fn previous(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        self.on_reposition();
        if self.pos <= 0 {
            self.pos = -1;
            return Ok(false);
        }
        self.pos -= 1;
        Ok(true)
    }

    pub fn first(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        if self.local_end() == 0 && !self.stream_ended() {
            self.fetch_one_batch()?;
        }
        self.on_reposition();
        if self.local_end() == 0 {
            return Ok(false);
        }
        self.pos = 0;
        Ok(true)
    }

    pub fn last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        self.fetch_remaining()?;
        self.on_reposition();
        let total = self.local_end();
        if total == 0 {
            return Ok(false);
        }
        self.pos = total - 1;
        Ok(true)
    }

    /// Position on the 1-based row `n`; negative `n` counts from the end.
    ///
    /// `n = 0` parks before-first and returns false; beyond-the-end parks
    /// after-last and returns false.
    pub fn absolute(&mut self, n: i64) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        self.fetch_remaining()?;
        self.on_reposition();
        let size = self.local_end();
        if n == 0 {
            self.pos = -1;
            return Ok(false);
        }
        if n > 0 {
            if n <= size {
                self.pos = n - 1;
                return Ok(true);
            }
            self.pos = size;
            return Ok(false);
        }
        let index = size + n;
        if index >= 0 {
            self.pos = index;
            return Ok(true);
        }
        self.pos = -1;
        Ok(false)
    }

    /// Move `k` rows from the current position, clamping to before-first or
    /// after-last (with false) when out of bounds.
    pub fn relative(&mut self, k: i64) -> Result<bool> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        self.fetch_remaining()?;
        self.on_reposition();
        let size = self.local_end();
        let new = self.pos + k;
        if new < 0 {
            self.pos = -1;
            return Ok(false);
        }
        if new >= size {
            self.pos = size;
            return Ok(false);
        }
        self.pos = new;
        Ok(true)
    }

    pub fn before_first(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        self.on_reposition();
        self.pos = -1;
        Ok(())
    }

    pub fn after_last(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.ensure_scrollable()?;
        self.fetch_remaining()?;
        self.on_reposition();
        self.pos = self.local_end();
        Ok(())
    }

    // ─── Position predicates ─────────────────────────────────────────────

    pub fn is_before_first(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.pos == -1)
    }

    /// An empty result never satisfies after-last positively, even when the
    /// cursor has been advanced past its zero rows. Callers rely on this
    /// wire-derived asymmetry with `is_before_first`.
    pub fn is_after_last(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self
            .total
            .is_some_and(|t| t > 0 && self.pos == t as i64))
    }

    pub fn is_first(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.pos == 0 && self.local_end() > 0)
    }

    /// Before end-of-stream this is undecidable without looking ahead, so a
    /// streaming cursor eagerly pulls one batch.
    pub fn is_last(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.pos < 0 {
            return Ok(false);
        }
        if self.pos + 1 == self.local_end() && !self.stream_ended() {
            self.fetch_one_batch()?;
        }
        match self.total {
            Some(t) => Ok(t > 0 && self.pos == t as i64 - 1),
            None => Ok(self.pos + 1 == self.local_end() && self.stream_ended()),
        }
    }

    // ─── Fetch control ───────────────────────────────────────────────────

    /// Drain all outstanding batches. Required before issuing another
    /// command on the shared connection and before a full scroll; acquires
    /// the fetch mutex per batch, never across the whole drain.
    pub fn fetch_remaining(&mut self) -> Result<()> {
        self.ensure_open()?;
        while !self.stream_ended() {
            self.fetch_batch_into_window(false)?;
        }
        Ok(())
    }

    /// Request a batch size; `0` forces a full drain and permanently demotes
    /// the cursor to buffered behavior. Nonzero requests are clamped to the
    /// hard cap.
    pub fn set_fetch_size(&mut self, requested: usize) -> Result<()> {
        self.ensure_open()?;
        match &mut self.fetch {
            FetchMode::Buffered => return Ok(()),
            FetchMode::Streaming(ctl) => {
                if requested > 0 {
                    ctl.set_fetch_size(requested);
                    return Ok(());
                }
            }
        }
        self.fetch_remaining()?;
        self.fetch = FetchMode::Buffered;
        Ok(())
    }

    /// Effective batch size; 0 once fully materialized.
    pub fn fetch_size(&self) -> usize {
        match &self.fetch {
            FetchMode::Buffered => 0,
            FetchMode::Streaming(ctl) => ctl.fetch_size(),
        }
    }

    pub fn fetches_issued(&self) -> u64 {
        match &self.fetch {
            FetchMode::Buffered => 0,
            FetchMode::Streaming(ctl) => ctl.fetches_issued(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Graceful close. A streaming cursor first drains its remaining
    /// batches, skip-and-discard, so the shared connection stays consistent
    /// for the next command. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let FetchMode::Streaming(ctl) = &mut self.fetch {
            while !ctl.end_of_stream() {
                match ctl.fetch_batch(&mut self.store, &mut self.window_base, self.eof, true) {
                    Ok(end) => {
                        if let Some(eos) = end {
                            self.end = eos;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "discarding streaming remainder failed");
                        break;
                    }
                }
            }
        }
        self.store.clear();
        self.closed = true;
    }

    /// Force termination without touching the wire. An unread streaming
    /// remainder makes the shared connection unusable, so it is poisoned;
    /// every sibling surfaces a terminal failure on next access.
    pub fn abort(&mut self) {
        if self.closed {
            return;
        }
        if let FetchMode::Streaming(ctl) = &self.fetch {
            if !ctl.end_of_stream() {
                ctl.conn().abort();
            }
        }
        self.store.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ─── Typed getters ───────────────────────────────────────────────────

    /// Decode the field at the 1-based `index` of the current row.
    ///
    /// The engine locates the value bytes and the was-null flag; decoding is
    /// delegated to the [`Decode`] impl for `T`.
    pub fn get<'a, T: Decode<'a>>(&'a mut self, index: usize) -> Result<T> {
        self.ensure_open()?;
        let local = self.current_local_index()?;
        let col = self.columns.column(index)?;
        let row = self.store.get(local).ok_or(Error::NoCurrentRow)?;
        let mut scratch = self.scratch;
        let field = scratch.locate(row, self.columns.columns(), self.encoding, index - 1)?;
        self.scratch = scratch;
        T::decode(col, self.encoding, field)
    }

    /// Decode by case-insensitive column label; resolution is cached after
    /// the first lookup.
    pub fn get_by_label<'a, T: Decode<'a>>(&'a mut self, label: &str) -> Result<T> {
        let index = self.columns.index_of_label(label)?;
        self.get(index)
    }

    /// Whether the last located field was NULL.
    pub fn was_null(&self) -> bool {
        self.scratch.last_null()
    }

    // ─── Write-back ──────────────────────────────────────────────────────

    /// Stage a column value for the current row (or the insert row).
    pub fn stage_update(&mut self, index: usize, value: Param) -> Result<()> {
        self.ensure_open()?;
        self.updatable_meta()?;
        self.columns.column(index)?;
        let staging_insert = self.mutation_state() == Some(MutationState::StagingInsert);
        if !staging_insert {
            self.current_local_index()?;
        }
        let m = self.mutation.as_mut().ok_or(Error::NotUpdatable(NotUpdatableReason::ReadOnly))?;
        if !staging_insert {
            m.state = MutationState::StagingUpdate;
        }
        m.staged.insert(index - 1, value);
        Ok(())
    }

    /// Execute `UPDATE .. SET <staged> WHERE <pk>` for the current row, then
    /// re-select it by primary key so server-applied defaults, triggers and
    /// generated columns are observed. Clears staging.
    #[tracing::instrument(skip_all)]
    pub fn commit_update<E: Executor>(&mut self, exec: &mut E) -> Result<()> {
        self.ensure_open()?;
        let meta = self.updatable_meta()?;
        if self.mutation_state() == Some(MutationState::StagingInsert) {
            return Err(Error::OnInsertRow);
        }
        let staged = self.staged_snapshot();
        if staged.is_empty() {
            return Err(Error::NothingStaged);
        }
        let local = self.current_local_index()?;

        // The predicate matches the row as currently materialized; staged
        // values only apply to the re-select key.
        let where_params = self.pk_params(&meta, local, None)?;
        let sql = mutation::build_update(&meta, self.columns.columns(), &staged);
        let mut params: Vec<Param> = staged.iter().map(|(_, p)| p.clone()).collect();
        params.extend(where_params);
        exec.execute(&sql, &params)?;

        let refreshed_key = self.pk_params(&meta, local, Some(staged.as_slice()))?;
        let select = mutation::build_select_by_pk(&meta, self.columns.columns());
        if let Some(row) = exec.query_one(&select, &refreshed_key, self.encoding)? {
            self.store.replace(local, row);
        }
        self.scratch.reset();
        if let Some(m) = &mut self.mutation {
            m.staged.clear();
            m.state = MutationState::Updated;
        }
        Ok(())
    }

    /// Save the current position and start staging a new row.
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.updatable_meta()?;
        let pos = self.pos;
        if let Some(m) = &mut self.mutation {
            m.saved_pos = pos;
            m.staged.clear();
            m.state = MutationState::StagingInsert;
        }
        Ok(())
    }

    /// Leave the insert row, restoring the saved position and dropping any
    /// staged values.
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.updatable_meta()?;
        if let Some(m) = &mut self.mutation {
            if m.state == MutationState::StagingInsert {
                self.pos = m.saved_pos;
            }
            m.staged.clear();
            m.state = MutationState::Standard;
        }
        Ok(())
    }

    /// Execute an INSERT covering the staged columns. Unstaged columns are
    /// omitted (auto-increment or server default) or filled with an explicit
    /// NULL when nullable; otherwise the whole operation fails. The new row
    /// joins the store — via RETURNING when the dialect supports it, else by
    /// re-selecting the generated or supplied key.
    #[tracing::instrument(skip_all)]
    pub fn commit_insert<E: Executor>(&mut self, exec: &mut E) -> Result<()> {
        self.ensure_open()?;
        let meta = self.updatable_meta()?;
        if self.mutation_state() != Some(MutationState::StagingInsert) {
            return Err(Error::NotOnInsertRow);
        }
        let staged = self.staged_snapshot();
        let (sql, params) = mutation::build_insert(&meta, self.columns.columns(), &staged)?;

        if exec.supports_insert_returning() {
            let sql = mutation::with_returning(&sql, self.columns.columns());
            if let Some(row) = exec.query_one(&sql, &params, self.encoding)? {
                self.append_row(row);
            }
        } else {
            let outcome = exec.execute(&sql, &params)?;
            if let Some(key) = mutation::insert_key(&meta, self.columns.columns(), &staged, &outcome)
            {
                let select = mutation::build_select_by_pk(&meta, self.columns.columns());
                if let Some(row) = exec.query_one(&select, &key, self.encoding)? {
                    self.append_row(row);
                }
            }
        }

        self.scratch.reset();
        if let Some(m) = &mut self.mutation {
            self.pos = m.saved_pos;
            m.staged.clear();
            m.state = MutationState::Inserted;
        }
        Ok(())
    }

    /// DELETE the current row by primary key, drop its span from the store,
    /// and reposition to the previous row so iteration continues via
    /// [`ResultSet::next`].
    #[tracing::instrument(skip_all)]
    pub fn commit_delete<E: Executor>(&mut self, exec: &mut E) -> Result<()> {
        self.ensure_open()?;
        let meta = self.updatable_meta()?;
        if self.mutation_state() == Some(MutationState::StagingInsert) {
            return Err(Error::OnInsertRow);
        }
        let local = self.current_local_index()?;
        let key = self.pk_params(&meta, local, None)?;
        let sql = mutation::build_delete(&meta, self.columns.columns());
        exec.execute(&sql, &key)?;

        self.store.remove(local);
        self.total = self.total.map(|t| t - 1);
        self.pos -= 1;
        self.scratch.reset();
        if let Some(m) = &mut self.mutation {
            m.staged.clear();
            m.state = MutationState::Standard;
        }
        Ok(())
    }

    /// Re-select the current row by primary key, discarding staged values.
    pub fn refresh_row<E: Executor>(&mut self, exec: &mut E) -> Result<()> {
        self.ensure_open()?;
        let meta = self.updatable_meta()?;
        if self.mutation_state() == Some(MutationState::StagingInsert) {
            return Err(Error::OnInsertRow);
        }
        let local = self.current_local_index()?;
        let key = self.pk_params(&meta, local, None)?;
        let select = mutation::build_select_by_pk(&meta, self.columns.columns());
        let row = exec
            .query_one(&select, &key, self.encoding)?
            .ok_or(Error::NoCurrentRow)?;
        self.store.replace(local, row);
        self.scratch.reset();
        if let Some(m) = &mut self.mutation {
            m.staged.clear();
            m.state = MutationState::Standard;
        }
        Ok(())
    }

    /// Drop staged update values without executing anything.
    pub fn cancel_updates(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.updatable_meta()?;
        if self.mutation_state() == Some(MutationState::StagingInsert) {
            return Err(Error::OnInsertRow);
        }
        if let Some(m) = &mut self.mutation {
            m.staged.clear();
            m.state = MutationState::Standard;
        }
        Ok(())
    }

    pub fn row_updated(&self) -> bool {
        self.mutation_state() == Some(MutationState::Updated)
    }

    pub fn row_inserted(&self) -> bool {
        self.mutation_state() == Some(MutationState::Inserted)
    }

    pub fn mutation_state(&self) -> Option<MutationState> {
        self.mutation.as_ref().map(|m| m.state)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.broken {
            return Err(Error::BrokenConnection);
        }
        Ok(())
    }

    fn ensure_scrollable(&self) -> Result<()> {
        if self.forward_only {
            return Err(Error::ForwardOnly);
        }
        Ok(())
    }

    fn local_end(&self) -> i64 {
        (self.window_base + self.store.len()) as i64
    }

    fn stream_ended(&self) -> bool {
        match &self.fetch {
            FetchMode::Buffered => true,
            FetchMode::Streaming(ctl) => ctl.end_of_stream(),
        }
    }

    fn fetch_one_batch(&mut self) -> Result<()> {
        self.fetch_batch_into_window(false)
    }

    fn fetch_batch_into_window(&mut self, discard: bool) -> Result<()> {
        if let FetchMode::Streaming(ctl) = &mut self.fetch {
            match ctl.fetch_batch(&mut self.store, &mut self.window_base, self.eof, discard) {
                Ok(Some(eos)) => {
                    self.end = eos;
                    self.total = Some(self.window_base + self.store.len());
                }
                Ok(None) => {}
                Err(err) => {
                    if matches!(err, Error::IoError(_) | Error::BrokenConnection) {
                        self.broken = true;
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Reset decode scratch and mutation staging; an interrupted insert
    /// staging reverts to the saved pre-insert position.
    fn on_reposition(&mut self) {
        self.scratch.reset();
        if let Some(m) = &mut self.mutation {
            if m.state == MutationState::StagingInsert {
                self.pos = m.saved_pos;
            }
            m.staged.clear();
            m.state = MutationState::Standard;
        }
    }

    fn current_local_index(&self) -> Result<usize> {
        if self.pos < 0 {
            return Err(Error::NoCurrentRow);
        }
        let pos = self.pos as usize;
        if self.total.is_some_and(|t| pos >= t) {
            return Err(Error::NoCurrentRow);
        }
        let local = pos.checked_sub(self.window_base).ok_or(Error::NoCurrentRow)?;
        if local >= self.store.len() {
            return Err(Error::NoCurrentRow);
        }
        Ok(local)
    }

    fn updatable_meta(&self) -> Result<mutation::UpdatableMeta> {
        match &self.mutation {
            None => Err(Error::NotUpdatable(NotUpdatableReason::ReadOnly)),
            Some(m) => m.meta.clone().map_err(Error::NotUpdatable),
        }
    }

    fn staged_snapshot(&self) -> Vec<(usize, Param)> {
        self.mutation
            .as_ref()
            .map(|m| m.staged.iter().map(|(i, p)| (*i, p.clone())).collect())
            .unwrap_or_default()
    }

    /// Decode the primary key of the row at `local` into parameters, with
    /// staged values taking precedence when provided.
    fn pk_params(
        &self,
        meta: &mutation::UpdatableMeta,
        local: usize,
        staged: Option<&[(usize, Param)]>,
    ) -> Result<Vec<Param>> {
        let row = self.store.get(local).ok_or(Error::NoCurrentRow)?;
        let mut params = Vec::with_capacity(meta.pk_columns.len());
        let mut scratch = FieldScratch::default();
        for &col_idx in &meta.pk_columns {
            if let Some(staged) = staged {
                if let Some((_, param)) = staged.iter().find(|(i, _)| *i == col_idx) {
                    params.push(param.clone());
                    continue;
                }
            }
            let field = scratch.locate(row, self.columns.columns(), self.encoding, col_idx)?;
            let value =
                crate::value::Value::decode(&self.columns.columns()[col_idx], self.encoding, field)?;
            params.push(value.to_param());
        }
        Ok(params)
    }

    fn append_row(&mut self, row: Box<[u8]>) {
        self.store.push(row);
        self.total = Some(self.window_base + self.store.len());
    }
}

/// Read the column metadata phase: the column count packet, one definition
/// packet per column, and the legacy column-phase terminator when the
/// connection still uses it.
fn read_metadata<S: PacketSource>(
    guard: &mut ConnectionState<S>,
    eof: EofSemantics,
) -> Result<ColumnSet> {
    let mut buffer = Vec::new();
    guard.read_packet(&mut buffer)?;
    match buffer.first() {
        None => return Err(Error::InvalidPacket),
        Some(0xFF) => {
            return Err(crate::protocol::packet::read_err_packet(&buffer)?.into());
        }
        // OK and LOCAL INFILE responses carry no row stream.
        Some(0x00) | Some(0xFB) => return Err(Error::InvalidPacket),
        Some(_) => {}
    }
    let (column_count, _) = read_int_lenenc(&buffer)?;

    let mut packets = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        let mut packet = Vec::new();
        guard.read_packet(&mut packet)?;
        packets.push(packet);
    }

    if eof == EofSemantics::Legacy {
        // Terminator between column definitions and rows; status not relevant.
        guard.read_packet(&mut buffer)?;
    }

    ColumnSet::parse(packets.iter().map(Vec::as_slice))
}

/// Drain a row stream to exhaustion into `store`, returning the terminal
/// status.
fn drain_rows<S: PacketSource>(
    guard: &mut ConnectionState<S>,
    eof: EofSemantics,
    store: &mut RowStore,
) -> Result<EndOfStream> {
    loop {
        let mut payload = Vec::new();
        guard.read_packet(&mut payload)?;
        match classify(&payload, eof)? {
            Packet::Row => store.push(payload.into_boxed_slice()),
            Packet::EndOfStream(eos) => return Ok(eos),
            Packet::Err(err) => return Err(err.into()),
        }
    }
}
