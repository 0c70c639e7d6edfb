//! Wire-stream builders and a mock executor shared by the integration tests.

use std::io::Cursor;

use mysql_rowset::constant::{ColumnFlags, ColumnType};
use mysql_rowset::mutation::ExecOutcome;
use mysql_rowset::{
    Encoding, EofSemantics, Executor, Param, ReadSource, Result, ResultOptions, ResultSet,
    SharedConnection,
};

pub type TestSource = ReadSource<Cursor<Vec<u8>>>;

pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xFC);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value < (1 << 24) {
        out.push(0xFD);
        out.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
    } else {
        out.push(0xFE);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

pub fn write_bytes_lenenc(out: &mut Vec<u8>, bytes: &[u8]) {
    write_int_lenenc(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Wrap one payload in a wire frame (3-byte length + sequence id).
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes()[..3].to_vec();
    out.push(0);
    out.extend_from_slice(payload);
    out
}

pub fn column_packet(
    schema: &str,
    table: &str,
    name: &str,
    column_type: ColumnType,
    flags: ColumnFlags,
) -> Vec<u8> {
    let mut out = Vec::new();
    write_bytes_lenenc(&mut out, b"def");
    write_bytes_lenenc(&mut out, schema.as_bytes());
    write_bytes_lenenc(&mut out, table.as_bytes());
    write_bytes_lenenc(&mut out, table.as_bytes());
    write_bytes_lenenc(&mut out, name.as_bytes());
    write_bytes_lenenc(&mut out, name.as_bytes());
    out.push(0x0C);
    out.extend_from_slice(&33u16.to_le_bytes());
    out.extend_from_slice(&255u32.to_le_bytes());
    out.push(column_type as u8);
    out.extend_from_slice(&flags.bits().to_le_bytes());
    out.push(0);
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

pub fn text_row_payload(fields: &[Option<&[u8]>]) -> Vec<u8> {
    let mut out = Vec::new();
    for field in fields {
        match field {
            None => out.push(0xFB),
            Some(bytes) => write_bytes_lenenc(&mut out, bytes),
        }
    }
    out
}

pub fn end_of_stream_payload(eof: EofSemantics, status: u16, warnings: u16) -> Vec<u8> {
    match eof {
        EofSemantics::Legacy => {
            let mut out = vec![0xFE];
            out.extend_from_slice(&warnings.to_le_bytes());
            out.extend_from_slice(&status.to_le_bytes());
            out
        }
        EofSemantics::Deprecated => {
            let mut out = vec![0xFE, 0x00, 0x00];
            out.extend_from_slice(&status.to_le_bytes());
            out.extend_from_slice(&warnings.to_le_bytes());
            out
        }
    }
}

/// A whole framed text-protocol result stream.
pub fn text_result_stream(
    specs: &[(&str, &str, &str, ColumnType, ColumnFlags)],
    rows: &[Vec<Option<&[u8]>>],
    eof: EofSemantics,
) -> Vec<u8> {
    let mut stream = Vec::new();
    let mut count = Vec::new();
    write_int_lenenc(&mut count, specs.len() as u64);
    stream.extend_from_slice(&frame(&count));
    for (schema, table, name, ty, flags) in specs {
        stream.extend_from_slice(&frame(&column_packet(schema, table, name, *ty, *flags)));
    }
    if eof == EofSemantics::Legacy {
        stream.extend_from_slice(&frame(&end_of_stream_payload(eof, 0, 0)));
    }
    for row in rows {
        stream.extend_from_slice(&frame(&text_row_payload(row)));
    }
    stream.extend_from_slice(&frame(&end_of_stream_payload(eof, 0, 0)));
    stream
}

pub fn connection(stream: Vec<u8>) -> SharedConnection<TestSource> {
    SharedConnection::new(ReadSource::new(Cursor::new(stream)))
}

/// Columns of the canonical `(name VARCHAR, qty INT)` test table.
pub fn name_qty_specs() -> Vec<(&'static str, &'static str, &'static str, ColumnType, ColumnFlags)>
{
    vec![
        (
            "db",
            "t",
            "name",
            ColumnType::MYSQL_TYPE_VAR_STRING,
            ColumnFlags::empty(),
        ),
        ("db", "t", "qty", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty()),
    ]
}

/// Buffered result over rows `[("a",1),("b",2),("c",3)]`.
pub fn abc_result() -> ResultSet<TestSource> {
    let rows = vec![
        vec![Some(&b"a"[..]), Some(&b"1"[..])],
        vec![Some(&b"b"[..]), Some(&b"2"[..])],
        vec![Some(&b"c"[..]), Some(&b"3"[..])],
    ];
    let stream = text_result_stream(&name_qty_specs(), &rows, EofSemantics::Deprecated);
    ResultSet::buffered(connection(stream), ResultOptions::default()).unwrap()
}

/// Executor double recording every statement it is handed.
#[derive(Default)]
pub struct MockExecutor {
    pub pk: Vec<String>,
    pub supports_returning: bool,
    pub executed: Vec<(String, Vec<Param>)>,
    pub queried: Vec<(String, Vec<Param>)>,
    /// Text row returned by the next `query_one` calls.
    pub select_row: Option<Vec<Option<Vec<u8>>>>,
    pub last_insert_id: u64,
}

impl MockExecutor {
    pub fn with_pk(pk: &[&str]) -> Self {
        Self {
            pk: pk.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Executor for MockExecutor {
    fn execute(&mut self, sql: &str, params: &[Param]) -> Result<ExecOutcome> {
        self.executed.push((sql.to_string(), params.to_vec()));
        Ok(ExecOutcome {
            affected_rows: 1,
            last_insert_id: self.last_insert_id,
        })
    }

    fn query_one(
        &mut self,
        sql: &str,
        params: &[Param],
        _encoding: Encoding,
    ) -> Result<Option<Box<[u8]>>> {
        self.queried.push((sql.to_string(), params.to_vec()));
        Ok(self.select_row.as_ref().map(|fields| {
            let borrowed: Vec<Option<&[u8]>> =
                fields.iter().map(|f| f.as_deref()).collect();
            text_row_payload(&borrowed).into_boxed_slice()
        }))
    }

    fn primary_key(&mut self, _schema: &str, _table: &str) -> Result<Vec<String>> {
        Ok(self.pk.clone())
    }

    fn supports_insert_returning(&self) -> bool {
        self.supports_returning
    }
}
