//! JSON-lines output messages.
//!
//! Each stream produces a `SCHEMA` message, one `RECORD` per record and a
//! closing `STATE` message holding the bookmark snapshot.

use std::io::Write;

use geotap_core::Record;
use serde::Serialize;
use serde_json::Value;

use crate::CliError;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: &'a Value,
        key_properties: &'a [String],
    },
    Record {
        stream: &'a str,
        record: &'a Record,
    },
    State {
        value: &'a Value,
    },
}

impl Message<'_> {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA",
            Self::Record { .. } => "RECORD",
            Self::State { .. } => "STATE",
        }
    }
}

/// Writes one JSON document per line.
pub(crate) struct MessageWriter<W> {
    out: W,
}

impl<W: Write> MessageWriter<W> {
    pub(crate) const fn new(out: W) -> Self {
        Self { out }
    }

    pub(crate) fn schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
    ) -> Result<(), CliError> {
        self.emit(&Message::Schema {
            stream,
            schema,
            key_properties,
        })
    }

    pub(crate) fn record(&mut self, stream: &str, record: &Record) -> Result<(), CliError> {
        self.emit(&Message::Record { stream, record })
    }

    pub(crate) fn state(&mut self, value: &Value) -> Result<(), CliError> {
        self.emit(&Message::State { value })
    }

    pub(crate) fn finish(mut self) -> Result<W, CliError> {
        self.out.flush().map_err(CliError::WriteOutput)?;
        Ok(self.out)
    }

    fn emit(&mut self, message: &Message<'_>) -> Result<(), CliError> {
        serde_json::to_writer(&mut self.out, message).map_err(|source| {
            CliError::SerializeMessage {
                kind: message.kind(),
                source,
            }
        })?;
        self.out.write_all(b"\n").map_err(CliError::WriteOutput)
    }
}
