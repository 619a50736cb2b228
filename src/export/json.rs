use anyhow::Result;
use std::io::Write;

use crate::state::TraceRecord;

/// Export a trace as pretty-printed JSON
pub fn export_json<W: Write>(record: &TraceRecord, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, record)?;
    writeln!(writer)?;
    Ok(())
}
