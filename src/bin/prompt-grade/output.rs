use std::io::Write;

use prompt_grader::{cache::CacheStats, BatchSummary, Grade};
use serde_json::{json, Value};

/// Writes one JSON object per row: the grade plus its row number, prompt and
/// error marker.
pub fn write_rows<W: Write>(out: &mut W, prompts: &[String], grades: &[Grade]) -> anyhow::Result<()> {
    for (row, (prompt, grade)) in prompts.iter().zip(grades).enumerate() {
        let mut value = serde_json::to_value(grade)?;
        if let Value::Object(map) = &mut value {
            map.insert("row".into(), row.into());
            map.insert("prompt".into(), prompt.as_str().into());
            if let Some(marker) = grade.marker() {
                map.insert("marker".into(), marker.into());
            }
        }
        serde_json::to_writer(&mut *out, &value)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_summary<W: Write>(
    out: &mut W,
    summary: &BatchSummary,
    cache: CacheStats,
) -> anyhow::Result<()> {
    let report = json!({ "summary": summary, "cache": cache });
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}
