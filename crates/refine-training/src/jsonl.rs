use crate::dataset::{Dataset, TrainingExample};
use crate::error::{TrainingError, TrainingResult};
use std::io::Write;
use std::path::Path;

/// Write one JSON object per line.
pub fn write_jsonl<W: Write>(writer: &mut W, examples: &[TrainingExample]) -> TrainingResult<()> {
    for ex in examples {
        serde_json::to_writer(&mut *writer, ex)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_jsonl_dataset(path: &Path, examples: &[TrainingExample]) -> TrainingResult<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_jsonl(&mut file, examples)
}

pub fn read_jsonl_dataset(path: &Path) -> TrainingResult<Dataset> {
    let contents = std::fs::read_to_string(path)?;
    let mut dataset = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let ex: TrainingExample = serde_json::from_str(line).map_err(|e| {
            TrainingError::Dataset(format!("failed to parse jsonl line {}: {}", idx + 1, e))
        })?;
        dataset.push(ex);
    }

    Ok(dataset)
}
