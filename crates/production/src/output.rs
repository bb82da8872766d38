//! Emitting the final benchmark result.

use ledgerbench_types::BenchmarkResult;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write result: {0}")]
    Write(#[from] std::io::Error),
}

/// Serialize the result as JSON, optionally LZ4-compressed with the size
/// prepended.
pub fn encode_result(result: &BenchmarkResult, compress: bool) -> Result<Vec<u8>, OutputError> {
    let json = serde_json::to_vec(result)?;
    if compress {
        Ok(lz4_flex::compress_prepend_size(&json))
    } else {
        Ok(json)
    }
}

/// Write the encoded result to `path`, or stdout if `None`, in one write.
pub fn emit_result(
    result: &BenchmarkResult,
    path: Option<&Path>,
    compress: bool,
) -> Result<(), OutputError> {
    let bytes = encode_result(result, compress)?;
    match path {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            info!(path = %path.display(), bytes = bytes.len(), compress, "Result written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbench_types::{ClientResult, InteractionResult, SecondaryResult};

    fn sample() -> BenchmarkResult {
        let mut done = InteractionResult::unreached();
        done.record_submit(0.5).unwrap();
        done.record_commit(0.75).unwrap();
        BenchmarkResult::new(vec![
            SecondaryResult::new(vec![ClientResult {
                interactions: vec![done, InteractionResult::unreached()],
            }]),
            SecondaryResult::default(),
        ])
    }

    #[test]
    fn test_plain_json_uses_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        emit_result(&sample(), Some(&path), false).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let unreached = &value["secondaries"][0]["clients"][0]["interactions"][1];
        assert_eq!(unreached["submit_time"], -1.0);
        assert_eq!(unreached["commit_time"], -1.0);
        assert_eq!(unreached["abort_time"], -1.0);
        assert_eq!(value["secondaries"][1]["clients"], serde_json::json!([]));
    }

    #[test]
    fn test_compressed_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json.lz4");
        emit_result(&sample(), Some(&path), true).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let json = lz4_flex::decompress_size_prepended(&bytes).unwrap();
        let decoded: BenchmarkResult = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded, sample());
    }
}
