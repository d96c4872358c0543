//! 外部コマンドによる検出
//!
//! 設定された検出コマンドの末尾に一時画像ファイルのパスを追加して実行し、
//! 標準出力のJSON（```json ブロックでも可）を読み取る。

use super::Detector;
use crate::error::{MoxError, Result};
use mox_common::{parse_detections, RawDetections};
use std::io::Write;
use std::process::Command;

#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts.next().ok_or(MoxError::MissingDetector)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image_bytes: &[u8]) -> Result<RawDetections> {
        let mut temp_input = tempfile::Builder::new()
            .prefix("mox-detect-")
            .suffix(".img")
            .tempfile()?;
        temp_input.write_all(image_bytes)?;
        temp_input.flush()?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(temp_input.path())
            .output()
            .map_err(|e| MoxError::Command(format!("{} の実行に失敗: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MoxError::Detection(format!(
                "検出コマンドが失敗しました (code {:?}): {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::trace!(len = stdout.len(), "検出コマンド出力");

        parse_detections(&stdout).map_err(|e| MoxError::Detection(e.to_string()))
    }
}
