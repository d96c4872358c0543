use super::OcrEngine;
use crate::config::Config;
use crate::error::{MoxError, Result};
use std::io::Write;
use std::process::Command;

/// Tesseract CLI を呼び出すOCR
///
/// `tesseract <png> stdout -l <lang> --psm <mode>`
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    executable: String,
    language: String,
    page_segmentation: u8,
}

impl TesseractOcr {
    pub fn new(executable: impl Into<String>, language: impl Into<String>, page_segmentation: u8) -> Self {
        Self {
            executable: executable.into(),
            language: language.into(),
            page_segmentation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.tesseract_path, &config.ocr_language, config.ocr_psm)
    }

    fn command_args(&self) -> Vec<String> {
        vec![
            "stdout".into(),
            "-l".into(),
            self.language.clone(),
            "--psm".into(),
            self.page_segmentation.to_string(),
        ]
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, png_bytes: &[u8]) -> Result<String> {
        let mut temp_input = tempfile::Builder::new()
            .prefix("mox-ocr-")
            .suffix(".png")
            .tempfile()?;
        temp_input.write_all(png_bytes)?;
        temp_input.flush()?;

        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .args(self.command_args())
            .output()
            .map_err(|e| MoxError::Ocr(format!("{} の実行に失敗: {}", self.executable, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MoxError::Ocr(format!("Tesseract failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
