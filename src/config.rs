use crate::error::{MoxError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 検出コマンド（末尾に画像ファイルのパスが追加される）
    pub detector_command: Vec<String>,
    pub tesseract_path: String,
    pub ocr_language: String,
    pub ocr_psm: u8,
    pub set_symbol_dir: PathBuf,
    /// シンボル抽出前に参照カードを貼り付ける背景画像
    pub background_path: Option<PathBuf>,
    pub probability_floor: f32,
    pub timeout_seconds: u64,
    pub scryfall_base_url: String,
    pub request_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detector_command: Vec::new(),
            tesseract_path: "tesseract".into(),
            ocr_language: "eng".into(),
            ocr_psm: 3,
            set_symbol_dir: PathBuf::from("set_symbols"),
            background_path: None,
            probability_floor: 0.4,
            timeout_seconds: 30,
            scryfall_base_url: "https://api.scryfall.com".into(),
            request_delay_ms: 100, // Scryfall推奨: 1秒あたり10リクエストまで
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MoxError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("mox").join("config.json"))
    }

    /// 検出コマンドを取得（環境変数 MOX_DETECTOR を優先）
    pub fn detector_command(&self) -> Result<Vec<String>> {
        if let Ok(command) = std::env::var("MOX_DETECTOR") {
            let parts = split_command(&command);
            if !parts.is_empty() {
                return Ok(parts);
            }
        }

        if self.detector_command.is_empty() {
            return Err(MoxError::MissingDetector);
        }
        Ok(self.detector_command.clone())
    }

    pub fn set_detector(&mut self, command: &str) -> Result<()> {
        let parts = split_command(command);
        if parts.is_empty() {
            return Err(MoxError::Config("検出コマンドが空です".into()));
        }
        self.detector_command = parts;
        self.save()
    }

    pub fn set_symbol_dir(&mut self, dir: PathBuf) -> Result<()> {
        self.set_symbol_dir = dir;
        self.save()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// 空白区切りでコマンドを分割（引用符のエスケープは扱わない）
fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.probability_floor, 0.4);
        assert_eq!(config.ocr_language, "eng");
        assert!(config.detector_command.is_empty());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"detectorCommand": ["python3", "detect.py"]}"#)
                .unwrap_or_default();
        // キー名は snake_case のみ受け付ける
        assert!(config.detector_command.is_empty());

        let config: Config =
            serde_json::from_str(r#"{"detector_command": ["python3", "detect.py"], "ocr_psm": 6}"#)
                .unwrap();
        assert_eq!(config.detector_command, vec!["python3", "detect.py"]);
        assert_eq!(config.ocr_psm, 6);
        assert_eq!(config.tesseract_path, "tesseract");
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("  python3  detect.py --model m  "), vec!["python3", "detect.py", "--model", "m"]);
        assert!(split_command("   ").is_empty());
    }
}
