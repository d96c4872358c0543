use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mox")]
#[command(about = "カード写真から印刷（セット・コレクター番号）を特定するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// カード写真を読み取って印刷を特定し、JSONを出力
    Scan {
        /// カード写真ファイル、または写真フォルダ
        #[arg(required = true)]
        input: PathBuf,

        /// 出力JSONファイル（デフォルト: 標準出力に要約のみ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 足りないセットシンボルをカタログから取得する
        #[arg(long)]
        fetch_symbols: bool,

        /// カタログ検索を行わない（読み取り結果のみ出力）
        #[arg(long, conflicts_with = "fetch_symbols")]
        offline: bool,

        /// キャッシュを使用（読み取り済みの写真をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// OCR前のクロップ画像を保存するフォルダ（デバッグ用）
        #[arg(long)]
        dump_crops: Option<PathBuf>,
    },

    /// セットシンボルのキャッシュを構築・確認
    Symbols {
        /// 足りないシンボルをカタログから取得する
        #[arg(long)]
        fetch: bool,

        /// 対象セットコード（複数指定可、省略時は全セット）
        #[arg(short, long = "set")]
        sets: Vec<String>,

        /// 参照カードを貼り付ける背景画像
        #[arg(long)]
        background: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 検出コマンドを設定（例: "python3 detect.py"）
        #[arg(long)]
        set_detector: Option<String>,

        /// セットシンボルの保存先フォルダを設定
        #[arg(long)]
        set_symbols_dir: Option<PathBuf>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan() {
        let cli = Cli::parse_from(["mox", "scan", "card.jpg", "-o", "out.json", "--use-cache"]);
        match cli.command {
            Commands::Scan { input, output, use_cache, offline, .. } => {
                assert_eq!(input, PathBuf::from("card.jpg"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(use_cache);
                assert!(!offline);
            }
            _ => panic!("scan として解析されるべき"),
        }
    }

    #[test]
    fn test_offline_conflicts_with_fetch() {
        let result = Cli::try_parse_from(["mox", "scan", "card.jpg", "--offline", "--fetch-symbols"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_symbols_multiple_sets() {
        let cli = Cli::parse_from(["mox", "symbols", "--fetch", "--set", "m19", "-s", "dom", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Symbols { fetch, sets, .. } => {
                assert!(fetch);
                assert_eq!(sets, vec!["m19", "dom"]);
            }
            _ => panic!("symbols として解析されるべき"),
        }
    }
}
