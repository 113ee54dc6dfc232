use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cert-ai")]
#[command(about = "サプライヤー証明書AI抽出・マスタ台帳追記ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 証明書フォルダを解析してJSONを出力
    Analyze {
        /// 証明書フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力JSONファイル（デフォルト: 入力フォルダ/result.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// バッチサイズ（一度に解析する枚数）
        #[arg(short, long, default_value = "5")]
        batch_size: usize,
    },

    /// 解析結果JSONをマスタ台帳へ追記
    Export {
        /// 入力JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// マスタ台帳（.xlsx）
        #[arg(short, long, required = true)]
        master: PathBuf,

        /// 出力ディレクトリ（省略時はカレント）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// レビュー用フィーダーExcelも出力
        #[arg(long)]
        feeder: bool,

        /// 照合の信頼度閾値（0.0-1.0）
        #[arg(long, default_value = "0.75")]
        threshold: f64,

        /// 新規サプライヤーの確認をスキップ
        #[arg(short, long)]
        yes: bool,
    },

    /// 解析から台帳追記まで一括実行
    Run {
        /// 証明書フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// マスタ台帳（.xlsx）
        #[arg(short, long, required = true)]
        master: PathBuf,

        /// 出力ディレクトリ（省略時はカレント）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// バッチサイズ
        #[arg(short, long, default_value = "5")]
        batch_size: usize,

        /// レビュー用フィーダーExcelも出力
        #[arg(long)]
        feeder: bool,

        /// 照合の信頼度閾値（0.0-1.0）
        #[arg(long, default_value = "0.75")]
        threshold: f64,

        /// 新規サプライヤーの確認をスキップ
        #[arg(short, long)]
        yes: bool,
    },

    /// マスタ台帳のサプライヤー索引を表示
    Suppliers {
        /// マスタ台帳（.xlsx）
        #[arg(required = true)]
        master: PathBuf,

        /// 名前で検索（あいまい照合）
        #[arg(short, long)]
        query: Option<String>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
