use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertAiError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`cert-ai config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("証明書ファイルが見つかりません: {0}")]
    NoCertificatesFound(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    /// マスタファイルがスプレッドシートとして読めない（有効な .xlsx/.xls を指定してください）
    #[error("マスタファイルが読み込めません（有効な .xlsx/.xls ファイルを指定してください）: {0}")]
    MasterParse(String),

    /// マスタは読めたがデータ行が1行もない等、構造が成立しない
    #[error("マスタファイルの構造が不正: {0}")]
    MasterStructure(String),

    #[error("ワークブック修復エラー: {0}")]
    Sanitize(String),

    #[error("Excel書き込みエラー: {0}")]
    ExcelWrite(String),

    /// 台帳追記は同時に1件のみ。2件目は拒否する（インターリーブ禁止）
    #[error("エクスポート処理が既に実行中です")]
    ExportInProgress,

    #[error("エクスポートがキャンセルされました")]
    ExportCancelled,

    #[error("対話入力エラー: {0}")]
    Prompt(String),

    #[error("ZIPエラー: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, CertAiError>;
