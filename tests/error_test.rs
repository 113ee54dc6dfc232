//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use cert_ai_rust::error::CertAiError;
use cert_ai_rust::matcher::SupplierIndex;
use cert_ai_rust::scanner;
use std::path::Path;
use tempfile::tempdir;

/// 存在しないフォルダをスキャンした場合
#[test]
fn test_scan_nonexistent_folder() {
    let result = scanner::scan_folder(Path::new("/nonexistent/path/12345"));
    assert!(result.is_err());

    let err = result.unwrap_err();
    assert!(matches!(err, CertAiError::FolderNotFound(_)));
}

/// 空のフォルダをスキャンした場合
#[test]
fn test_scan_empty_folder() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = scanner::scan_folder(dir.path());

    // 空フォルダはエラーではなく空のVecを返す
    assert!(result.is_ok());
    assert!(result.unwrap().is_empty());
}

/// 証明書のないフォルダをスキャンした場合
#[test]
fn test_scan_folder_no_certificates() {
    let dir = tempdir().expect("Failed to create temp dir");

    // 対象外の拡張子のみ作成
    std::fs::write(dir.path().join("test.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("data.json"), "{}").unwrap();

    let result = scanner::scan_folder(dir.path());
    assert!(result.is_ok());
    assert!(result.unwrap().is_empty());
}

/// スプレッドシートとして読めないバイト列はParseエラー
#[test]
fn test_master_parse_error() {
    let result = SupplierIndex::from_bytes(b"this is not a spreadsheet");
    assert!(matches!(result, Err(CertAiError::MasterParse(_))));
}

/// CertAiErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        CertAiError::Config("テスト設定エラー".to_string()),
        CertAiError::FileNotFound("cert.pdf".to_string()),
        CertAiError::FolderNotFound("/path/to/folder".to_string()),
        CertAiError::NoCertificatesFound("フォルダ".to_string()),
        CertAiError::ApiCall("API呼び出し失敗".to_string()),
        CertAiError::ApiParse("レスポンス不正".to_string()),
        CertAiError::MasterParse("不正なバイナリ".to_string()),
        CertAiError::MasterStructure("データ行なし".to_string()),
        CertAiError::Sanitize("修復失敗".to_string()),
        CertAiError::ExcelWrite("書き込み失敗".to_string()),
        CertAiError::ExportInProgress,
        CertAiError::ExportCancelled,
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingApiKeyエラーのメッセージ確認
#[test]
fn test_missing_api_key_message() {
    let err = CertAiError::MissingApiKey;
    let display = format!("{}", err);

    assert!(display.contains("APIキー"));
    assert!(display.contains("cert-ai config"));
}

/// エラーのDebug実装確認
#[test]
fn test_error_debug() {
    let err = CertAiError::Config("テスト".to_string());
    let debug = format!("{:?}", err);

    assert!(debug.contains("Config"));
    assert!(debug.contains("テスト"));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: CertAiError = io_err.into();

    assert!(matches!(err, CertAiError::Io(_)));
    let display = format!("{}", err);
    assert!(display.contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: CertAiError = json_err.into();

    assert!(matches!(err, CertAiError::JsonParse(_)));
}
