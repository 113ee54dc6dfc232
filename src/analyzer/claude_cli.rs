//! Claude CLI連携モジュール
//!
//! 証明書ファイル（PDF/DOCX/画像）を外部分類器に渡し、
//! ExtractionRecordのJSON契約でフィールドを抽出する。
//! 分類器はブラックボックスとして扱う（入出力契約のみに依存する）。

use crate::analyzer::types::ExtractionRecord;
use crate::error::{CertAiError, Result};
use crate::scanner::CertificateFile;
use std::process::Command;

/// 抽出プロンプトを構築する
///
/// レスポンスはJSON配列のみを要求する（前後のテキストは
/// `extract_json` が防御的に取り除く）。
fn build_extraction_prompt(files: &[CertificateFile]) -> String {
    let file_list = files
        .iter()
        .map(|f| f.path.display().to_string().replace('\\', "/"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Read the following supplier compliance certificate files and extract \
         structured fields from each: {}\n\n\
         For every file return one JSON object with these keys:\n\
         supplierName, certificateNumber, country, scope, measure, \
         certification, productCategory, issueDate, expiryDate, fileName.\n\
         Dates must be ISO (YYYY-MM-DD). Use \"Not Found\" when a field is \
         absent from the document. fileName must be the file's base name.\n\
         JSON配列のみ出力（説明文は不要）",
        file_list
    )
}

/// 1バッチ分の証明書を解析する
pub async fn analyze_batch(
    files: &[CertificateFile],
    api_key: Option<&str>,
    verbose: bool,
) -> Result<Vec<ExtractionRecord>> {
    let raw_prompt = build_extraction_prompt(files);
    let full_prompt = raw_prompt.replace('\n', " ").replace('"', "\\\"");

    if verbose {
        println!("  プロンプト長: {} chars", full_prompt.len());
    }

    let response = run_claude_cli(&full_prompt, api_key, verbose)?;

    if verbose {
        println!("  レスポンス長: {} chars", response.len());
    }

    let mut records = parse_extraction_response(&response)?;

    // fileNameが欠けたレコードはバッチ順で補完し、取り込み時正規化を適用
    for (idx, record) in records.iter_mut().enumerate() {
        if record.file_name.trim().is_empty() {
            if let Some(file) = files.get(idx) {
                record.file_name = file.file_name.clone();
            }
        }
        record.finalize();
    }

    Ok(records)
}

/// Claude CLI呼び出しコマンドを組み立てる（Windowsではcmd /c経由）
///
/// 設定済みのAPIキーは子プロセスの環境変数として渡す。
/// 未設定ならCLI側の既存認証に任せる。
fn classifier_command(prompt: &str, api_key: Option<&str>) -> Command {
    let mut command = if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/c", "claude", "-p", prompt, "--output-format", "text"]);
        command
    } else {
        let mut command = Command::new("claude");
        command.args(["-p", prompt, "--output-format", "text"]);
        command
    };

    if let Some(key) = api_key {
        command.env("ANTHROPIC_API_KEY", key);
    }
    command
}

fn run_claude_cli(prompt: &str, api_key: Option<&str>, verbose: bool) -> Result<String> {
    let output = classifier_command(prompt, api_key)
        .output()
        .map_err(|e| CertAiError::ApiCall(format!("Claude CLI実行エラー: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CertAiError::ApiCall(format!(
            "Claude CLI failed (code {:?}): {}",
            output.status.code(),
            stderr
        )));
    }

    let response = String::from_utf8_lossy(&output.stdout).to_string();

    if verbose {
        let preview: String = response.chars().take(500).collect();
        println!("  レスポンス: {}", preview);
    }

    Ok(response)
}

/// APIレスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の [...] 配列
/// 3. エラー
pub fn extract_json(response: &str) -> Result<&str> {
    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    // 生の [...] を探す
    if let Some(start) = response.find('[') {
        if let Some(end) = response.rfind(']') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(CertAiError::ApiParse("JSONが見つかりません".into()))
}

/// 抽出レスポンスをパース
fn parse_extraction_response(response: &str) -> Result<Vec<ExtractionRecord>> {
    let json_str = extract_json(response)?;
    let records: Vec<ExtractionRecord> = serde_json::from_str(json_str.trim())
        .map_err(|e| CertAiError::ApiParse(format!("抽出JSONパースエラー: {}", e)))?;
    Ok(records)
}
