mod claude_cli;
mod types;

pub use types::ExtractionRecord;

use crate::scanner::CertificateFile;

/// バッチ解析の結果
///
/// バッチ単位の失敗は収集して最後にまとめて報告する（部分成功モデル）。
/// 1バッチの失敗で全体を中断しない。
#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    pub records: Vec<ExtractionRecord>,
    /// 失敗したバッチの説明（対象ファイル名 + エラー）
    pub failures: Vec<String>,
}

pub async fn analyze_certificates(
    files: &[CertificateFile],
    batch_size: usize,
    api_key: Option<&str>,
    verbose: bool,
) -> AnalysisOutcome {
    let mut outcome = AnalysisOutcome::default();
    let batch_size = batch_size.max(1);

    // バッチに分割（書き込みパスと違い抽出は失敗しても続行できる）
    for (batch_idx, batch) in files.chunks(batch_size).enumerate() {
        if verbose {
            println!("  バッチ {}: {}件", batch_idx + 1, batch.len());
        }

        match claude_cli::analyze_batch(batch, api_key, verbose).await {
            Ok(batch_records) => outcome.records.extend(batch_records),
            Err(e) => {
                let names = batch
                    .iter()
                    .map(|f| f.file_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                outcome.failures.push(format!("{}: {}", names, e));
            }
        }
    }

    outcome
}
