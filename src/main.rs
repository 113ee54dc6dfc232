use cert_ai_rust::{analyzer, cli, config, dedup, error, export, matcher, scanner};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use dialoguer::Confirm;
use error::{CertAiError, Result};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Analyze {
            folder,
            output,
            batch_size,
        } => {
            println!("📑 cert-ai - 証明書解析\n");

            // 1. 証明書スキャン
            println!("[1/3] 証明書をスキャン中...");
            let files = scanner::scan_folder(&folder)?;
            println!("✔ {}件の証明書を検出\n", files.len());

            if files.is_empty() {
                return Err(CertAiError::NoCertificatesFound(
                    folder.display().to_string(),
                ));
            }

            // 2. AI抽出
            println!("[2/3] AI抽出中...");
            let api_key = config.get_api_key().ok();
            let outcome =
                analyzer::analyze_certificates(&files, batch_size, api_key.as_deref(), cli.verbose)
                    .await;
            report_failures(&outcome.failures);
            println!("✔ {}件を抽出\n", outcome.records.len());

            // 3. 結果保存
            println!("[3/3] 結果を保存中...");
            let output = output.unwrap_or_else(|| folder.join("result.json"));
            let json = serde_json::to_string_pretty(&outcome.records)?;
            std::fs::write(&output, json)?;
            println!("✔ 結果を保存: {}", output.display());

            println!("\n✅ 解析完了");
        }

        Commands::Export {
            input,
            master,
            output,
            feeder,
            threshold,
            yes,
        } => {
            println!("📄 cert-ai - 台帳追記\n");

            let content = std::fs::read_to_string(&input)?;
            let records: Vec<analyzer::ExtractionRecord> = serde_json::from_str(&content)?;

            export_to_master(records, &master, output, feeder, threshold, yes)?;

            println!("\n✅ エクスポート完了");
        }

        Commands::Run {
            folder,
            master,
            output,
            batch_size,
            feeder,
            threshold,
            yes,
        } => {
            println!("🚀 cert-ai - 一括処理\n");

            // 1. Scan
            println!("[1/3] 証明書をスキャン中...");
            let files = scanner::scan_folder(&folder)?;
            println!("✔ {}件の証明書を検出\n", files.len());

            if files.is_empty() {
                return Err(CertAiError::NoCertificatesFound(
                    folder.display().to_string(),
                ));
            }

            // 2. Analyze
            println!("[2/3] AI抽出中...");
            let api_key = config.get_api_key().ok();
            let outcome =
                analyzer::analyze_certificates(&files, batch_size, api_key.as_deref(), cli.verbose)
                    .await;
            report_failures(&outcome.failures);
            println!("✔ {}件を抽出\n", outcome.records.len());

            // 3. Export
            println!("[3/3] 台帳追記中...");
            export_to_master(outcome.records, &master, output, feeder, threshold, yes)?;

            println!("\n✅ 完了");
        }

        Commands::Suppliers { master, query } => {
            println!("🔎 cert-ai - サプライヤー索引\n");

            let index = matcher::SupplierIndex::from_path(&master)?;
            println!("✔ {}社を読み込み\n", index.len());

            match query {
                Some(name) => {
                    let outcome = index.find_match(&name, matcher::DEFAULT_MATCH_THRESHOLD);
                    if outcome.was_matched {
                        println!(
                            "  {} → {} (信頼度 {:.2}, 口座 {})",
                            name,
                            outcome.matched_name,
                            outcome.confidence,
                            outcome.matched_account.as_deref().unwrap_or("-")
                        );
                    } else {
                        println!("  {} → 未登録（新規サプライヤー）", name);
                    }
                }
                None => {
                    let mut entries: Vec<_> = index.entries().collect();
                    entries.sort_by(|a, b| a.official_name.cmp(&b.official_name));
                    for entry in entries {
                        println!(
                            "  {:<10} {} ({})",
                            entry.account_code.as_deref().unwrap_or("-"),
                            entry.official_name,
                            entry.country.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  バッチサイズ: {}", config.default_batch_size);
                println!("  照合閾値: {}", config.match_threshold);
                println!(
                    "  APIキー: {}",
                    if config.api_key.is_some() {
                        "設定済み"
                    } else {
                        "未設定"
                    }
                );
            }
        }
    }

    Ok(())
}

fn report_failures(failures: &[String]) {
    if failures.is_empty() {
        return;
    }
    // 部分成功モデル: 失敗したバッチは報告して続行する
    println!("⚠ 抽出に失敗したファイル:");
    for failure in failures {
        println!("  - {}", failure);
    }
}

/// 照合 → 新規サプライヤー確認 → 台帳追記 → ファイル保存
fn export_to_master(
    mut records: Vec<analyzer::ExtractionRecord>,
    master: &Path,
    output: Option<PathBuf>,
    feeder: bool,
    threshold: f64,
    yes: bool,
) -> Result<()> {
    if !master.exists() {
        return Err(CertAiError::FileNotFound(master.display().to_string()));
    }
    let master_bytes = std::fs::read(master)?;

    // マスタ照合
    println!("- マスタ照合中...");
    let index = matcher::SupplierIndex::from_bytes(&master_bytes)?;
    let summary = matcher::match_records(&mut records, &index, threshold);
    println!(
        "✔ 照合完了: {}件マッチ / {}件新規",
        summary.matched, summary.new_suppliers
    );

    // 新規サプライヤーの確認（エクスポート実行前のブロッキング確認）
    if summary.new_suppliers > 0 && !yes {
        let mut names: Vec<&str> = records
            .iter()
            .filter(|r| r.match_confidence.is_none())
            .map(|r| r.supplier_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();

        println!("\n⚠ マスタ台帳に未登録のサプライヤー:");
        for name in &names {
            println!("  - {}", name);
        }

        let proceed = Confirm::new()
            .with_prompt(format!(
                "{}社を新規サプライヤーとして追記します。続行しますか？",
                names.len()
            ))
            .default(false)
            .interact()
            .map_err(|e| CertAiError::Prompt(e.to_string()))?;

        if !proceed {
            return Err(CertAiError::ExportCancelled);
        }
    }

    // 重複の事前報告（実際の除去は追記パス内で行う）
    let duplicates = dedup::count_duplicates(&records);
    if duplicates > 0 {
        println!("- 重複証明書を{}件検出（統合して追記します）", duplicates);
    }

    // 台帳追記
    println!("- 台帳に追記中...");
    let outcome = export::append_to_master(&master_bytes, records.clone())?;

    let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)?;
    let master_out = output_dir.join(export::master_output_filename());
    std::fs::write(&master_out, &outcome.bytes)?;
    println!("✔ 台帳出力: {}", master_out.display());

    // レビュー用フィーダー
    if feeder {
        let deduped = dedup::dedup_records(records);
        let buffer = export::feeder::generate_feeder_buffer(&deduped.records)?;
        let feeder_out = output_dir.join("Extracted_Certificates.xlsx");
        std::fs::write(&feeder_out, buffer)?;
        println!("✔ フィーダー出力: {}", feeder_out.display());
    }

    let stats = outcome.stats;
    println!(
        "✔ 追記完了: マッチ{} / 新規{} / 重複除去{} / 合計{}",
        stats.matched, stats.new_suppliers, stats.duplicates_removed, stats.total
    );

    Ok(())
}
