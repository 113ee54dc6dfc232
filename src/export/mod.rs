//! マスタ台帳への追記エクスポート
//!
//! サニタイズ → シート解決 → レコードごとの配置・書き込み →
//! 更新ログ → 再計算フラグの順で、1バッチを1つの逐次処理として行う。
//! 行挿入は後続行の行番号をすべてずらすため、同時に走らせてよい
//! エクスポートは常に1つ。2つ目の呼び出しは拒否する。

pub mod feeder;
pub mod locator;
pub mod placement;
pub mod sanitizer;
pub mod writer;

use crate::analyzer::ExtractionRecord;
use crate::dedup;
use crate::error::{CertAiError, Result};
use crate::normalizer::canonical_key;
use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// エクスポート1回分の統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// マスタ台帳に照合できたレコード数
    pub matched: usize,
    /// 新規サプライヤー数（未照合の社名の異なり数）
    pub new_suppliers: usize,
    /// 重複として除去されたレコード数
    pub duplicates_removed: usize,
    /// 入力レコード総数
    pub total: usize,
}

/// エクスポート結果
#[derive(Debug)]
pub struct ExportOutcome {
    /// 追記済みワークブックのバイト列
    pub bytes: Vec<u8>,
    pub stats: ExportStats,
}

static EXPORT_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

/// 単一実行ガード（Dropで解放）
struct ExportGuard;

impl ExportGuard {
    fn acquire() -> Result<Self> {
        EXPORT_IN_FLIGHT
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ExportGuard)
            .map_err(|_| CertAiError::ExportInProgress)
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        EXPORT_IN_FLIGHT.store(false, Ordering::SeqCst);
    }
}

/// 出力ファイル名（日付入り）
pub fn master_output_filename() -> String {
    format!(
        "Updated_Master_File_{}.xlsx",
        Local::now().format("%Y-%m-%d")
    )
}

/// マスタ台帳へ1バッチを追記する
///
/// 照合・重複除去済みのレコードを受け取り、修正済みワークブックの
/// バイト列と統計を返す。ワークブックレベルの失敗は全体を中断し、
/// 部分的に書かれたバイト列を返すことはない。
pub fn append_to_master(
    master_bytes: &[u8],
    records: Vec<ExtractionRecord>,
) -> Result<ExportOutcome> {
    let _guard = ExportGuard::acquire()?;
    run_export(master_bytes, records)
}

fn run_export(master_bytes: &[u8], records: Vec<ExtractionRecord>) -> Result<ExportOutcome> {
    if records.is_empty() {
        return Err(CertAiError::NoCertificatesFound(
            "追記するレコードがありません".into(),
        ));
    }

    let total = records.len();
    let deduped = dedup::dedup_records(records);
    let records = deduped.records;

    // 分類は照合メタデータ基準。マスタに登録済みでも口座コード欄が
    // 空のサプライヤーはあり得るため、口座の有無では判定しない
    let matched = records
        .iter()
        .filter(|r| r.match_confidence.is_some())
        .count();
    let new_suppliers = records
        .iter()
        .filter(|r| r.match_confidence.is_none())
        .map(|r| canonical_key(&r.supplier_name))
        .collect::<HashSet<_>>()
        .len();

    // 構造ハザードの修復（図形・共有数式）
    let (sanitized, _report) = sanitizer::sanitize_workbook(master_bytes)?;

    let mut book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(sanitized), true)
        .map_err(|e| CertAiError::MasterParse(e.to_string()))?;
    let layout = locator::locate(&book)?;

    // バッチ内でブロックを開始済みのサプライヤー（正規化キー）
    let mut started_in_batch: HashSet<String> = HashSet::new();
    let mut inserted = 0usize;
    let mut updated = 0usize;

    for record in &records {
        let account = record.matched_account.as_deref().unwrap_or("");

        // 既存行があれば更新（同一証明書の再アップロード）
        if !account.is_empty() {
            let sheet = book
                .get_sheet_by_name(&layout.sheet_name)
                .ok_or_else(|| {
                    CertAiError::MasterStructure(format!(
                        "シートが見つかりません: {}",
                        layout.sheet_name
                    ))
                })?;
            if let Some(block) = placement::block_bounds(sheet, &layout, account) {
                if let Some(row) = placement::find_existing_row(sheet, &layout, block, record) {
                    let sheet = book
                        .get_sheet_by_name_mut(&layout.sheet_name)
                        .ok_or_else(|| {
                            CertAiError::MasterStructure(format!(
                                "シートが見つかりません: {}",
                                layout.sheet_name
                            ))
                        })?;
                    writer::update_existing_row(sheet, &layout, row, record);
                    updated += 1;
                    continue;
                }
            }
        }

        // 配置は挿入のたびにライブなシートから再計算する
        let key = canonical_key(&record.supplier_name);
        let sheet = book.get_sheet_by_name(&layout.sheet_name).ok_or_else(|| {
            CertAiError::MasterStructure(format!("シートが見つかりません: {}", layout.sheet_name))
        })?;
        let mut placement = placement::resolve_placement(
            sheet,
            &layout,
            if account.is_empty() { None } else { Some(account) },
        );

        let write_identity = if placement.in_existing_block {
            false
        } else if started_in_batch.contains(&key) {
            // 同一バッチ内の同サプライヤー2件目以降: 直前に作った
            // ブロック（シート末尾）の続きに置き、名前等は空にする
            placement.row = placement::find_true_last_row(sheet, &layout) + 1;
            false
        } else {
            true
        };

        writer::insert_record_row(&mut book, &layout, placement, record, write_identity)?;
        started_in_batch.insert(key);
        inserted += 1;
    }

    // 更新ログ（シートがなければ何もしない）
    let first = &records[0];
    writer::append_update_log(
        &mut book,
        first.matched_account.as_deref().unwrap_or(""),
        &first.supplier_name,
        &format!("{} added, {} updated", inserted, updated),
    );

    let mut cursor = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut cursor)
        .map_err(|e| CertAiError::ExcelWrite(e.to_string()))?;

    // 再計算しないビューア対策: 次回オープン時の全再計算を強制する
    let bytes = force_recalc_on_open(&cursor.into_inner())?;

    Ok(ExportOutcome {
        bytes,
        stats: ExportStats {
            matched,
            new_suppliers,
            duplicates_removed: deduped.removed,
            total,
        },
    })
}

lazy_static! {
    static ref CALC_PR_RE: Regex = Regex::new(r"<calcPr\b[^>]*/>").unwrap();
}

/// xl/workbook.xml に fullCalcOnLoad を立てる（ZIPレイヤーの限定パッチ）
fn force_recalc_on_open(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let name = {
            let file = archive.by_index(i)?;
            file.name().to_string()
        };

        if name != "xl/workbook.xml" {
            let file = archive.by_index_raw(i)?;
            writer.raw_copy_file(file)?;
            continue;
        }

        let mut xml = String::new();
        archive
            .by_index(i)?
            .read_to_string(&mut xml)
            .map_err(|e| CertAiError::ExcelWrite(format!("workbook.xmlの読み込みに失敗: {}", e)))?;

        let patched = if xml.contains("<calcPr") {
            CALC_PR_RE
                .replace(&xml, r#"<calcPr fullCalcOnLoad="1"/>"#)
                .into_owned()
        } else {
            xml.replace("</workbook>", r#"<calcPr fullCalcOnLoad="1"/></workbook>"#)
        };

        writer.start_file(name, options)?;
        writer.write_all(patched.as_bytes())?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| CertAiError::ExcelWrite(e.to_string()))?;
    Ok(cursor.into_inner())
}
