//! 行配置の解決
//!
//! 挿入のたびに後続行の行番号がすべてずれるため、配置は毎回
//! ライブなシートから再計算する。行番号のキャッシュは一切持たない。

use crate::analyzer::ExtractionRecord;
use crate::export::locator::SheetLayout;
use lazy_static::lazy_static;
use regex::Regex;
use umya_spreadsheet::Worksheet;

/// 証明書テキスト照合に必要な最小文字数（短文の偶然一致を弾く）
const MIN_CERT_MATCH_LEN: usize = 5;

lazy_static! {
    /// OSのコピー連番 " (1).pdf" → ".pdf"
    static ref COPY_SUFFIX_RE: Regex = Regex::new(r" \(\d+\)(\.[A-Za-z0-9]+)$").unwrap();
}

fn cell_text(sheet: &Worksheet, col: u32, row: u32) -> String {
    sheet.get_formatted_value((col, row)).trim().to_string()
}

fn accounts_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// 表示テキスト基準の最終データ行
///
/// 前方走査は不可: 数式セルは表示結果が空でも「非空」として登録される
/// ため、シート末尾から後方に走査し、サプライヤー名か規格欄に見える
/// 内容がある最初の行を最終行とする。データがなければヘッダー行を返す。
pub fn find_true_last_row(sheet: &Worksheet, layout: &SheetLayout) -> u32 {
    let highest = sheet.get_highest_row();
    let mut row = highest;
    while row > layout.header_row {
        if !cell_text(sheet, layout.columns.name, row).is_empty()
            || !cell_text(sheet, layout.columns.certification, row).is_empty()
        {
            return row;
        }
        row -= 1;
    }
    layout.header_row
}

/// 挿入位置の解決結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// 新しい行を挿入すべき行番号（1始まり）
    pub row: u32,
    /// 既存ブロックへの追記か（trueなら名前・口座・国は空のまま）
    pub in_existing_block: bool,
}

/// 挿入位置を解決する
///
/// 対象口座が既存ブロックにあればその直後、なければ最終行+2
/// （新ブロック前に空白行を1行挟む）。挿入のたびに必ず再実行する。
pub fn resolve_placement(
    sheet: &Worksheet,
    layout: &SheetLayout,
    target_account: Option<&str>,
) -> Placement {
    let true_last = find_true_last_row(sheet, layout);

    if let Some(account) = target_account {
        if !account.trim().is_empty() {
            let mut last_match: Option<u32> = None;
            for row in (layout.header_row + 1)..=true_last {
                if accounts_equal(&cell_text(sheet, layout.columns.account, row), account) {
                    last_match = Some(row);
                }
            }
            if let Some(row) = last_match {
                return Placement {
                    row: row + 1,
                    in_existing_block: true,
                };
            }
        }
    }

    Placement {
        row: true_last + 2,
        in_existing_block: false,
    }
}

/// 対象口座のブロック範囲（先頭行..末尾行）
///
/// 口座は各ブロックの先頭行にしか書かれない。先頭行から下へ、
/// 口座欄が空のままの行をブロックの続きとみなす。
pub fn block_bounds(
    sheet: &Worksheet,
    layout: &SheetLayout,
    account: &str,
) -> Option<(u32, u32)> {
    if account.trim().is_empty() {
        return None;
    }
    let true_last = find_true_last_row(sheet, layout);

    let mut start: Option<u32> = None;
    for row in (layout.header_row + 1)..=true_last {
        if accounts_equal(&cell_text(sheet, layout.columns.account, row), account) {
            start = Some(row);
            break;
        }
    }
    let start = start?;

    let mut end = start;
    for row in (start + 1)..=true_last {
        if !cell_text(sheet, layout.columns.account, row).is_empty() {
            break;
        }
        end = row;
    }
    Some((start, end))
}

/// コピー連番を落としたファイル名（"cert (1).pdf" → "cert.pdf"）
fn strip_copy_suffix(file_name: &str) -> String {
    COPY_SUFFIX_RE.replace(file_name, "$1").into_owned()
}

/// 規格テキストの双方向部分一致（両側5文字以上）
fn certifications_match(incoming: &str, existing: &str) -> bool {
    let a = incoming.trim().to_lowercase();
    let b = existing.trim().to_lowercase();
    if a.len() < MIN_CERT_MATCH_LEN || b.len() < MIN_CERT_MATCH_LEN {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// 商品カテゴリの照合（どちらかが空ならワイルドカード）
fn categories_match(incoming: &str, existing: &str) -> bool {
    let a = incoming.trim().to_lowercase();
    let b = existing.trim().to_lowercase();
    a.is_empty() || b.is_empty() || a == b
}

/// 同一証明書を表す既存行を探す（更新か挿入かの判定）
///
/// 優先順:
/// 1. コメント欄にファイル名が記録済み（コピー連番を剥がした形も試す）
/// 2. 規格テキストの双方向部分一致 + 商品カテゴリ一致
pub fn find_existing_row(
    sheet: &Worksheet,
    layout: &SheetLayout,
    block: (u32, u32),
    record: &ExtractionRecord,
) -> Option<u32> {
    let (first, last) = block;
    let file_name = record.file_name.trim();
    let stripped = strip_copy_suffix(file_name);

    if !file_name.is_empty() {
        for row in first..=last {
            let comments = cell_text(sheet, layout.columns.comments, row);
            if comments.contains(file_name) || (!stripped.is_empty() && comments.contains(&stripped))
            {
                return Some(row);
            }
        }
    }

    for row in first..=last {
        let existing_cert = cell_text(sheet, layout.columns.certification, row);
        if certifications_match(&record.certification, &existing_cert)
            && categories_match(
                &record.product_category,
                &cell_text(sheet, layout.columns.product_category, row),
            )
        {
            return Some(row);
        }
    }

    None
}
