//! サプライヤー索引と照合
//!
//! マスタ台帳からサプライヤー索引を構築し、抽出された名前を
//! あいまい照合する。索引はマスタ読み込みごとに全体を作り直す
//! （増分更新はしない）。

mod types;

pub use types::{MatchOutcome, SupplierEntry};

use crate::analyzer::ExtractionRecord;
use crate::error::{CertAiError, Result};
use crate::normalizer::{canonical_key, similarity};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// あいまい照合のデフォルト信頼度閾値
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.75;

/// ヘッダー行を探す範囲（先頭から10行）
const HEADER_SCAN_ROWS: usize = 10;

/// 正準キー → サプライヤーエントリの索引
#[derive(Debug, Clone, Default)]
pub struct SupplierIndex {
    entries: HashMap<String, SupplierEntry>,
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// ヘッダーテキストの正規化（小文字化・空白圧縮）
fn normalize_header(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// ヘッダー行から引いた列位置
struct MasterColumns {
    header_row: usize,
    account: usize,
    name: usize,
    country: usize,
}

impl MasterColumns {
    /// マスタの既定レイアウト: ヘッダー1行目、account=0, name=1, country=2
    fn default_layout() -> Self {
        Self {
            header_row: 0,
            account: 0,
            name: 1,
            country: 2,
        }
    }
}

/// 先頭10行からヘッダー行と列位置を検出する
fn detect_columns(range: &calamine::Range<Data>) -> Option<MasterColumns> {
    for (row_idx, row) in range.rows().take(HEADER_SCAN_ROWS).enumerate() {
        let headers: Vec<String> = row
            .iter()
            .map(|c| normalize_header(&cell_text(c)))
            .collect();

        if let Some(name_col) = headers.iter().position(|h| h == "supplier name") {
            let account = headers
                .iter()
                .position(|h| h == "supplier account" || h == "account" || h == "account code");
            let country = headers.iter().position(|h| h == "country");
            return Some(MasterColumns {
                header_row: row_idx,
                account: account.unwrap_or(0),
                name: name_col,
                country: country.unwrap_or(2),
            });
        }
    }
    None
}

/// シートがサプライヤーヘッダーを含むか（先頭10行を走査）
fn has_supplier_header(range: &calamine::Range<Data>) -> bool {
    range.rows().take(HEADER_SCAN_ROWS).any(|row| {
        row.iter().any(|c| {
            let h = normalize_header(&cell_text(c));
            h == "supplier name" || h == "supplier account"
        })
    })
}

impl SupplierIndex {
    /// マスタ台帳のバイト列から索引を構築する
    ///
    /// シート選択の優先順位:
    /// 1. サプライヤーヘッダーを含むシート
    /// 2. "Certificates" という名前のシート
    /// 3. "Instructions" 以外の最初のシート
    /// 4. 最初のシート
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|e| CertAiError::MasterParse(e.to_string()))?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(CertAiError::MasterStructure("シートがありません".into()));
        }

        // 優先順位に沿って対象シートを決める
        let mut target: Option<String> = None;
        for name in &sheet_names {
            if let Ok(range) = workbook.worksheet_range(name) {
                if has_supplier_header(&range) {
                    target = Some(name.clone());
                    break;
                }
            }
        }
        let target = target
            .or_else(|| {
                sheet_names
                    .iter()
                    .find(|n| n.as_str() == "Certificates")
                    .cloned()
            })
            .or_else(|| {
                sheet_names
                    .iter()
                    .find(|n| n.as_str() != "Instructions")
                    .cloned()
            })
            .unwrap_or_else(|| sheet_names[0].clone());

        let range = workbook
            .worksheet_range(&target)
            .map_err(|e| CertAiError::MasterParse(e.to_string()))?;

        let columns = detect_columns(&range).unwrap_or_else(MasterColumns::default_layout);

        let mut entries: HashMap<String, SupplierEntry> = HashMap::new();
        let mut data_rows = 0usize;

        for row in range.rows().skip(columns.header_row + 1) {
            let name = row.get(columns.name).map(cell_text).unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            data_rows += 1;

            let key = canonical_key(&name);
            if key.is_empty() {
                continue;
            }

            let account = row
                .get(columns.account)
                .map(cell_text)
                .filter(|s| !s.is_empty());
            let country = row
                .get(columns.country)
                .map(cell_text)
                .filter(|s| !s.is_empty());

            // 同一キーは最初の出現が勝つ
            entries.entry(key).or_insert(SupplierEntry {
                official_name: name,
                country,
                account_code: account,
            });
        }

        if data_rows == 0 {
            return Err(CertAiError::MasterStructure(
                "データ行が1行もありません".into(),
            ));
        }

        Ok(Self { entries })
    }

    /// ファイルパスから索引を構築する
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CertAiError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// 登録済みサプライヤー数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 正準キーの完全一致を引く
    /// 全エントリの列挙（順序は不定）
    pub fn entries(&self) -> impl Iterator<Item = &SupplierEntry> {
        self.entries.values()
    }

    pub fn get(&self, key: &str) -> Option<&SupplierEntry> {
        self.entries.get(key)
    }

    /// 抽出名をあいまい照合する
    ///
    /// 完全一致は信頼度1.0。それ以外は全エントリに対して
    /// レーベンシュタイン類似度と単語重なりスコアを計算し、
    /// それぞれの閾値を超えた中で最高スコアの候補を採用する。
    /// どの候補も閾値に届かなければ未マッチ（新規サプライヤー）。
    ///
    /// 同一入力に対して決定的に同じ結果を返す。
    pub fn find_match(&self, extracted_name: &str, threshold: f64) -> MatchOutcome {
        let key = canonical_key(extracted_name);
        if key.is_empty() {
            return MatchOutcome {
                matched_name: extracted_name.to_string(),
                ..Default::default()
            };
        }

        if let Some(entry) = self.entries.get(&key) {
            return MatchOutcome {
                matched_name: entry.official_name.clone(),
                was_matched: true,
                confidence: 1.0,
                matched_account: entry.account_code.clone(),
                country: entry.country.clone(),
            };
        }

        let mut best: Option<(&String, &SupplierEntry, f64)> = None;

        // HashMapの走査順に依存しないよう、同点はキー順で安定化する
        for (candidate_key, entry) in &self.entries {
            let lev = similarity::similarity(&key, candidate_key);
            let raw_overlap = similarity::word_overlap(&key, candidate_key);

            let mut score = 0.0_f64;
            if lev >= threshold {
                score = lev;
            }
            if similarity::overlap_accepted(raw_overlap) {
                let adjusted = similarity::adjusted_overlap_score(raw_overlap);
                if adjusted > score {
                    score = adjusted;
                }
            }
            if score <= 0.0 {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_key, _, best_score)) => {
                    score > best_score
                        || (score == best_score && candidate_key.as_str() < best_key.as_str())
                }
            };
            if better {
                best = Some((candidate_key, entry, score));
            }
        }

        match best {
            Some((_, entry, score)) => MatchOutcome {
                matched_name: entry.official_name.clone(),
                was_matched: true,
                confidence: score,
                matched_account: entry.account_code.clone(),
                country: entry.country.clone(),
            },
            None => MatchOutcome {
                matched_name: extracted_name.to_string(),
                ..Default::default()
            },
        }
    }
}

/// レコード一括照合の集計
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchSummary {
    pub matched: usize,
    pub new_suppliers: usize,
}

/// 抽出レコードへ照合結果を書き込む
///
/// マッチしたレコードはサプライヤー名を正式名に置き換え、
/// 元の名前と信頼度・口座コードを照合メタデータとして残す。
pub fn match_records(
    records: &mut [ExtractionRecord],
    index: &SupplierIndex,
    threshold: f64,
) -> MatchSummary {
    let mut summary = MatchSummary::default();

    for record in records.iter_mut() {
        let outcome = index.find_match(&record.supplier_name, threshold);
        if outcome.was_matched {
            summary.matched += 1;
            if record.supplier_name != outcome.matched_name {
                record.original_supplier_name = Some(record.supplier_name.clone());
            }
            record.supplier_name = outcome.matched_name;
            record.matched_account = outcome.matched_account;
            record.match_confidence = Some(outcome.confidence);
            if record.country.is_empty() {
                if let Some(country) = outcome.country {
                    record.country = country;
                }
            }
        } else {
            summary.new_suppliers += 1;
        }
    }

    summary
}
