//! 近接重複した証明書の統合
//!
//! 同一サプライヤー・同一規格・同一措置の抽出レコードを
//! 台帳書き込み前に1件へ集約する。ここが書き込み前の唯一の
//! 重複除去パス。

use crate::analyzer::ExtractionRecord;
use std::collections::HashMap;

/// 重複グループの複合キー
///
/// 文字列連結のキーは区切り文字の衝突を生むため、
/// 明示的なフィールドを持つ構造体で表す。
/// 各フィールドは小文字化・トリム済み。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    supplier: String,
    certification: String,
    measure: String,
}

impl DedupKey {
    fn of(record: &ExtractionRecord) -> Self {
        Self {
            supplier: record.supplier_name.trim().to_lowercase(),
            certification: record.certification.trim().to_lowercase(),
            measure: record.measure.trim().to_lowercase(),
        }
    }
}

/// レコードの日付が使えるか（3年ルール適用後）
fn has_usable_date(record: &ExtractionRecord) -> bool {
    !record.effective_expiry().is_empty()
}

/// グループ内の優劣: 勝者ならtrue
///
/// 1. 日付のあるレコードが日付のないレコードに勝つ
/// 2. 両方に日付があれば有効期限（3年ルール適用後）が遅い方が勝つ
///    （同点はISO文字列比較なので現職が残る）
fn beats(challenger: &ExtractionRecord, incumbent: &ExtractionRecord) -> bool {
    let challenger_dated = has_usable_date(challenger);
    let incumbent_dated = has_usable_date(incumbent);

    match (challenger_dated, incumbent_dated) {
        (true, false) => true,
        (false, true) => false,
        (false, false) => false,
        (true, true) => challenger.effective_expiry() > incumbent.effective_expiry(),
    }
}

/// 重複除去の結果
#[derive(Debug)]
pub struct DedupResult {
    pub records: Vec<ExtractionRecord>,
    pub removed: usize,
}

/// バッチを重複除去する
///
/// グループごとに勝者1件を残す。入力順は勝者の初出順で保たれる。
pub fn dedup_records(records: Vec<ExtractionRecord>) -> DedupResult {
    let total = records.len();
    let mut winners: Vec<(DedupKey, ExtractionRecord)> = Vec::new();
    let mut positions: HashMap<DedupKey, usize> = HashMap::new();

    for record in records {
        let key = DedupKey::of(&record);
        match positions.get(&key) {
            None => {
                positions.insert(key.clone(), winners.len());
                winners.push((key, record));
            }
            Some(&idx) => {
                if beats(&record, &winners[idx].1) {
                    winners[idx].1 = record;
                }
            }
        }
    }

    let records: Vec<ExtractionRecord> = winners.into_iter().map(|(_, r)| r).collect();
    DedupResult {
        removed: total - records.len(),
        records,
    }
}

/// 重複除去前の簡易検査: グループがいくつ潰れるか
pub fn count_duplicates(records: &[ExtractionRecord]) -> usize {
    let mut seen = HashMap::new();
    let mut duplicates = 0;
    for record in records {
        *seen.entry(DedupKey::of(record)).or_insert(0usize) += 1;
    }
    for (_, count) in seen {
        duplicates += count - 1;
    }
    duplicates
}
