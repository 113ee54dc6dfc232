//! 正準キー同士の類似度スコアリング
//!
//! 2種類のスコアを持つ:
//! - `similarity`: レーベンシュタイン距離ベース（部分文字列ショートカット付き）
//! - `word_overlap`: トークン集合の重なり（新しい照合パスのみで使用）

/// 片方がもう片方の部分文字列だった場合の固定スコア。
/// 長さで正規化していないため、短い一般的なキーでは過剰マッチしうる
/// （互換性のため既知の精度リスクとして維持）。
const SUBSTRING_SCORE: f64 = 0.9;

/// トークン単位のあいまい一致とみなす類似度の下限
const TOKEN_FUZZY_THRESHOLD: f64 = 0.8;

/// あいまい一致トークンに与えるクレジット
const TOKEN_FUZZY_CREDIT: f64 = 0.8;

/// 2つの正準キーの類似度 [0,1]
///
/// 判定順:
/// 1. 完全一致 → 1.0
/// 2. 部分文字列 → 0.9（固定）
/// 3. レーベンシュタイン距離を長い方の長さで正規化
pub fn similarity(key1: &str, key2: &str) -> f64 {
    if key1.is_empty() || key2.is_empty() {
        return 0.0;
    }
    if key1 == key2 {
        return 1.0;
    }
    if key1.contains(key2) || key2.contains(key1) {
        return SUBSTRING_SCORE;
    }
    strsim::normalized_levenshtein(key1, key2)
}

/// 単語重なりスコア（生の値）
///
/// 短い方のキーのトークン集合を長い方と突き合わせる。
/// 完全一致トークンは1.0、トークン類似度0.8以上のあいまい一致は0.8として加算し、
/// 短い方のトークン数で割る。
///
/// 閾値判定（生値0.5以上）と調整スコアへの変換は呼び出し側
/// （[`adjusted_overlap_score`]）で行う。
pub fn word_overlap(key1: &str, key2: &str) -> f64 {
    let tokens1: Vec<&str> = key1.split_whitespace().collect();
    let tokens2: Vec<&str> = key2.split_whitespace().collect();

    if tokens1.is_empty() || tokens2.is_empty() {
        return 0.0;
    }

    let (shorter, longer) = if tokens1.len() <= tokens2.len() {
        (&tokens1, &tokens2)
    } else {
        (&tokens2, &tokens1)
    };

    let mut credit = 0.0;
    for token in shorter.iter() {
        if longer.contains(token) {
            credit += 1.0;
        } else if longer
            .iter()
            .any(|other| strsim::normalized_levenshtein(token, other) >= TOKEN_FUZZY_THRESHOLD)
        {
            credit += TOKEN_FUZZY_CREDIT;
        }
    }

    credit / shorter.len() as f64
}

/// 生の重なりスコアを照合用の調整スコアに変換する
///
/// `min(overlap * 0.85, 0.95)` — 2つの上限を重ねる計算は下流の閾値が
/// この式に合わせて調整されているため、そのまま再現する。
pub fn adjusted_overlap_score(raw_overlap: f64) -> f64 {
    (raw_overlap * 0.85).min(0.95)
}

/// 生の重なりスコアが採用ラインに達しているか
pub fn overlap_accepted(raw_overlap: f64) -> bool {
    raw_overlap >= 0.5
}
