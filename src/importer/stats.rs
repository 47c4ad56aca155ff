// ==========================================
// 批量数据导入引擎 - 统计汇总
// ==========================================
// 职责: ParsedRow 列表 + skip_duplicates → ImportStats（纯归约）
// 恒等式: valid + skipped == total
// ==========================================

use crate::domain::import::ImportStats;
use crate::domain::record::ParsedRow;

pub fn compute_stats(rows: &[ParsedRow], skip_duplicates: bool) -> ImportStats {
    let total = rows.len();
    let errors = rows.iter().filter(|r| r.has_errors()).count();
    let warnings = rows.iter().filter(|r| r.has_warnings()).count();
    let duplicates = rows.iter().filter(|r| r.is_duplicate).count();
    let valid = rows
        .iter()
        .filter(|r| r.is_importable(skip_duplicates))
        .count();

    ImportStats {
        total,
        valid,
        errors,
        warnings,
        duplicates,
        skipped: total - valid,
        imported: 0,
    }
}
