// ==========================================
// 批量数据导入引擎 - 行校验器
// ==========================================
// 职责: 对单行逐字段执行 FieldPipeline，并附加重复状态
// 规则:
// - 未映射字段的原始值视为空串
// - 字段错误互不影响（同行其它字段照常处理）
// - 唯一键转换值非空时才做重复检测；重复仅为警告
// 并发: 每行只依赖自身 RawRow + 只读共享数据，可用 rayon 并行
// ==========================================

use crate::domain::mapping::ColumnMapping;
use crate::domain::record::{FieldIssue, MappedRecord, ParsedRow, RawRow};
use crate::domain::schema::TargetSchema;
use crate::importer::field_pipeline::{FieldOutcome, FieldPipeline};
use crate::importer::import_trait::DuplicateDetector;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, warn};

/// 单线程即可处理的行数上限（低于此值不拆分线程）
const PARALLEL_MIN_ROWS: usize = 2_000;

pub struct RowValidator<'a> {
    schema: &'a TargetSchema,
    pipeline: &'a FieldPipeline,
    mapping: &'a ColumnMapping,
    detector: &'a dyn DuplicateDetector,
}

impl<'a> RowValidator<'a> {
    pub fn new(
        schema: &'a TargetSchema,
        pipeline: &'a FieldPipeline,
        mapping: &'a ColumnMapping,
        detector: &'a dyn DuplicateDetector,
    ) -> Self {
        Self {
            schema,
            pipeline,
            mapping,
            detector,
        }
    }

    /// 校验单行
    pub fn validate(&self, row: &RawRow) -> ParsedRow {
        let mut mapped = MappedRecord::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in &self.schema.fields {
            let raw = self
                .mapping
                .header_for(&field.key)
                .map(|header| row.value(header))
                .unwrap_or("");

            match self.pipeline.run(field, raw) {
                FieldOutcome::Value(value) => mapped.put(&field.key, value),
                FieldOutcome::Error(message) => errors.push(FieldIssue::new(&field.key, message)),
            }
        }

        let unique_key = &self.schema.unique_key;
        let is_duplicate = mapped
            .text(unique_key)
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
            .is_some_and(|v| self.detector.is_duplicate(&v));

        if is_duplicate {
            let label = self
                .schema
                .unique_field()
                .map(|f| f.label.as_str())
                .unwrap_or(unique_key.as_str());
            warnings.push(FieldIssue::new(unique_key, format!("Duplicate {}", label)));
        }

        ParsedRow {
            ordinal: row.ordinal,
            source: row.values.clone(),
            mapped,
            errors,
            warnings,
            is_duplicate,
        }
    }

    /// 校验全部行（输出顺序与输入一致）
    ///
    /// # 参数
    /// - workers: 工作线程数（<= 1 或行数较少时顺序执行）
    pub fn validate_all(&self, rows: &[RawRow], workers: usize) -> Vec<ParsedRow> {
        if workers <= 1 || rows.len() < PARALLEL_MIN_ROWS {
            return rows.iter().map(|row| self.validate(row)).collect();
        }

        match ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => {
                debug!(rows = rows.len(), workers, "并行行校验");
                pool.install(|| rows.par_iter().map(|row| self.validate(row)).collect())
            }
            Err(e) => {
                warn!(error = %e, "线程池创建失败，改为顺序校验");
                rows.iter().map(|row| self.validate(row)).collect()
            }
        }
    }
}
