// ==========================================
// 批量数据导入引擎 - 导入会话编排器
// ==========================================
// 状态机: upload → mapping → validation → import
// 前进: 仅经门控操作（load_file / validate / proceed_to_import）
// 后退: navigate_to 只能回到本会话已完成的阶段
// 提交: 非试运行会话只调用一次 ImportCommitter，失败退回 validation
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import::{
    CommitBatch, FileIdentity, ImportOutcome, ImportReport, ImportStage, ImportStats, ParsedFile,
    RowReport,
};
use crate::domain::mapping::ColumnMapping;
use crate::domain::record::{ParsedRow, RawRow, RowStatus};
use crate::domain::schema::TargetSchema;
use crate::importer::column_mapper::{ColumnMapper, ContestedHeader};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_pipeline::{CustomKinds, FieldPipeline};
use crate::importer::import_trait::{DuplicateDetector, ImportCommitter};
use crate::importer::row_validator::RowValidator;
use crate::importer::schema_registry::SchemaRegistry;
use crate::importer::stats::compute_stats;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ImportSession - 单次导入向导的瞬时状态
// ==========================================
#[derive(Debug)]
pub struct ImportSession {
    session_id: String,
    target: String,
    schema: TargetSchema,
    settings: ImportSettings,
    custom: CustomKinds,
    today: Option<NaiveDate>,

    // upload
    source: FileIdentity,
    headers: Vec<String>,
    raw_rows: Vec<RawRow>,

    // mapping
    mapping: ColumnMapping,
    contested: Vec<ContestedHeader>,

    // validation
    parsed_rows: Vec<ParsedRow>,
    skip_duplicates: bool,
    dry_run: bool,
    stats: ImportStats,

    // 流转
    stage: ImportStage,
    outcome: ImportOutcome,
    last_error: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ImportSession {
    /// 开启导入会话（upload 阶段）
    ///
    /// # 参数
    /// - registry: Schema 注册表
    /// - target: 目标名（如 "products"）
    /// - settings: 会话默认配置
    ///
    /// # 返回
    /// - Err(UnknownTarget): 目标未注册
    pub fn new(registry: &SchemaRegistry, target: &str, settings: ImportSettings) -> ImportResult<Self> {
        let schema = registry.get(target)?.clone();
        Ok(Self::with_schema(target, schema, settings))
    }

    /// 以指定 Schema 开启会话
    ///
    /// # 参数
    /// - target: 目标名（写入提交批次与审计报告）
    pub fn with_schema(target: &str, schema: TargetSchema, settings: ImportSettings) -> Self {
        let session_id = Uuid::new_v4().to_string();
        info!(session_id = %session_id, import_target = target, "导入会话开始");

        Self {
            session_id,
            target: target.to_string(),
            schema,
            settings,
            custom: CustomKinds::default(),
            today: None,
            source: FileIdentity::default(),
            headers: Vec::new(),
            raw_rows: Vec::new(),
            mapping: ColumnMapping::new(),
            contested: Vec::new(),
            parsed_rows: Vec::new(),
            skip_duplicates: settings.skip_duplicates,
            dry_run: settings.dry_run,
            stats: ImportStats::default(),
            stage: ImportStage::Upload,
            outcome: ImportOutcome::Pending,
            last_error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// 注册自定义校验器/转换器（validate 时解析）
    pub fn with_custom_kinds(mut self, custom: CustomKinds) -> Self {
        self.custom = custom;
        self
    }

    /// 固定“当天”（日期转换与 OnBlank::Today）
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    // ===== 只读访问 =====

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    pub fn outcome(&self) -> &ImportOutcome {
        &self.outcome
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn source(&self) -> &FileIdentity {
        &self.source
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// 自动映射时被多个字段争用的表头
    pub fn contested_headers(&self) -> &[ContestedHeader] {
        &self.contested
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    pub fn parsed_rows(&self) -> &[ParsedRow] {
        &self.parsed_rows
    }

    pub fn skip_duplicates(&self) -> bool {
        self.skip_duplicates
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, ImportOutcome::Complete { .. })
    }

    /// 按行号查询审阅状态
    pub fn row_status(&self, ordinal: usize) -> Option<RowStatus> {
        self.parsed_rows
            .iter()
            .find(|row| row.ordinal == ordinal)
            .map(ParsedRow::status)
    }

    // ===== upload → mapping =====

    /// 载入解析结果并自动映射列
    ///
    /// # 返回
    /// - Err(ParseError): 文件无表头
    /// - Err(InvalidStageTransition): 当前不在 upload 阶段
    #[instrument(skip_all, fields(session_id = %self.session_id, file = %file.source.name))]
    pub fn load_file(&mut self, file: ParsedFile) -> ImportResult<&ColumnMapping> {
        self.ensure_open()?;
        self.ensure_stage(ImportStage::Upload, ImportStage::Mapping)?;

        if file.headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ImportError::ParseError("file has no header row".to_string()));
        }

        let auto = ColumnMapper.auto_map(&file.headers, &self.schema);
        if !auto.contested.is_empty() {
            debug!(contested = auto.contested.len(), "存在争用表头，按字段声明顺序归属");
        }

        self.source = file.source;
        self.headers = file.headers;
        self.raw_rows = RawRow::from_parsed(file.rows, self.settings.header_offset);
        self.mapping = auto.mapping;
        self.contested = auto.contested;
        self.clear_validation();
        self.stage = ImportStage::Mapping;

        info!(
            rows = self.raw_rows.len(),
            headers = self.headers.len(),
            mapped = self.mapping.len(),
            "文件载入完成，进入列映射"
        );
        Ok(&self.mapping)
    }

    // ===== mapping 编辑 =====

    /// 手工绑定字段 → 表头（空表头等价于解绑）
    pub fn bind_column(&mut self, field_key: &str, header: &str) -> ImportResult<()> {
        self.ensure_open()?;
        self.ensure_stage(ImportStage::Mapping, ImportStage::Mapping)?;
        self.mapping.bind(&self.schema, &self.headers, field_key, header)?;
        debug!(session_id = %self.session_id, field = field_key, header, "列映射已修改");
        Ok(())
    }

    /// 解绑字段
    pub fn unbind_column(&mut self, field_key: &str) -> ImportResult<Option<String>> {
        self.ensure_open()?;
        self.ensure_stage(ImportStage::Mapping, ImportStage::Mapping)?;
        Ok(self.mapping.unbind(field_key))
    }

    /// 未映射的必填字段（声明顺序）
    pub fn mapping_gaps(&self) -> Vec<String> {
        self.mapping.missing_required(&self.schema)
    }

    // ===== mapping → validation =====

    /// 逐行校验并计算统计
    ///
    /// # 参数
    /// - existing: 目标已存在的唯一键集合（已小写化）
    ///
    /// # 返回
    /// - Err(MappingGap): 必填字段未映射
    /// - Err(InvalidSchema): 自定义种类未注册 / 正则非法
    #[instrument(skip_all, fields(session_id = %self.session_id, import_target = %self.target))]
    pub fn validate(&mut self, existing: &dyn DuplicateDetector) -> ImportResult<ImportStats> {
        self.ensure_open()?;
        if !matches!(self.stage, ImportStage::Mapping | ImportStage::Validation) {
            return Err(self.transition_error(ImportStage::Validation));
        }

        let gaps = self.mapping_gaps();
        if !gaps.is_empty() {
            warn!(fields = ?gaps, "必填字段未映射");
            return Err(ImportError::MappingGap { fields: gaps });
        }

        let mut pipeline = FieldPipeline::with_custom(&self.schema, self.custom.clone())?;
        if let Some(today) = self.today {
            pipeline = pipeline.with_today(today);
        }

        let validator = RowValidator::new(&self.schema, &pipeline, &self.mapping, existing);
        self.parsed_rows = validator.validate_all(&self.raw_rows, self.settings.validation_workers);
        self.stats = compute_stats(&self.parsed_rows, self.skip_duplicates);
        self.stage = ImportStage::Validation;

        info!(
            total = self.stats.total,
            valid = self.stats.valid,
            errors = self.stats.errors,
            duplicates = self.stats.duplicates,
            "行校验完成"
        );
        Ok(self.stats)
    }

    /// 切换重复行处理方式（立即重算统计）
    ///
    /// # 返回
    /// - Err(InvalidStageTransition): 已进入 import 阶段（需先 navigate_to 回到 validation）
    pub fn set_skip_duplicates(&mut self, skip: bool) -> ImportResult<ImportStats> {
        self.ensure_open()?;
        if self.stage == ImportStage::Import {
            return Err(self.transition_error(ImportStage::Validation));
        }
        self.skip_duplicates = skip;
        self.stats = compute_stats(&self.parsed_rows, skip);
        debug!(session_id = %self.session_id, skip, valid = self.stats.valid, "重复行策略已切换");
        Ok(self.stats)
    }

    pub fn set_dry_run(&mut self, dry_run: bool) -> ImportResult<()> {
        self.ensure_open()?;
        self.dry_run = dry_run;
        Ok(())
    }

    // ===== validation → import =====

    /// 进入导入阶段
    ///
    /// # 返回
    /// - Err(NoValidRows): 无可导入行
    pub fn proceed_to_import(&mut self) -> ImportResult<()> {
        self.ensure_open()?;
        self.ensure_stage(ImportStage::Validation, ImportStage::Import)?;

        if self.stats.valid == 0 {
            return Err(ImportError::NoValidRows);
        }

        self.stage = ImportStage::Import;
        self.last_error = None;
        info!(session_id = %self.session_id, valid = self.stats.valid, "进入导入阶段");
        Ok(())
    }

    /// 本次将提交的批次（与 valid 统计逐行一致，保持原顺序）
    pub fn accepted_batch(&self) -> CommitBatch {
        CommitBatch {
            batch_id: Uuid::new_v4().to_string(),
            target: self.target.clone(),
            unique_key: self.schema.unique_key.clone(),
            file_name: self.source.name.clone(),
            rows: self
                .parsed_rows
                .iter()
                .filter(|row| row.is_importable(self.skip_duplicates))
                .map(|row| row.mapped.clone())
                .collect(),
        }
    }

    // ===== import =====

    /// 提交整批记录
    ///
    /// # 参数
    /// - committer: 持久化协作方
    /// - timeout: 提交超时（None 表示不限）
    ///
    /// # 返回
    /// - Ok(imported): 试运行为 0，否则为批次行数
    /// - Err(PersistenceError / CommitTimeout): 会话退回 validation，解析结果保留
    #[instrument(skip_all, fields(session_id = %self.session_id, import_target = %self.target))]
    pub async fn commit(
        &mut self,
        committer: &dyn ImportCommitter,
        timeout: Option<Duration>,
    ) -> ImportResult<usize> {
        self.ensure_open()?;
        self.ensure_stage(ImportStage::Import, ImportStage::Import)?;

        if self.dry_run {
            info!(valid = self.stats.valid, "试运行，跳过持久化");
            self.complete(0);
            return Ok(0);
        }

        let batch = self.accepted_batch();
        if batch.is_empty() {
            return Err(ImportError::NoValidRows);
        }
        let batch_id = batch.batch_id.clone();
        let batch_len = batch.len();
        info!(batch_id = %batch_id, rows = batch_len, "提交导入批次");

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, committer.commit(batch)).await {
                Ok(inner) => inner.map_err(|e| ImportError::PersistenceError(format!("{:#}", e))),
                Err(_) => Err(ImportError::CommitTimeout(limit.as_millis() as u64)),
            },
            None => committer
                .commit(batch)
                .await
                .map_err(|e| ImportError::PersistenceError(format!("{:#}", e))),
        };

        match result {
            Ok(stored) => {
                if stored != batch_len {
                    warn!(batch_id = %batch_id, stored, expected = batch_len, "存储方确认行数与批次不一致");
                }
                self.complete(batch_len);
                info!(batch_id = %batch_id, imported = batch_len, "导入完成");
                Ok(batch_len)
            }
            Err(err) => {
                error!(batch_id = %batch_id, error = %err, "导入失败，退回校验阶段");
                self.stage = ImportStage::Validation;
                self.outcome = ImportOutcome::Failed {
                    message: err.to_string(),
                };
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // ===== 导航 =====

    /// 回退到已完成阶段（不允许前进）
    pub fn navigate_to(&mut self, stage: ImportStage) -> ImportResult<()> {
        self.ensure_open()?;
        if stage > self.stage {
            return Err(self.transition_error(stage));
        }

        if stage < self.stage {
            debug!(session_id = %self.session_id, from = %self.stage, to = %stage, "阶段回退");
            self.stage = stage;
            self.outcome = ImportOutcome::Pending;
        }
        Ok(())
    }

    /// 取消会话（提交前无外部副作用）
    pub fn cancel(mut self) -> ImportReport {
        info!(session_id = %self.session_id, stage = %self.stage, "导入会话取消");
        self.finished_at = Some(Utc::now());
        self.report()
    }

    /// 会话审计报告
    pub fn report(&self) -> ImportReport {
        ImportReport {
            session_id: self.session_id.clone(),
            target: self.target.clone(),
            file_name: self.source.name.clone(),
            stage: self.stage,
            outcome: self.outcome.clone(),
            dry_run: self.dry_run,
            skip_duplicates: self.skip_duplicates,
            stats: self.stats,
            rows: self
                .parsed_rows
                .iter()
                .map(|row| RowReport {
                    ordinal: row.ordinal,
                    status: row.status(),
                    will_import: row.is_importable(self.skip_duplicates),
                    errors: row.errors.clone(),
                    warnings: row.warnings.clone(),
                })
                .collect(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    // ===== 内部 =====

    fn complete(&mut self, imported: usize) {
        self.stats.imported = imported;
        self.outcome = ImportOutcome::Complete { imported };
        self.last_error = None;
        self.finished_at = Some(Utc::now());
    }

    fn clear_validation(&mut self) {
        self.parsed_rows.clear();
        self.stats = ImportStats::default();
        self.outcome = ImportOutcome::Pending;
        self.last_error = None;
    }

    fn ensure_open(&self) -> ImportResult<()> {
        if self.is_complete() {
            Err(ImportError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_stage(&self, expected: ImportStage, to: ImportStage) -> ImportResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(self.transition_error(to))
        }
    }

    fn transition_error(&self, to: ImportStage) -> ImportError {
        ImportError::InvalidStageTransition {
            from: self.stage.to_string(),
            to: to.to_string(),
        }
    }
}
