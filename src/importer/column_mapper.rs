// ==========================================
// 批量数据导入引擎 - 列映射器
// ==========================================
// 职责: 源表头 → Schema 字段 自动匹配（别名集合精确匹配）
// 规则: 按 Schema 声明顺序逐字段扫描未占用表头，首个命中即绑定
// 冲突裁决: 多字段可认领同一表头时，声明靠前的字段胜出（见 AutoMapping.contested）
// ==========================================

use crate::domain::mapping::ColumnMapping;
use crate::domain::schema::{FieldSpec, TargetSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// 归一化: 小写，去掉 '_' '-' 与空白
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 字段别名集合 {key, label} ∪ aliases（均已归一化）
pub fn alias_set(field: &FieldSpec) -> HashSet<String> {
    std::iter::once(field.key.as_str())
        .chain(std::iter::once(field.label.as_str()))
        .chain(field.aliases.iter().map(String::as_str))
        .map(normalize)
        .collect()
}

/// 被多个字段别名集合接受的表头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestedHeader {
    pub header: String,
    /// 实际占用该表头的字段（可能为空：候选字段均已绑定到更早的表头）
    pub claimed_by: Option<String>,
    /// 全部候选字段（声明顺序）
    pub candidates: Vec<String>,
}

/// 自动映射结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoMapping {
    pub mapping: ColumnMapping,
    pub contested: Vec<ContestedHeader>,
}

pub struct ColumnMapper;

impl ColumnMapper {
    /// 自动映射（确定性、单射、不报错）
    pub fn auto_map(&self, headers: &[String], schema: &TargetSchema) -> AutoMapping {
        let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
        let alias_sets: Vec<HashSet<String>> = schema.fields.iter().map(alias_set).collect();

        let mut mapping = ColumnMapping::new();
        // 按表头文本去重：同名表头只能被一个字段占用
        let mut used: HashSet<&str> = HashSet::new();

        for (field, aliases) in schema.fields.iter().zip(&alias_sets) {
            let hit = (0..headers.len())
                .find(|&i| !used.contains(headers[i].as_str()) && aliases.contains(&normalized[i]));
            if let Some(i) = hit {
                used.insert(headers[i].as_str());
                mapping.insert_unchecked(&field.key, &headers[i]);
            }
        }

        let contested = Self::contested_headers(headers, &normalized, schema, &alias_sets, &mapping);

        debug!(
            headers = headers.len(),
            mapped = mapping.len(),
            contested = contested.len(),
            "自动列映射完成"
        );

        AutoMapping { mapping, contested }
    }

    fn contested_headers(
        headers: &[String],
        normalized: &[String],
        schema: &TargetSchema,
        alias_sets: &[HashSet<String>],
        mapping: &ColumnMapping,
    ) -> Vec<ContestedHeader> {
        // 重复表头只报告一次
        let mut reported: HashSet<&str> = HashSet::new();
        let mut contested = Vec::new();

        for (header, norm) in headers.iter().zip(normalized) {
            if !reported.insert(header.as_str()) {
                continue;
            }

            let candidates: Vec<String> = schema
                .fields
                .iter()
                .zip(alias_sets)
                .filter(|(_, aliases)| aliases.contains(norm))
                .map(|(field, _)| field.key.clone())
                .collect();

            if candidates.len() > 1 {
                contested.push(ContestedHeader {
                    header: header.clone(),
                    claimed_by: mapping.field_for(header).map(str::to_string),
                    candidates,
                });
            }
        }

        contested
    }
}
