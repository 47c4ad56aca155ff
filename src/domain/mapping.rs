// ==========================================
// 批量数据导入引擎 - 列映射
// ==========================================
// 职责: 字段 key → 源列名 的关联（单次会话内有效）
// 红线: 单射（同一源列不得被两个字段占用）
// ==========================================

use crate::domain::schema::TargetSchema;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    bindings: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// 字段对应的源列名
    pub fn header_for(&self, field_key: &str) -> Option<&str> {
        self.bindings.get(field_key).map(String::as_str)
    }

    /// 占用该源列的字段
    pub fn field_for(&self, header: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, h)| h.as_str() == header)
            .map(|(field, _)| field.as_str())
    }

    pub fn is_mapped(&self, field_key: &str) -> bool {
        self.header_for(field_key).is_some_and(|h| !h.is_empty())
    }

    /// 人工绑定字段与源列
    ///
    /// # 规则
    /// - 字段必须属于 Schema，源列必须出现在表头中
    /// - 源列已被其它字段占用 → HeaderAlreadyMapped
    /// - 字段已有绑定 → 覆盖
    /// - header 为空串 → 解除绑定
    pub fn bind(
        &mut self,
        schema: &TargetSchema,
        headers: &[String],
        field_key: &str,
        header: &str,
    ) -> ImportResult<()> {
        if !schema.has_field(field_key) {
            return Err(ImportError::UnknownField {
                target: schema.name.clone(),
                field: field_key.to_string(),
            });
        }

        if header.is_empty() {
            self.unbind(field_key);
            return Ok(());
        }

        if !headers.iter().any(|h| h == header) {
            return Err(ImportError::UnknownHeader(header.to_string()));
        }

        if let Some(owner) = self.field_for(header) {
            if owner != field_key {
                return Err(ImportError::HeaderAlreadyMapped {
                    header: header.to_string(),
                    field: owner.to_string(),
                });
            }
        }

        self.bindings
            .insert(field_key.to_string(), header.to_string());
        Ok(())
    }

    pub fn unbind(&mut self, field_key: &str) -> Option<String> {
        self.bindings.remove(field_key)
    }

    /// 列映射器内部写入（调用方已保证单射）
    pub(crate) fn insert_unchecked(&mut self, field_key: &str, header: &str) {
        self.bindings
            .insert(field_key.to_string(), header.to_string());
    }

    /// 未映射的必填字段 key（声明顺序）
    pub fn missing_required(&self, schema: &TargetSchema) -> Vec<String> {
        schema
            .required_fields()
            .filter(|f| !self.is_mapped(&f.key))
            .map(|f| f.key.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(field, header)| (field.as_str(), header.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
