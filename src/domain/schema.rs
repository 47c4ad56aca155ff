// ==========================================
// 批量数据导入引擎 - 目标 Schema 领域模型
// ==========================================
// 职责: 定义导入目标的字段结构、校验器与转换器种类
// 红线: Schema 为纯数据（可序列化），运行期不可变更
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==========================================
// FieldType - 字段类型
// ==========================================
// 用途: 模板示例行生成、展示提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Email,
    Phone,
    Date,
    Select,
}

// ==========================================
// ValidatorKind - 校验器种类
// ==========================================
// 说明: 必填校验由 FieldSpec.required 表达，不在此枚举内
// 仅对非空原始值执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorKind {
    /// 正则匹配，不匹配时报 message
    Regex { pattern: String, message: String },

    /// 数值范围（先剔除 strip 中的字符，再按前缀宽松解析）
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        integer: bool,
        #[serde(default)]
        strip: String,
        message: String,
    },

    /// 枚举成员（大小写不敏感）
    OneOf { options: Vec<String>, message: String },

    /// 自定义校验器（按名称在 FieldPipeline 中注册）
    Custom { name: String },
}

// ==========================================
// TransformerKind - 转换器种类
// ==========================================
// 仅对通过校验的非空原始值执行；空值由 OnBlank 决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerKind {
    /// 货币 → 浮点数（剔除 strip 字符，解析失败为 0）
    Currency {
        #[serde(default = "default_currency_strip")]
        strip: String,
    },

    /// 整数（前缀解析，失败为 0）
    Integer,

    /// 日期归一化为 YYYY-MM-DD（无法解析时取当天）
    Date,

    /// 关键字归类（小写包含匹配，按规则顺序，首个命中生效）
    Keyword {
        rules: Vec<KeywordRule>,
        fallback: String,
    },

    /// 小写化
    Lowercase,

    /// 自定义转换器（按名称在 FieldPipeline 中注册）
    Custom { name: String },
}

fn default_currency_strip() -> String {
    "$,".to_string()
}

/// 关键字归类规则: 原始值（小写）包含任一 contains 项 → value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub contains: Vec<String>,
    pub value: String,
}

impl KeywordRule {
    pub fn new(contains: &[&str], value: &str) -> Self {
        Self {
            contains: contains.iter().map(|s| s.to_string()).collect(),
            value: value.to_string(),
        }
    }
}

// ==========================================
// OnBlank - 可选字段为空时的存储值
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OnBlank {
    /// 存储空字符串（保留键）
    #[default]
    Empty,
    /// 存储声明的默认值
    Default(Value),
    /// 存储当天日期（YYYY-MM-DD）
    Today,
}

// ==========================================
// FieldSpec - 字段定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub validator: Option<ValidatorKind>,
    #[serde(default)]
    pub transformer: Option<TransformerKind>,
    #[serde(default)]
    pub on_blank: OnBlank,
}

impl FieldSpec {
    /// 创建字段（可选、无校验、无转换）
    pub fn new(key: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            required: false,
            field_type,
            unique: false,
            options: Vec::new(),
            aliases: Vec::new(),
            validator: None,
            transformer: None,
            on_blank: OnBlank::Empty,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn validator(mut self, validator: ValidatorKind) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn transformer(mut self, transformer: TransformerKind) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn on_blank(mut self, on_blank: OnBlank) -> Self {
        self.on_blank = on_blank;
        self
    }
}

// ==========================================
// TargetSchema - 导入目标
// ==========================================
// 红线: unique_key 必须等于某个 FieldSpec.key；key 在 Schema 内唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSchema {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
    pub unique_key: String,
}

impl TargetSchema {
    /// 按 key 查找字段
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// 去重字段
    pub fn unique_field(&self) -> Option<&FieldSpec> {
        self.field(&self.unique_key)
    }

    /// 必填字段（声明顺序）
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// 结构性检查，返回首个问题描述
    pub fn check_definition(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err("schema declares no fields".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.key.trim().is_empty() {
                return Err("field key must not be empty".to_string());
            }
            if !seen.insert(field.key.as_str()) {
                return Err(format!("duplicate field key: {}", field.key));
            }
            if field.field_type == FieldType::Select && field.options.is_empty() {
                return Err(format!("select field {} declares no options", field.key));
            }
        }

        if !self.has_field(&self.unique_key) {
            return Err(format!(
                "unique key {} is not a declared field",
                self.unique_key
            ));
        }

        Ok(())
    }
}
