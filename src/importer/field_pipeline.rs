// ==========================================
// 批量数据导入引擎 - 字段管道
// ==========================================
// 职责: 单字段 必填 → 校验 → 转换（纯函数，无副作用）
// 规则:
// 1. 必填且为空 → "{label} is required"，不转换
// 2. 非空且校验失败 → 校验器消息，不转换
// 3. 非空 → 转换器（无转换器则原样）；可选且为空 → OnBlank
// ==========================================

use crate::domain::schema::{FieldSpec, OnBlank, TargetSchema, TransformerKind, ValidatorKind};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
});
static INT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[+-]?\d+").expect("valid regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d", "%d %B %Y", "%B %d, %Y", "%b %d, %Y",
    "%d-%b-%Y",
];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d%H%M%S"];

/// 宽松前缀浮点解析（"12.5kg" → 12.5，"abc" → None）
pub fn parse_leading_f64(value: &str) -> Option<f64> {
    FLOAT_PREFIX
        .find(value)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
}

/// 宽松前缀整数解析（"3.7" → 3）
pub fn parse_leading_i64(value: &str) -> Option<i64> {
    INT_PREFIX
        .find(value)
        .and_then(|m| m.as_str().trim().parse::<i64>().ok())
}

/// 宽松前缀整数解析，超出 i64 时按浮点保留量级（"99999999999999999999" → 1e20）
pub fn parse_leading_integer(value: &str) -> Option<f64> {
    let digits = INT_PREFIX.find(value)?.as_str().trim();
    match digits.parse::<i64>() {
        Ok(n) => Some(n as f64),
        Err(_) => digits.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

fn integer_value(raw: &str) -> Value {
    match parse_leading_i64(raw) {
        Some(n) => Value::from(n),
        None => parse_leading_integer(raw).map_or_else(|| Value::from(0), Value::from),
    }
}

fn strip_chars(value: &str, strip: &str) -> String {
    value.chars().filter(|c| !strip.contains(*c)).collect()
}

/// 多格式日期解析
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub type CustomValidatorFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type CustomTransformerFn = Arc<dyn Fn(&str) -> Value + Send + Sync>;

// ==========================================
// CustomKinds - 自定义校验器/转换器注册表
// ==========================================
#[derive(Clone, Default)]
pub struct CustomKinds {
    validators: HashMap<String, CustomValidatorFn>,
    transformers: HashMap<String, CustomTransformerFn>,
}

impl CustomKinds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.validators.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn transformer<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        self.transformers.insert(name.to_string(), Arc::new(f));
        self
    }
}

impl fmt::Debug for CustomKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomKinds")
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 单字段处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Value(Value),
    Error(String),
}

// ==========================================
// FieldPipeline - 校验器/转换器分发器
// ==========================================
#[derive(Debug, Clone)]
pub struct FieldPipeline {
    regexes: HashMap<String, Regex>,
    custom: CustomKinds,
    today: NaiveDate,
}

impl FieldPipeline {
    /// 为 Schema 预编译正则（无自定义种类）
    pub fn new(schema: &TargetSchema) -> ImportResult<Self> {
        Self::with_custom(schema, CustomKinds::default())
    }

    /// 为 Schema 预编译正则并解析自定义种类名称
    ///
    /// # 返回
    /// - Err(InvalidSchema): 正则非法 / 自定义名称未注册
    pub fn with_custom(schema: &TargetSchema, custom: CustomKinds) -> ImportResult<Self> {
        let invalid = |message: String| ImportError::InvalidSchema {
            target: schema.name.clone(),
            message,
        };

        let mut regexes = HashMap::new();
        for field in &schema.fields {
            match &field.validator {
                Some(ValidatorKind::Regex { pattern, .. }) if !regexes.contains_key(pattern) => {
                    let re = Regex::new(pattern)
                        .map_err(|e| invalid(format!("field {}: {}", field.key, e)))?;
                    regexes.insert(pattern.clone(), re);
                }
                Some(ValidatorKind::Custom { name }) if !custom.validators.contains_key(name) => {
                    return Err(invalid(format!(
                        "field {}: unknown validator {}",
                        field.key, name
                    )));
                }
                _ => {}
            }

            if let Some(TransformerKind::Custom { name }) = &field.transformer {
                if !custom.transformers.contains_key(name) {
                    return Err(invalid(format!(
                        "field {}: unknown transformer {}",
                        field.key, name
                    )));
                }
            }
        }

        Ok(Self {
            regexes,
            custom,
            today: chrono::Local::now().date_naive(),
        })
    }

    /// 固定“当天”（Date 转换回退值与 OnBlank::Today）
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// 处理单个字段（raw 已 TRIM）
    pub fn run(&self, field: &FieldSpec, raw: &str) -> FieldOutcome {
        if raw.is_empty() {
            if field.required {
                return FieldOutcome::Error(format!("{} is required", field.label));
            }
            return FieldOutcome::Value(self.blank_value(&field.on_blank));
        }

        if let Some(validator) = &field.validator {
            if let Some(message) = self.check(validator, raw) {
                return FieldOutcome::Error(message);
            }
        }

        let value = match &field.transformer {
            Some(transformer) => self.transform(transformer, raw),
            None => Value::String(raw.to_string()),
        };
        FieldOutcome::Value(value)
    }

    fn check(&self, validator: &ValidatorKind, raw: &str) -> Option<String> {
        match validator {
            ValidatorKind::Regex { pattern, message } => {
                let matched = match self.regexes.get(pattern) {
                    Some(re) => re.is_match(raw),
                    None => Regex::new(pattern).map(|re| re.is_match(raw)).unwrap_or(false),
                };
                (!matched).then(|| message.clone())
            }
            ValidatorKind::Range {
                min,
                max,
                integer,
                strip,
                message,
            } => {
                let cleaned = strip_chars(raw, strip);
                let parsed = if *integer {
                    parse_leading_integer(&cleaned)
                } else {
                    parse_leading_f64(&cleaned)
                };
                let in_range = parsed.is_some_and(|n| {
                    min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
                });
                (!in_range).then(|| message.clone())
            }
            ValidatorKind::OneOf { options, message } => {
                let lower = raw.to_lowercase();
                let member = options.iter().any(|o| o.to_lowercase() == lower);
                (!member).then(|| message.clone())
            }
            ValidatorKind::Custom { name } => match self.custom.validators.get(name) {
                Some(f) => f(raw),
                None => Some(format!("unknown validator: {}", name)),
            },
        }
    }

    fn transform(&self, transformer: &TransformerKind, raw: &str) -> Value {
        match transformer {
            TransformerKind::Currency { strip } => {
                let amount = parse_leading_f64(&strip_chars(raw, strip))
                    .filter(|n| n.is_finite())
                    .unwrap_or(0.0);
                Value::from(amount)
            }
            TransformerKind::Integer => integer_value(raw),
            TransformerKind::Date => {
                let date = parse_flexible_date(raw).unwrap_or(self.today);
                Value::String(date.format("%Y-%m-%d").to_string())
            }
            TransformerKind::Keyword { rules, fallback } => {
                let lower = raw.to_lowercase();
                let value = rules
                    .iter()
                    .find(|rule| rule.contains.iter().any(|k| lower.contains(k.as_str())))
                    .map(|rule| rule.value.clone())
                    .unwrap_or_else(|| fallback.clone());
                Value::String(value)
            }
            TransformerKind::Lowercase => Value::String(raw.to_lowercase()),
            TransformerKind::Custom { name } => match self.custom.transformers.get(name) {
                Some(f) => f(raw),
                None => Value::String(raw.to_string()),
            },
        }
    }

    fn blank_value(&self, on_blank: &OnBlank) -> Value {
        match on_blank {
            OnBlank::Empty => Value::String(String::new()),
            OnBlank::Default(value) => value.clone(),
            OnBlank::Today => Value::String(self.today.format("%Y-%m-%d").to_string()),
        }
    }
}
