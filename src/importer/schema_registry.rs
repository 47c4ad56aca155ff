// ==========================================
// 批量数据导入引擎 - 目标 Schema 注册表
// ==========================================
// 职责: 静态目标目录（products / contacts / employees）
// 红线: 进程启动时加载一次，运行期无更新/删除
// ==========================================

use crate::domain::schema::{
    FieldSpec, FieldType, KeywordRule, OnBlank, TargetSchema, TransformerKind, ValidatorKind,
};
use crate::importer::error::{ImportError, ImportResult};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
pub const PHONE_PATTERN: &str = r"^[\d\s\-\+\(\)\.]+$";

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, TargetSchema>,
}

impl SchemaRegistry {
    /// 由目标名 → Schema 构造（逐个做结构检查）
    pub fn new(schemas: BTreeMap<String, TargetSchema>) -> ImportResult<Self> {
        for (target, schema) in &schemas {
            schema
                .check_definition()
                .map_err(|message| ImportError::InvalidSchema {
                    target: target.clone(),
                    message,
                })?;
        }
        debug!(targets = schemas.len(), "Schema 注册表已加载");
        Ok(Self { schemas })
    }

    /// 内置目标
    pub fn builtin() -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert("products".to_string(), products_schema());
        schemas.insert("contacts".to_string(), contacts_schema());
        schemas.insert("employees".to_string(), employees_schema());
        Self { schemas }
    }

    /// 从 JSON 配置加载（{"target": TargetSchema, ...}）
    pub fn from_json(json: &str) -> ImportResult<Self> {
        let schemas: BTreeMap<String, TargetSchema> =
            serde_json::from_str(json).map_err(|e| ImportError::InvalidSchema {
                target: "*".to_string(),
                message: e.to_string(),
            })?;
        Self::new(schemas)
    }

    pub fn get(&self, target: &str) -> ImportResult<&TargetSchema> {
        self.schemas
            .get(target)
            .ok_or_else(|| ImportError::UnknownTarget(target.to_string()))
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.schemas)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn positive_number(message: &str) -> ValidatorKind {
    ValidatorKind::Range {
        min: Some(0.0),
        max: None,
        integer: false,
        strip: "$,".to_string(),
        message: message.to_string(),
    }
}

fn email_validator() -> ValidatorKind {
    ValidatorKind::Regex {
        pattern: EMAIL_PATTERN.to_string(),
        message: "Invalid email format".to_string(),
    }
}

fn phone_validator() -> ValidatorKind {
    ValidatorKind::Regex {
        pattern: PHONE_PATTERN.to_string(),
        message: "Invalid phone format".to_string(),
    }
}

// ==========================================
// products - 商品/库存
// ==========================================
fn products_schema() -> TargetSchema {
    TargetSchema {
        name: "Products / Inventory".to_string(),
        description: "Import products with SKU, pricing, and stock information".to_string(),
        unique_key: "sku".to_string(),
        fields: vec![
            FieldSpec::new("name", "Product Name", FieldType::String)
                .required()
                .aliases(&["product", "product_name", "item", "item_name", "title"]),
            FieldSpec::new("sku", "SKU", FieldType::String)
                .required()
                .unique()
                .aliases(&["product_code", "code", "item_code", "part_number", "part_no"]),
            FieldSpec::new("description", "Description", FieldType::String)
                .aliases(&["desc", "product_description", "details"]),
            FieldSpec::new("sell_price", "Sell Price", FieldType::Number)
                .required()
                .aliases(&["price", "retail_price", "unit_price", "selling_price"])
                .validator(positive_number("Must be a valid positive number"))
                .transformer(TransformerKind::Currency {
                    strip: "$,".to_string(),
                }),
            FieldSpec::new("cost_price", "Cost Price", FieldType::Number)
                .aliases(&["cost", "purchase_price", "buy_price", "wholesale_price"])
                .validator(positive_number("Must be a valid positive number"))
                .transformer(TransformerKind::Currency {
                    strip: "$,".to_string(),
                })
                .on_blank(OnBlank::Default(json!(0))),
            FieldSpec::new("stock_quantity", "Stock Quantity", FieldType::Number)
                .aliases(&["stock", "qty", "quantity", "inventory", "on_hand", "available"])
                .validator(ValidatorKind::Range {
                    min: Some(0.0),
                    max: None,
                    integer: true,
                    strip: String::new(),
                    message: "Must be a valid positive integer".to_string(),
                })
                .transformer(TransformerKind::Integer)
                .on_blank(OnBlank::Default(json!(0))),
            FieldSpec::new("min_quantity", "Minimum Quantity", FieldType::Number)
                .aliases(&["min_stock", "reorder_point", "min_level", "reorder_level"])
                .transformer(TransformerKind::Integer)
                .on_blank(OnBlank::Default(json!(0))),
            FieldSpec::new("category", "Category", FieldType::String)
                .aliases(&["product_category", "type", "group", "department"]),
            FieldSpec::new("barcode", "Barcode", FieldType::String)
                .aliases(&["upc", "ean", "gtin", "bar_code"]),
            FieldSpec::new("unit", "Unit", FieldType::String)
                .aliases(&["uom", "unit_of_measure", "units"])
                .on_blank(OnBlank::Default(json!("each"))),
        ],
    }
}

// ==========================================
// contacts - 客户/供应商
// ==========================================
fn contacts_schema() -> TargetSchema {
    TargetSchema {
        name: "Contacts".to_string(),
        description: "Import customers and vendors with contact information".to_string(),
        unique_key: "email".to_string(),
        fields: vec![
            FieldSpec::new("name", "Contact Name", FieldType::String)
                .required()
                .aliases(&[
                    "contact",
                    "full_name",
                    "customer_name",
                    "vendor_name",
                    "client_name",
                ]),
            FieldSpec::new("email", "Email", FieldType::Email)
                .unique()
                .aliases(&["email_address", "e-mail", "mail"])
                .validator(email_validator()),
            FieldSpec::new("phone", "Phone", FieldType::Phone)
                .aliases(&["phone_number", "telephone", "tel", "mobile", "cell"])
                .validator(phone_validator()),
            FieldSpec::new("company", "Company", FieldType::String)
                .aliases(&["company_name", "organization", "business", "org"]),
            FieldSpec::new("type", "Type", FieldType::Select)
                .required()
                .options(&["customer", "vendor", "both"])
                .aliases(&["contact_type", "category", "role"])
                .transformer(TransformerKind::Keyword {
                    rules: vec![
                        KeywordRule::new(&["vendor", "supplier"], "vendor"),
                        KeywordRule::new(&["both"], "both"),
                    ],
                    fallback: "customer".to_string(),
                }),
            FieldSpec::new("address", "Address", FieldType::String)
                .aliases(&["street", "street_address", "location", "full_address"]),
            FieldSpec::new("notes", "Notes", FieldType::String)
                .aliases(&["comments", "remarks", "description"]),
        ],
    }
}

// ==========================================
// employees - 员工
// ==========================================
fn employees_schema() -> TargetSchema {
    TargetSchema {
        name: "Employees".to_string(),
        description: "Import employee records with job details and contact info".to_string(),
        unique_key: "email".to_string(),
        fields: vec![
            FieldSpec::new("name", "Full Name", FieldType::String)
                .required()
                .aliases(&["employee_name", "full_name", "employee"]),
            FieldSpec::new("email", "Email", FieldType::Email)
                .required()
                .unique()
                .aliases(&["email_address", "e-mail", "work_email"])
                .validator(email_validator()),
            FieldSpec::new("phone", "Phone", FieldType::Phone)
                .aliases(&["phone_number", "telephone", "mobile", "cell", "work_phone"])
                .validator(phone_validator()),
            FieldSpec::new("department", "Department", FieldType::String)
                .aliases(&["dept", "division", "team"])
                .on_blank(OnBlank::Default(json!("General"))),
            FieldSpec::new("job_title", "Position / Job Title", FieldType::String)
                .aliases(&["position", "title", "role", "designation"]),
            FieldSpec::new("start_date", "Hire Date", FieldType::Date)
                .aliases(&["hire_date", "join_date", "joining_date", "start"])
                .transformer(TransformerKind::Date)
                .on_blank(OnBlank::Today),
            FieldSpec::new("status", "Status", FieldType::Select)
                .options(&["active", "on_leave", "terminated"])
                .aliases(&["employment_status", "employee_status"])
                .transformer(TransformerKind::Keyword {
                    rules: vec![
                        KeywordRule::new(&["leave"], "on_leave"),
                        KeywordRule::new(&["terminated", "inactive"], "terminated"),
                    ],
                    fallback: "active".to_string(),
                })
                .on_blank(OnBlank::Default(json!("active"))),
        ],
    }
}
