// ==========================================
// 批量数据导入引擎 - 导入模板导出
// ==========================================
// 职责: 生成 CSV 模板（表头 = 字段 label，单行按类型合成示例值）
// ==========================================

use crate::domain::schema::{FieldSpec, FieldType, TargetSchema};
use crate::importer::error::{ImportError, ImportResult};
use csv::WriterBuilder;

/// 模板文件名
pub fn template_file_name(target: &str) -> String {
    format!("{}-import-template.csv", target)
}

/// 字段示例值
pub fn example_value(field: &FieldSpec) -> String {
    match field.field_type {
        FieldType::Email => "example@company.com".to_string(),
        FieldType::Phone => "(416) 555-0123".to_string(),
        FieldType::Number if field.key.contains("price") => "29.99".to_string(),
        FieldType::Number => "100".to_string(),
        FieldType::Date => "2024-01-15".to_string(),
        FieldType::Select => field.options.first().cloned().unwrap_or_default(),
        FieldType::String => format!("Example {}", field.label),
    }
}

/// 渲染 CSV 模板文本
pub fn render_template(schema: &TargetSchema) -> ImportResult<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(schema.fields.iter().map(|f| f.label.as_str()))?;
    writer.write_record(schema.fields.iter().map(example_value))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Other(anyhow::anyhow!(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Other(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::schema_registry::SchemaRegistry;

    #[test]
    fn test_products_template() {
        let registry = SchemaRegistry::builtin();
        let csv = render_template(registry.get("products").unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Product Name,SKU,Description,Sell Price,Cost Price"));
        assert!(lines[1].starts_with("Example Product Name,Example SKU,Example Description,29.99,29.99,100,100"));
    }

    #[test]
    fn test_employees_example_row() {
        let registry = SchemaRegistry::builtin();
        let csv = render_template(registry.get("employees").unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[1],
            "Example Full Name,example@company.com,(416) 555-0123,Example Department,\
             Example Position / Job Title,2024-01-15,active"
        );
    }

    #[test]
    fn test_template_file_name() {
        assert_eq!(template_file_name("contacts"), "contacts-import-template.csv");
    }
}
