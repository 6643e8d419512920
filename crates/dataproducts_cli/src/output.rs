use colored::*;
use dataproducts_core::DataProductDefinition;
use dataproducts_parquet::ColumnarSchema;
use serde_json::json;

pub fn print_definition(definition: &DataProductDefinition, schema: &ColumnarSchema, format: &str) {
    match format {
        "json" => print_definition_json(definition, schema),
        _ => print_definition_text(definition, schema),
    }
}

fn print_definition_text(definition: &DataProductDefinition, schema: &ColumnarSchema) {
    println!("\nData Product Summary:");
    println!("  Id:          {}", definition.id);
    println!("  FQN:         {}", or_na(&definition.fqn));
    println!("  Description: {}", or_na(&definition.description));
    if !definition.unique_key.is_empty() {
        println!("  Unique Key:  {}", definition.unique_key.join(", "));
    }
    println!("  Columns:     {}", schema.len());

    println!("\n{}", "Columns:".bold());
    for column in schema.columns() {
        let logical = column
            .logical
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        let nullability = if column.nullable {
            "optional".yellow()
        } else {
            "required".green()
        };
        println!(
            "  {:<24} {:<10} {}{}  {}",
            column.name,
            column.semantic.as_str(),
            column.physical,
            logical,
            nullability
        );
    }
}

fn print_definition_json(definition: &DataProductDefinition, schema: &ColumnarSchema) {
    let output = json!({
        "id": definition.id,
        "fqn": definition.fqn,
        "description": definition.description,
        "unique_key": definition.unique_key,
        "schema": schema,
    });

    println!("{}", to_pretty(&output));
}

pub fn print_catalog(definitions: &[&DataProductDefinition], format: &str) {
    if format == "json" {
        let output: Vec<_> = definitions
            .iter()
            .map(|d| json!({"id": d.id, "fqn": d.fqn, "data_points": d.data_points.len()}))
            .collect();
        println!("{}", to_pretty(&output));
        return;
    }

    for definition in definitions {
        println!(
            "{}  {}  ({} data points)",
            definition.id.bold(),
            or_na(&definition.fqn),
            definition.data_points.len()
        );
    }
    println!("\nTotal: {}", definitions.len());
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

fn to_pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
