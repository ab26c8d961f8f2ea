use anyhow::Result;
use csv::Writer;
use serde_json::Value;

use crate::services::query_engine::ResultSet;

/// Render a result set as CSV, one header row followed by the data rows.
pub fn export_to_csv(result: &ResultSet) -> Result<String> {
    let mut wtr = Writer::from_writer(vec![]);

    let headers: Vec<&str> = result.fields.iter().map(|f| f.name.as_str()).collect();
    wtr.write_record(&headers)?;

    for row in &result.rows {
        let values: Vec<String> = result
            .fields
            .iter()
            .map(|f| cell_text(row.get(&f.name)))
            .collect();
        wtr.write_record(&values)?;
    }

    let bytes = wtr.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

/// Flatten a JSON cell to its text form. Strings are written bare,
/// nulls become empty cells, and nested values keep their JSON shape.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn csv_export_filename(date: chrono::NaiveDate) -> String {
    format!("query-results-{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api::FieldInfo;
    use serde_json::{Map, json};

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn result_set(fields: &[&str], rows: Vec<Map<String, Value>>) -> ResultSet {
        ResultSet {
            fields: fields
                .iter()
                .map(|n| FieldInfo {
                    name: n.to_string(),
                })
                .collect(),
            rows,
            ..ResultSet::default()
        }
    }

    #[test]
    fn exports_header_and_rows_in_field_order() {
        let rs = result_set(
            &["id", "name"],
            vec![
                row(&[("id", json!(1)), ("name", json!("ada"))]),
                row(&[("id", json!(2)), ("name", json!("grace"))]),
            ],
        );
        let csv = export_to_csv(&rs).unwrap();
        assert_eq!(csv, "id,name\n1,ada\n2,grace\n");
    }

    #[test]
    fn nulls_and_missing_cells_are_empty() {
        let rs = result_set(
            &["id", "note"],
            vec![
                row(&[("id", json!(1)), ("note", Value::Null)]),
                row(&[("id", json!(2))]),
            ],
        );
        let csv = export_to_csv(&rs).unwrap();
        assert_eq!(csv, "id,note\n1,\n2,\n");
    }

    #[test]
    fn nested_json_keeps_its_shape_and_gets_quoted() {
        let rs = result_set(
            &["meta"],
            vec![row(&[("meta", json!({"a": 1}))])],
        );
        let csv = export_to_csv(&rs).unwrap();
        assert_eq!(csv, "meta\n\"{\"\"a\"\":1}\"\n");
    }

    #[test]
    fn filename_carries_the_date() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(csv_export_filename(date), "query-results-2025-03-07.csv");
    }
}
