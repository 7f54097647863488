use crate::error::LoadError;
use crate::layout::{Field, Layout, ResolvedColumn};
use crate::types::{Dataset, Record};
use crate::util::{non_blank, parse_f64_safe};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveTime;
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened while cleaning a sheet. Coercions are not errors, but they
/// are counted so the user can see how much of the data was zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_missing_code: usize,
    /// Blank or non-numeric cells in numeric columns, replaced by 0.
    pub coerced_values: usize,
    pub coerced_by_column: BTreeMap<String, usize>,
}

/// Read the first sheet (or the CSV) at `path` and clean it with `layout`.
pub fn load_and_clean(path: &Path, layout: &Layout) -> Result<Dataset, LoadError> {
    let rows = read_rows(path)?;
    let (records, report) = normalize(&rows, layout)?;
    info!(
        path = %path.display(),
        layout = %layout.name,
        total_rows = report.total_rows,
        kept_rows = report.kept_rows,
        "loaded dataset"
    );
    if report.dropped_missing_code > 0 {
        warn!(
            dropped = report.dropped_missing_code,
            "rows without a code were dropped"
        );
    }
    for (column, count) in &report.coerced_by_column {
        warn!(column = %column, count, "non-numeric values coerced to 0");
    }
    Ok(Dataset {
        layout: layout.clone(),
        records,
        report,
    })
}

/// Raw cell text for every row of the file, header included.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_csv_rows(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path),
        other => Err(LoadError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            other.to_string()
        })),
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<String>>, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::EmptyWorkbook)??;
    // A range starts at its first used cell; pad so column A stays index 0.
    let lead = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    Ok(range
        .rows()
        .map(|r| {
            std::iter::repeat(String::new())
                .take(lead)
                .chain(r.iter().map(cell_to_string))
                .collect()
        })
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(v) => match v.as_datetime() {
            Some(dt) if dt.time() == NaiveTime::MIN => dt.date().format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => v.to_string(),
        },
        Data::DateTimeIso(v) => v.to_string(),
        Data::DurationIso(v) => v.to_string(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Map positional cells to records. The first row is the header.
pub fn normalize(
    rows: &[Vec<String>],
    layout: &Layout,
) -> Result<(Vec<Record>, LoadReport), LoadError> {
    let columns = layout.resolve()?;
    let (header, body) = rows.split_first().ok_or(LoadError::MissingHeader)?;
    if let Some(missing) = columns.iter().find(|c| c.index >= header.len()) {
        return Err(LoadError::MissingColumn {
            column: missing.letter.clone(),
            width: header.len(),
        });
    }
    debug!(header = ?header, "header row");

    let mut report = LoadReport::default();
    let mut records = Vec::with_capacity(body.len());
    for row in body {
        report.total_rows += 1;
        match clean_row(row, &columns, &mut report) {
            Some(record) => records.push(record),
            None => report.dropped_missing_code += 1,
        }
    }
    report.kept_rows = records.len();
    Ok((records, report))
}

fn clean_row(row: &[String], columns: &[ResolvedColumn], report: &mut LoadReport) -> Option<Record> {
    let cell = |idx: usize| row.get(idx).map(String::as_str);

    let code_col = columns.iter().find(|c| c.field == Field::Code)?;
    let mut record = Record {
        code: non_blank(cell(code_col.index))?,
        ..Record::default()
    };

    for col in columns {
        let raw = cell(col.index);
        match col.field {
            Field::Code => {}
            Field::Category => record.category = non_blank(raw),
            Field::Description => record.description = non_blank(raw),
            Field::Numeric(field) => match parse_f64_safe(raw) {
                Some(v) => record.set_numeric(field, v),
                None => {
                    record.set_numeric(field, 0.0);
                    report.coerced_values += 1;
                    *report.coerced_by_column.entry(col.name.clone()).or_insert(0) += 1;
                }
            },
            Field::Attribute => {
                if let Some(v) = non_blank(raw) {
                    record.attributes.insert(col.name.clone(), v);
                }
            }
        }
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::builtin;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_test_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("service-kpi-{prefix}-{nanos}"))
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn services_header() -> Vec<String> {
        row(&[
            "Codice", "Categoria", "Descrizione", "Distr", "Prezzo", "Ore", "Personale",
            "Materiale", "Noleggi", "Q.ty",
        ])
    }

    #[test]
    fn drops_rows_without_code_and_coerces_numbers() {
        let layout = builtin("services").unwrap();
        let rows = vec![
            services_header(),
            row(&["S1", "Viso", "Pulizia", "0", "100", "1", "10", "5", "5", "2"]),
            row(&["", "Viso", "Orphan", "0", "999", "1", "1", "1", "1", "1"]),
            row(&["S2", "", "Massaggio", "x", "50", "", "5", "abc", "0", "1"]),
        ];

        let (records, report) = normalize(&rows, &layout).expect("normalize should succeed");

        assert_eq!(records.len(), 2);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.dropped_missing_code, 1);
        assert_eq!(report.coerced_values, 3);
        assert_eq!(report.coerced_by_column.get("consumables_cost"), Some(&1));
        assert_eq!(report.coerced_by_column.get("labor_hours"), Some(&1));
        assert_eq!(report.coerced_by_column.get("cost_distribution"), Some(&1));

        let s2 = &records[1];
        assert_eq!(s2.code, "S2");
        assert_eq!(s2.category, None);
        assert_eq!(s2.consumables_cost, 0.0);
        assert_eq!(s2.sale_price, 50.0);
        assert!(records.iter().all(|r| r.description.as_deref() != Some("Orphan")));
    }

    #[test]
    fn decimal_commas_are_coerced_and_exponents_parse() {
        let layout = builtin("services").unwrap();
        let rows = vec![
            services_header(),
            row(&["S1", "Viso", "Pulizia", "0", "12,5", "1", "1e3", "0", "0", "1"]),
        ];

        let (records, report) = normalize(&rows, &layout).unwrap();

        assert_eq!(records[0].sale_price, 0.0);
        assert_eq!(records[0].staff_cost, 1000.0);
        assert_eq!(report.coerced_values, 1);
        assert_eq!(report.coerced_by_column.get("sale_price"), Some(&1));
        assert_eq!(report.coerced_by_column.get("staff_cost"), None);
    }

    #[test]
    fn short_rows_read_as_blank_cells() {
        let layout = builtin("services").unwrap();
        let rows = vec![services_header(), row(&["S1", "Viso", "Pulizia", "0", "80"])];

        let (records, report) = normalize(&rows, &layout).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sale_price, 80.0);
        assert_eq!(records[0].quantity, 0.0);
        assert_eq!(report.coerced_values, 5);
    }

    #[test]
    fn narrow_header_is_a_missing_column_error() {
        let layout = builtin("services").unwrap();
        let rows = vec![row(&["Codice", "Categoria"])];
        let err = normalize(&rows, &layout).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { ref column, width: 2 } if column == "C"));
    }

    #[test]
    fn empty_file_has_no_header() {
        let layout = builtin("services").unwrap();
        assert!(matches!(
            normalize(&[], &layout),
            Err(LoadError::MissingHeader)
        ));
    }

    #[test]
    fn territorial_layout_keeps_attributes_and_skips_unmapped_columns() {
        let layout = builtin("territorial").unwrap();
        let rows = vec![
            row(&["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L"]),
            row(&[
                "T1", "Lazio", "RM", "Roma", "2024-02-01", "Visita", "120", "3", "ignored", "",
                "", "40",
            ]),
        ];

        let (records, _) = normalize(&rows, &layout).unwrap();

        let r = &records[0];
        assert_eq!(r.text("region"), Some("Lazio"));
        assert_eq!(r.text("commune"), Some("Roma"));
        assert_eq!(r.text("service_date"), Some("2024-02-01"));
        assert_eq!(r.staff_cost, 40.0);
        assert_eq!(r.quantity, 3.0);
        assert_eq!(r.attributes.len(), 4);
    }

    #[test]
    fn loads_csv_files_from_disk() {
        let dir = unique_test_dir("load-csv");
        fs::create_dir_all(&dir).expect("should create temp dir");
        let path = dir.join("services.csv");
        fs::write(
            &path,
            "code,category,description,dist,price,hours,staff,cons,rent,qty\n\
             S1,Viso,Pulizia,0,100,1,10,5,5,2\n\
             ,Viso,Orphan,0,1,1,1,1,1,1\n",
        )
        .expect("should write csv fixture");

        let dataset = load_and_clean(&path, &builtin("services").unwrap())
            .expect("load should succeed");

        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.report.dropped_missing_code, 1);
        assert_eq!(dataset.layout.name, "services");

        fs::remove_dir_all(&dir).expect("should cleanup temp dir");
    }

    fn demo_file(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
    }

    #[test]
    fn loads_services_workbook() {
        let dataset = load_and_clean(&demo_file("services.xlsx"), &builtin("services").unwrap())
            .expect("workbook should load");

        assert_eq!(dataset.report.total_rows, 4);
        assert_eq!(dataset.report.dropped_missing_code, 1);
        let codes: Vec<&str> = dataset.records.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["S001", "1007", "S003"]);

        let peeling = &dataset.records[1];
        assert_eq!(peeling.description.as_deref(), Some("Peeling"));
        assert_eq!(peeling.cost_distribution, 0.1);
        assert_eq!(peeling.sale_price, 80.0);
        assert_eq!(peeling.quantity, 15.0);

        // Text cells in numeric columns: "12,5" is zeroed, "1e3" is a number.
        let massage = &dataset.records[2];
        assert_eq!(massage.sale_price, 0.0);
        assert_eq!(massage.staff_cost, 1000.0);
        assert_eq!(dataset.report.coerced_values, 1);
        assert_eq!(dataset.report.coerced_by_column.get("sale_price"), Some(&1));
    }

    #[test]
    fn loads_territorial_workbook_with_date_cells() {
        let dataset = load_and_clean(
            &demo_file("territorial.xlsx"),
            &builtin("territorial").unwrap(),
        )
        .expect("workbook should load");

        assert_eq!(dataset.records.len(), 3);
        assert_eq!(dataset.report.coerced_values, 0);
        let dates: Vec<Option<&str>> = dataset
            .records
            .iter()
            .map(|r| r.text("service_date"))
            .collect();
        assert_eq!(
            dates,
            vec![Some("2024-02-01"), Some("2024-02-28"), Some("2024-03-11")]
        );

        let rome = &dataset.records[0];
        assert_eq!(rome.text("commune"), Some("Roma"));
        assert_eq!(rome.sale_price, 90.0);
        assert_eq!(rome.quantity, 12.0);
        assert_eq!(rome.staff_cost, 35.0);
    }

    #[test]
    fn workbook_rows_are_padded_to_column_a() {
        let rows = read_rows(&demo_file("shifted.xlsx")).expect("workbook should read");

        assert_eq!(rows[0], row(&["", "Codice", "Categoria"]));
        assert_eq!(rows[1], row(&["", "S001", "Viso"]));
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = read_rows(Path::new("data.txt")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ref e) if e == "txt"));
    }
}
