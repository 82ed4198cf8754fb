//! CSV snapshot IO.
//!
//! Column types are inferred from the non-empty cells of each column, in
//! this order: int, float, bool (`true`/`false`), datetime, string. Empty
//! cells are missing values.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use featcraft_core::prelude::{Column, DataType, Scalar, Schema, Table};
use featcraft_core::types::parse_datetime_ms;

use crate::error::{Result, StoreError};

fn csv_err(e: ::csv::Error) -> StoreError {
    StoreError::Csv(e.to_string())
}

/// Narrowest type every non-empty cell parses as.
pub fn infer_type<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> DataType {
    let mut present = cells.map(str::trim).filter(|c| !c.is_empty()).peekable();
    if present.peek().is_none() {
        return DataType::Str;
    }
    let all = |f: fn(&str) -> bool| present.clone().all(f);
    if all(|c| c.parse::<i64>().is_ok()) {
        DataType::Int
    } else if all(|c| c.parse::<f64>().is_ok()) {
        DataType::Float
    } else if all(|c| c.eq_ignore_ascii_case("true") || c.eq_ignore_ascii_case("false")) {
        DataType::Bool
    } else if all(|c| parse_datetime_ms(c).is_some()) {
        DataType::DateTime
    } else {
        DataType::Str
    }
}

/// Read CSV with a header row. With `schema`, the listed columns are parsed
/// as the given types and a cell that does not fit is an error; columns
/// missing from the schema are inferred.
pub fn read_csv<R: Read>(reader: R, schema: Option<&Schema>) -> Result<Table> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        for (i, cell) in record.iter().enumerate() {
            raw[i].push(cell.to_string());
        }
    }

    let mut columns = Vec::with_capacity(headers.len());
    for (name, cells) in headers.into_iter().zip(raw) {
        let declared = schema.and_then(|s| s.data_type_of(&name));
        let data_type = declared.unwrap_or_else(|| infer_type(cells.iter().map(String::as_str)));
        let values = cells
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                if cell.trim().is_empty() {
                    return Ok(Scalar::Null);
                }
                Scalar::coerce_str(cell, data_type).ok_or_else(|| {
                    StoreError::Csv(format!(
                        "row {}: '{cell}' in column '{name}' is not a valid {data_type}",
                        row + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        columns.push(Column::new(name, data_type, values));
    }
    Ok(Table::new(columns)?)
}

pub fn read_csv_path(path: impl AsRef<Path>, schema: Option<&Schema>) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| StoreError::Io(format!("open {}: {e}", path.display())))?;
    let table = read_csv(BufReader::new(file), schema)?;
    tracing::debug!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "loaded csv"
    );
    Ok(table)
}

/// Write `table` with a header row. Missing values are empty cells.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = ::csv::Writer::from_writer(writer);
    wtr.write_record(table.column_names()).map_err(csv_err)?;
    for row in 0..table.num_rows() {
        wtr.write_record(table.columns.iter().map(|c| c.values[row].to_string()))
            .map_err(csv_err)?;
    }
    wtr.flush()
        .map_err(|e| StoreError::Io(format!("flush: {e}")))?;
    Ok(())
}

pub fn write_csv_path(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| StoreError::Io(format!("create {}: {e}", path.display())))?;
    write_csv(table, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use featcraft_core::prelude::Field;

    const SALES: &str = "\
store,date,units,price,promo
a,2024-01-01,3,9.5,true
a,2024-01-02,,10,false
b,2024-01-01,7,8.25,
";

    #[test]
    fn infers_column_types() {
        let table = read_csv(SALES.as_bytes(), None).unwrap();
        let schema = table.schema();
        assert_eq!(schema.data_type_of("store"), Some(DataType::Str));
        assert_eq!(schema.data_type_of("date"), Some(DataType::DateTime));
        assert_eq!(schema.data_type_of("units"), Some(DataType::Int));
        assert_eq!(schema.data_type_of("price"), Some(DataType::Float));
        assert_eq!(schema.data_type_of("promo"), Some(DataType::Bool));
        assert_eq!(table.column("units").unwrap().values[1], Scalar::Null);
        assert_eq!(table.column("promo").unwrap().values[2], Scalar::Null);
    }

    #[test]
    fn declared_schema_wins_and_rejects_bad_cells() {
        let schema = Schema::new(vec![Field::new("units", DataType::Float)]);
        let table = read_csv(SALES.as_bytes(), Some(&schema)).unwrap();
        assert_eq!(table.column("units").unwrap().values[0], Scalar::Float(3.0));

        let strict = Schema::new(vec![Field::new("store", DataType::Int)]);
        assert!(matches!(
            read_csv(SALES.as_bytes(), Some(&strict)),
            Err(StoreError::Csv(_))
        ));
    }

    #[test]
    fn file_write_then_read_keeps_values() {
        let mut src = tempfile::NamedTempFile::new().unwrap();
        src.write_all(SALES.as_bytes()).unwrap();
        let table = read_csv_path(src.path(), None).unwrap();

        let out = tempfile::NamedTempFile::new().unwrap();
        write_csv_path(&table, out.path()).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert!(text.starts_with("store,date,units,price,promo\n"));
        assert!(text.contains("a,2024-01-02 00:00:00,,10,false"));
        assert_eq!(read_csv_path(out.path(), None).unwrap(), table);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let bad = "a,b\n1,2\n3\n";
        assert!(read_csv(bad.as_bytes(), None).is_err());
    }
}
