// Primitives for reading CSV files.

use std::io::Read;

use crate::survey::{io_common::strip_bom, *};

pub fn read_csv_rows(path: &str, delimiter: u8) -> BSurveyResult<Vec<Vec<String>>> {
    let rdr = reader_builder(delimiter)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    collect_rows(rdr)
}

#[cfg(test)]
pub fn read_csv_text(text: &str, delimiter: u8) -> BSurveyResult<Vec<Vec<String>>> {
    collect_rows(reader_builder(delimiter).from_reader(text.as_bytes()))
}

// The header is read as a regular row. Rows may be shorter than the header.
fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter);
    builder
}

fn collect_rows<R: Read>(rdr: csv::Reader<R>) -> BSurveyResult<Vec<Vec<String>>> {
    let mut res: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let mut row: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        if lineno == 1 {
            if let Some(first) = row.first_mut() {
                *first = strip_bom(first).to_string();
            }
        }
        debug!("read_csv_rows: lineno: {:?} row: {:?}", lineno, row);
        res.push(row);
    }
    Ok(res)
}
