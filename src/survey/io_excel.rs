// Reading the survey export from an Excel workbook.

use calamine::{open_workbook, Reader, Xlsx};
use survey_processing::builder::select_sheet;

use crate::survey::{io_common::cell_to_string, *};

/// All the rows of a worksheet, as text. If the worksheet does not exist,
/// the first one is read and the substitution is returned.
pub fn read_excel_rows(
    path: &str,
    worksheet_name: &str,
) -> BSurveyResult<(Vec<Vec<String>>, Option<ParseIssue>)> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    debug!(
        "read_excel_rows: path: {:?} worksheets: {:?}",
        path, sheet_names
    );

    let (sheet, issue) = select_sheet(&sheet_names, worksheet_name).context(SurveyDataSnafu {})?;
    let wrange = workbook
        .worksheet_range(&sheet)
        .context(EmptyExcelSnafu {})?
        .context(OpeningExcelSnafu { path })?;

    let rows: Vec<Vec<String>> = wrange
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    debug!(
        "read_excel_rows: worksheet {:?}: {} rows, header: {:?}",
        sheet,
        rows.len(),
        rows.first()
    );
    Ok((rows, issue))
}
