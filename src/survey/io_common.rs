use calamine::DataType;
use log::debug;

/// The text of a spreadsheet cell.
///
/// Whole numbers (zip codes for instance) are written without decimals.
pub fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) | DataType::DateTime(f) => float_to_string(*f),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => String::new(),
        other => {
            debug!("cell_to_string: cell {:?} read as empty", other);
            String::new()
        }
    }
}

fn float_to_string(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Removes the byte order mark some tools write at the start of a file.
pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(cell_to_string(&DataType::Float(90001.0)), "90001");
        assert_eq!(cell_to_string(&DataType::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&DataType::Int(-3)), "-3");
        assert_eq!(cell_to_string(&DataType::String("SPA 4".to_string())), "SPA 4");
        assert_eq!(cell_to_string(&DataType::Empty), "");
        assert_eq!(cell_to_string(&DataType::Bool(true)), "true");
    }

    #[test]
    fn bom() {
        assert_eq!(strip_bom("\u{feff}Organization Name"), "Organization Name");
        assert_eq!(strip_bom("Sector"), "Sector");
    }
}
