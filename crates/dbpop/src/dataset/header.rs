/// Tag marking a column as base64 encoded binary.
pub const BINARY_TAG: &str = "b64";

/// Parsed CSV column header: `<column>(*<tag>)*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileHeader {
    pub column_name: String,
    pub binary: bool,
}

impl DataFileHeader {
    /// Strip `*tag` suffixes right to left. Only `b64` has a meaning; other tags are dropped.
    pub fn parse(header: &str) -> Self {
        let mut name = header;
        let mut binary = false;
        while let Some((rest, tag)) = name.rsplit_once('*') {
            if tag == BINARY_TAG {
                binary = true;
            }
            name = rest;
        }
        Self {
            column_name: name.to_string(),
            binary,
        }
    }

    /// Header text for a downloaded column.
    pub fn format(column_name: &str, binary: bool) -> String {
        if binary {
            format!("{}*{}", column_name, BINARY_TAG)
        } else {
            column_name.to_string()
        }
    }
}
