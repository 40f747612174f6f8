//! CSV persistence for fingerprint rows
//!
//! The known-identity store and named capture files share one column layout.
//! Capture rows leave `ID` and `Log` empty. Files are only ever appended to.

use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use super::attributes::Attributes;
use super::types::{Fingerprint, FingerprintRecord, HashField, HashFields};
use crate::error::{Result, RevisitError};

/// Header written at the top of every store and capture file
pub const COLUMNS: [&str; 13] = [
    "ID",
    "Log",
    "Attributes",
    "AttributesHash",
    "Audio",
    "Fonts",
    "Geom Canvas",
    "Media Capabilities",
    "MediaHash",
    "Name",
    "Plugins",
    "PluginsHash",
    "TXT Canvas",
];

/// One parsed CSV row, before it is interpreted as a record or a capture
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// 1-based data row number, for diagnostics
    pub row: usize,
    pub id: Option<u64>,
    pub log: Option<u64>,
    /// `None` when the column was empty or not valid JSON object text
    pub attributes: Option<Attributes>,
    pub attributes_hash: Option<String>,
    pub hashes: HashFields,
}

impl CsvRow {
    /// Store interpretation; rows without a numeric ID/Log are unusable
    pub fn into_record(self) -> Option<FingerprintRecord> {
        Some(FingerprintRecord {
            id: self.id?,
            log: self.log?,
            attributes: self.attributes,
            attributes_hash: self.attributes_hash,
            hashes: self.hashes,
        })
    }

    /// Capture interpretation; rows without attributes cannot be replayed
    pub fn into_fingerprint(self) -> Option<Fingerprint> {
        Some(Fingerprint {
            attributes: self.attributes?,
            attributes_hash: self.attributes_hash,
            hashes: self.hashes,
        })
    }
}

/// Maps CSV column indices to row fields
#[derive(Debug, Default)]
struct ColumnMap {
    id: Option<usize>,
    log: Option<usize>,
    attributes: Option<usize>,
    attributes_hash: Option<usize>,
    hashes: Vec<(HashField, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let mut map = Self::default();

        for (i, header) in headers.iter().enumerate() {
            match header {
                "ID" => map.id = Some(i),
                "Log" => map.log = Some(i),
                "Attributes" => map.attributes = Some(i),
                "AttributesHash" => map.attributes_hash = Some(i),
                other => {
                    if let Some(field) = HashField::from_column(other) {
                        map.hashes.push((field, i));
                    }
                }
            }
        }

        if map.attributes.is_none() {
            return Err(RevisitError::MalformedRow {
                row: 0,
                reason: "header has no 'Attributes' column".into(),
            });
        }

        Ok(map)
    }
}

/// Read every row of a store or capture file. A missing or empty file reads as no rows.
pub fn read_rows(path: &Path) -> Result<Vec<CsvRow>> {
    if !path.exists() {
        debug!(path = ?path, "No CSV file found, returning no rows");
        return Ok(Vec::new());
    }

    let contents = fs::read(path).map_err(|e| RevisitError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    parse_rows(contents.as_slice())
}

/// Parse CSV with a header row into rows. Field values are kept byte-exact;
/// rows that cannot be decoded are skipped with a warning.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<CsvRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (i, record) in csv_reader.byte_records().enumerate() {
        let row = i + 1;
        let record = match record {
            Ok(bytes) => match csv::StringRecord::from_byte_record(bytes) {
                Ok(record) => record,
                Err(e) => {
                    warn!(row, error = %e, "Skipping row that is not valid UTF-8");
                    continue;
                }
            },
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(row, error = %e, "Skipping unreadable row");
                continue;
            }
        };

        let get_field = |idx: Option<usize>| field(&record, idx);

        let attributes = match get_field(columns.attributes) {
            Some(text) => match Attributes::from_json_str(text) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!(row, error = %e, "Stored attributes are not valid JSON");
                    None
                }
            },
            None => None,
        };

        let mut hashes = HashFields::default();
        for (field, idx) in &columns.hashes {
            hashes.set(*field, get_field(Some(*idx)).map(String::from));
        }

        rows.push(CsvRow {
            row,
            id: get_field(columns.id).and_then(|s| s.trim().parse().ok()),
            log: get_field(columns.log).and_then(|s| s.trim().parse().ok()),
            attributes,
            attributes_hash: get_field(columns.attributes_hash).map(String::from),
            hashes,
        });
    }

    Ok(rows)
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i)).filter(|s| !s.is_empty())
}

/// Append one stored record, writing the header first when the file is new or empty
pub fn append_record(path: &Path, record: &FingerprintRecord) -> Result<()> {
    let attributes = match &record.attributes {
        Some(a) => serde_json::to_string(a)?,
        None => String::new(),
    };
    append_row(
        path,
        &record.id.to_string(),
        &record.log.to_string(),
        &attributes,
        record.attributes_hash.as_deref(),
        &record.hashes,
    )
}

/// Append a capture row (no identity), writing the header first when needed
pub fn append_capture(path: &Path, fingerprint: &Fingerprint) -> Result<()> {
    let attributes = serde_json::to_string(&fingerprint.attributes)?;
    append_row(
        path,
        "",
        "",
        &attributes,
        fingerprint.attributes_hash.as_deref(),
        &fingerprint.hashes,
    )
}

fn append_row(
    path: &Path,
    id: &str,
    log: &str,
    attributes: &str,
    attributes_hash: Option<&str>,
    hashes: &HashFields,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| RevisitError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RevisitError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record(COLUMNS)?;
    }

    let mut fields: Vec<&str> = Vec::with_capacity(COLUMNS.len());
    fields.push(id);
    fields.push(log);
    fields.push(attributes);
    fields.push(attributes_hash.unwrap_or(""));
    for field in HashField::ALL {
        fields.push(hashes.get(field).unwrap_or(""));
    }
    writer.write_record(&fields)?;

    writer.flush().map_err(|e| RevisitError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(path = ?path, "Appended CSV row");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn sample_fingerprint() -> Fingerprint {
        Fingerprint::from_value(json!({
            "Attributes": {"IP": "1.2.3.4", "CPU": 8, "Screen Width": 1920, "Screen Height": 1080},
            "AttributesHash": "deadbeef",
            "Audio": "a1",
            "Geom Canvas": "g1",
            "Fonts": "Arial, \"Comic Sans\"",
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let rows = read_rows(&dir.path().join("none.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.csv");
        let fp = sample_fingerprint();

        append_record(&path, &FingerprintRecord::from_fingerprint(&fp, 0, 0)).unwrap();
        append_record(&path, &FingerprintRecord::from_fingerprint(&fp, 0, 1)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("ID,Log,Attributes").count(), 1);

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].log, Some(1));
        let record = rows[0].clone().into_record().unwrap();
        assert_eq!(record.attributes.as_ref(), Some(&fp.attributes));
        assert_eq!(record.hashes.get(HashField::Fonts), Some("Arial, \"Comic Sans\""));
        assert_eq!(record.attributes_hash.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn test_attribute_order_survives_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.csv");
        let fp = sample_fingerprint();
        append_record(&path, &FingerprintRecord::from_fingerprint(&fp, 3, 0)).unwrap();

        let rows = read_rows(&path).unwrap();
        let keys: Vec<String> = rows[0]
            .attributes
            .as_ref()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect();
        assert_eq!(keys, vec!["IP", "CPU", "Screen Width", "Screen Height"]);
    }

    #[test]
    fn test_malformed_attributes_are_kept_as_none() {
        let text = "ID,Log,Attributes,Audio\n0,0,{not json},a1\n1,0,\"{\"\"CPU\"\": 4}\",a2\n";
        let rows = parse_rows(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].attributes.is_none());
        assert_eq!(rows[0].id, Some(0));
        assert!(rows[1].attributes.is_some());
    }

    #[test]
    fn test_capture_rows_have_no_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brave.csv");
        append_capture(&path, &sample_fingerprint()).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows[0].id, None);
        assert!(rows[0].clone().into_record().is_none());
        assert!(rows[0].clone().into_fingerprint().is_some());
    }

    #[test]
    fn test_corrupt_row_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.csv");
        let fp = sample_fingerprint();
        append_record(&path, &FingerprintRecord::from_fingerprint(&fp, 0, 0)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"1,0,{},,bad\xff\xfe,,,,,,,,\n").unwrap();
        drop(file);

        append_record(&path, &FingerprintRecord::from_fingerprint(&fp, 0, 1)).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].log, Some(0));
        assert_eq!(rows[1].log, Some(1));
        assert_eq!(rows[1].row, 3);
    }

    #[test]
    fn test_hash_whitespace_survives_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.csv");
        let mut fp = sample_fingerprint();
        fp.hashes.set(HashField::Audio, Some(" padded ".into()));
        fp.hashes.set(HashField::Fonts, Some("Arial \t".into()));
        append_record(&path, &FingerprintRecord::from_fingerprint(&fp, 0, 0)).unwrap();

        let record = read_rows(&path).unwrap().remove(0).into_record().unwrap();
        assert_eq!(record.hashes.get(HashField::Audio), Some(" padded "));
        assert_eq!(record.hashes.get(HashField::Fonts), Some("Arial \t"));
        assert!(record.hashes.same(&fp.hashes, HashField::Audio));
    }

    #[test]
    fn test_header_without_attributes_is_rejected() {
        let err = parse_rows("ID,Log\n0,0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, RevisitError::MalformedRow { .. }));
    }
}
