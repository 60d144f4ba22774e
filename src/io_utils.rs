//! CSV reading helpers for the directory-backed row store.
//!
//! Delimiters are chosen by extension (`.tsv` → tab, anything else → comma)
//! and input bytes are decoded with `encoding_rs`, defaulting to UTF-8.
//! Every file must start with a header row; cells that are empty after
//! trimming become [`RawValue::Null`].

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::data::{Header, RawValue, Record};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

fn raw_cell(text: String) -> RawValue {
    if text.trim().is_empty() {
        RawValue::Null
    } else {
        RawValue::String(text)
    }
}

/// Reads every data row of `reader` into records that share one header.
pub fn read_records<R>(reader: R, delimiter: u8, encoding: &'static Encoding) -> Result<Vec<Record>>
where
    R: Read,
{
    let mut csv_reader = open_csv_reader(reader, delimiter);
    let header = Arc::new(Header::new(reader_headers(&mut csv_reader, encoding)?));
    let mut records = Vec::new();
    let mut row = csv::ByteRecord::new();
    let mut line = 1usize;
    while csv_reader.read_byte_record(&mut row)? {
        line += 1;
        let values = decode_record(&row, encoding)
            .with_context(|| format!("Decoding row {line}"))?
            .into_iter()
            .map(raw_cell)
            .collect();
        records.push(Record::new(Arc::clone(&header), values));
    }
    Ok(records)
}

pub fn read_records_from_path(path: &Path, encoding: &'static Encoding) -> Result<Vec<Record>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    read_records(
        BufReader::new(file),
        resolve_input_delimiter(path),
        encoding,
    )
    .with_context(|| format!("Reading records from {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn delimiter_follows_extension() {
        assert_eq!(resolve_input_delimiter(Path::new("orders.TSV")), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("orders.csv")), b',');
        assert_eq!(resolve_input_delimiter(Path::new("orders")), b',');
    }

    #[test]
    fn unknown_encoding_label_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some(" latin1 ")).unwrap(), WINDOWS_1252);
    }

    #[test]
    fn records_share_header_and_blank_cells_are_null() {
        let input = "Name,Total,City\nAnn,\"1,000\", \nBob,20\n";
        let records = read_records(input.as_bytes(), b',', UTF_8).expect("records");
        assert_eq!(records.len(), 2);
        assert!(Arc::ptr_eq(records[0].header(), records[1].header()));
        assert_eq!(records[0].get("Total"), Some(&RawValue::from("1,000")));
        assert_eq!(records[0].get("City"), Some(&RawValue::Null));
        assert_eq!(records[1].get("City"), Some(&RawValue::Null));
    }

    #[test]
    fn non_utf8_input_is_decoded_with_requested_encoding() {
        let bytes = b"Name,Total\nJos\xe9,5\n";
        let records = read_records(&bytes[..], b',', WINDOWS_1252).expect("records");
        assert_eq!(records[0].text("Name").as_deref(), Some("José"));
        assert!(read_records(&bytes[..], b',', UTF_8).is_err());
    }
}
