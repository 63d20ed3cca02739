//! Integration tests for reading and projecting alignment streams.
//!
//! Inputs are synthesized with `RecordBuilder` and written through the same
//! compressed channels used for output, then streamed back from disk:
//! - Header framings (binary, text, absent) and compressed inputs
//! - Field projection scenarios (CIGAR metrics, mate reference, absent tags)
//! - Header model queries through an opened stream

use alnstream::io::bam::header::{write_header, Reference};
use alnstream::io::bam::tags::IntegerType;
use alnstream::io::bam::{
    AlignmentStream, Field, FieldValue, FieldValues, Header, HeaderFraming, ProgramGuess,
    RecordBuilder, StreamState, TagValue,
};
use alnstream::io::{CompressedWriter, DataSink};
use alnstream::Result;
use std::io::{BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER_TEXT: &str = "@HD\tVN:1.6\tSO:coordinate\n\
@SQ\tSN:chr1\tLN:1000\n\
@SQ\tSN:chr2\tLN:2000\n\
@RG\tID:grp1\tSM:sample1\n\
@PG\tID:bwa\tPN:bwa\tVN:0.7.17\n\
@PG\tID:samtools\tPN:samtools\tPP:bwa\n\
@CO\tsynthetic test data\n";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn header() -> Header {
    Header::new(
        HEADER_TEXT.to_string(),
        vec![Reference::new("chr1", 1000), Reference::new("chr2", 2000)],
    )
}

fn records() -> Vec<Vec<u8>> {
    vec![
        RecordBuilder::new("plain")
            .reference_id(0)
            .position(10)
            .mapq(60)
            .cigar_text("4M")
            .unwrap()
            .sequence(b"ACGT")
            .quality(b"IIII")
            .tag(*b"NM", TagValue::Integer(IntegerType::UInt8, 0))
            .build()
            .unwrap(),
        RecordBuilder::new("clipped")
            .reference_id(1)
            .position(200)
            .flags(0x1 | 0x40)
            .cigar_text("2S4M2S")
            .unwrap()
            .sequence(b"NNACGTNN")
            .mate(0, 50)
            .template_length(-150)
            .tag(*b"NM", TagValue::Integer(IntegerType::UInt8, 1))
            .tag(*b"RG", TagValue::String("grp1".into()))
            .build()
            .unwrap(),
        RecordBuilder::new("unmapped")
            .flags(0x4)
            .sequence(b"GGCC")
            .build()
            .unwrap(),
    ]
}

fn binary_payload() -> Vec<u8> {
    let mut data = Vec::new();
    write_header(&mut data, &header()).unwrap();
    for r in records() {
        data.extend_from_slice(&r);
    }
    data
}

/// Write `payload` to `dir/name`, compressed according to the extension.
fn write_input(dir: &Path, name: &str, payload: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = CompressedWriter::new(DataSink::from_path(&path)).unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap();
    path
}

fn collect(stream_fields: &[&str], path: &Path) -> Result<Vec<FieldValues>> {
    let mut stream = AlignmentStream::from_path(path)?;
    stream.set_fields(stream_fields);
    let mut out = Vec::new();
    let mut values = FieldValues::new();
    while stream.advance(&mut values)? {
        out.push(std::mem::take(&mut values));
    }
    stream.close()?;
    Ok(out)
}

#[test]
fn test_bgzf_input_projection() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let path = write_input(dir.path(), "input.bam", &binary_payload());

    let rows = collect(
        &["QNAME", "RNAME", "POS", "CIGAR", "SEQ_LENGTH", "MAPPED_SEQ_LENGTH", "MRNM", "MPOS", "ISIZE"],
        &path,
    )?;
    assert_eq!(rows.len(), 3);

    let plain = &rows[0];
    assert_eq!(plain.get(&Field::QueryName).and_then(|v| v.as_str()), Some("plain"));
    assert_eq!(plain.get(&Field::ReferenceName).and_then(|v| v.as_str()), Some("chr1"));
    assert_eq!(plain.get(&Field::Position).and_then(|v| v.as_int()), Some(10));
    assert_eq!(plain.get(&Field::SeqLength).and_then(|v| v.as_int()), Some(4));
    assert_eq!(plain.get(&Field::MappedSeqLength).and_then(|v| v.as_int()), Some(4));
    assert_eq!(plain.get_by_name("MRNM").unwrap().to_string(), "*");
    assert_eq!(plain.get_by_name("MPOS").and_then(|v| v.as_int()), Some(0));

    let clipped = &rows[1];
    assert_eq!(clipped.get(&Field::Cigar).and_then(|v| v.as_str()), Some("2S4M2S"));
    assert_eq!(clipped.get(&Field::SeqLength).and_then(|v| v.as_int()), Some(8));
    assert_eq!(clipped.get(&Field::MappedSeqLength).and_then(|v| v.as_int()), Some(4));
    assert_eq!(clipped.get_by_name("MRNM").and_then(|v| v.as_str()), Some("chr1"));
    assert_eq!(clipped.get_by_name("MPOS").and_then(|v| v.as_int()), Some(50));
    assert_eq!(clipped.get_by_name("ISIZE").and_then(|v| v.as_int()), Some(-150));

    let unmapped = &rows[2];
    assert_eq!(unmapped.get_by_name("RNAME").unwrap().to_string(), "*");
    assert_eq!(unmapped.get_by_name("CIGAR").unwrap().to_string(), "*");
    assert_eq!(unmapped.get_by_name("SEQ_LENGTH").and_then(|v| v.as_int()), Some(4));
    assert_eq!(unmapped.get_by_name("MAPPED_SEQ_LENGTH").and_then(|v| v.as_int()), Some(4));
    Ok(())
}

#[test]
fn test_gzip_and_plain_inputs_agree() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    let payload = binary_payload();
    let gz = write_input(dir.path(), "input.raw.gz", &payload);
    let raw = write_input(dir.path(), "input.raw", &payload);

    let fields = ["QNAME", "FLAG", "SEQ", "QUAL", "NM"];
    let from_gz = collect(&fields, &gz)?;
    let from_raw = collect(&fields, &raw)?;
    assert_eq!(from_gz.len(), 3);
    for (a, b) in from_gz.iter().zip(&from_raw) {
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
    }
    assert_eq!(from_raw[0].get_by_name("QUAL").and_then(|v| v.as_str()), Some("IIII"));
    assert_eq!(from_raw[1].get_by_name("QUAL").unwrap().to_string(), "*");
    assert_eq!(from_raw[2].get_by_name("SEQ").and_then(|v| v.as_str()), Some("GGCC"));
    Ok(())
}

#[test]
fn test_absent_tag_is_sentinel() -> Result<()> {
    let mut stream = AlignmentStream::from_reader(Cursor::new(binary_payload()));
    stream.set_fields(&["NM", "RG", "XX"]);
    let mut values = FieldValues::new();

    assert!(stream.advance(&mut values)?);
    assert_eq!(values.get_by_name("NM").and_then(|v| v.as_int()), Some(0));
    assert_eq!(values.get_by_name("RG"), Some(&FieldValue::Absent));
    assert_eq!(values.get_by_name("XX").unwrap().to_string(), "*");

    assert!(stream.advance(&mut values)?);
    assert_eq!(values.get_by_name("RG").and_then(|v| v.as_str()), Some("grp1"));
    Ok(())
}

#[test]
fn test_unmapped_flag_predicates() -> Result<()> {
    let mut stream = AlignmentStream::from_reader(Cursor::new(binary_payload()));
    let mut values = FieldValues::new();
    for _ in 0..3 {
        assert!(stream.advance(&mut values)?);
    }
    let flags = stream.record().unwrap().flags();
    assert!(!flags.is_mapped());
    assert!(!flags.is_paired());
    assert!(!flags.is_reverse());
    assert!(!flags.is_secondary());
    assert!(!flags.is_duplicate());
    Ok(())
}

#[test]
fn test_header_model_through_stream() -> Result<()> {
    let mut stream = AlignmentStream::from_reader(Cursor::new(binary_payload()));
    let header = stream.open()?.clone();
    assert_eq!(stream.framing(), Some(HeaderFraming::Binary));

    assert_eq!(header.singleton_tag("HD", "SO"), Some("coordinate"));
    assert_eq!(header.singleton_tag("HD", "GO"), None);

    let sq = header.group("SQ").unwrap();
    assert_eq!(sq.ids().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
    assert_eq!(sq.get("chr2").and_then(|e| e.get("LN")), Some("2000"));
    assert_eq!(sq.get("chr2").and_then(|e| e.get("SN")), None);

    let rg = header.group("RG").unwrap();
    assert_eq!(rg.get("grp1").and_then(|e| e.get("SM")), Some("sample1"));
    assert!(header.group("XY").is_none());

    assert_eq!(header.records().comments(), &["synthetic test data".to_string()]);
    assert_eq!(header.mapping_program(), ProgramGuess::Mapper("bwa".into()));
    Ok(())
}

#[test]
fn test_text_header_framing() -> Result<()> {
    let mut payload = "@HD\tVN:1.6\n@SQ\tSN:chrM\tLN:16569\n".as_bytes().to_vec();
    let record = RecordBuilder::new("mito")
        .reference_id(0)
        .position(1)
        .cigar_text("3M")
        .unwrap()
        .sequence(b"GAT")
        .build()
        .unwrap();
    payload.extend_from_slice(&record);

    let mut stream = AlignmentStream::from_reader(BufReader::new(Cursor::new(payload)));
    stream.set_fields(&["RNAME", "SEQ"]);
    let mut values = FieldValues::new();
    assert!(stream.advance(&mut values)?);
    assert_eq!(stream.framing(), Some(HeaderFraming::Text));
    assert_eq!(values.get_by_name("RNAME").and_then(|v| v.as_str()), Some("chrM"));
    assert_eq!(values.get_by_name("SEQ").and_then(|v| v.as_str()), Some("GAT"));
    assert!(!stream.advance(&mut values)?);
    assert_eq!(stream.state(), StreamState::Exhausted);
    Ok(())
}

#[test]
fn test_headerless_stream() -> Result<()> {
    let record = RecordBuilder::new("solo").sequence(b"AC").build().unwrap();
    let mut stream = AlignmentStream::from_reader(Cursor::new(record));
    stream.set_fields(&["QNAME", "RNAME"]);
    let mut values = FieldValues::new();
    assert!(stream.advance(&mut values)?);
    assert_eq!(stream.framing(), Some(HeaderFraming::Absent));
    assert_eq!(stream.header().unwrap().reference_count(), 0);
    assert_eq!(values.get_by_name("RNAME").unwrap().to_string(), "*");
    Ok(())
}

/// Records whose block size low byte is `@` (64) or `B` (66).
fn record_with_block_size(name: &str, block_size: usize) -> Vec<u8> {
    let padding = block_size - 32 - (name.len() + 1) - 4;
    let record = RecordBuilder::new(name)
        .tag(*b"XP", TagValue::String("a".repeat(padding)))
        .build()
        .unwrap();
    assert_eq!(record.len(), block_size + 4);
    record
}

#[test]
fn test_text_header_before_records_that_look_like_header_bytes() -> Result<()> {
    let mut payload = b"@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:100\n".to_vec();
    payload.extend_from_slice(&record_with_block_size("r1", 64));
    payload.extend_from_slice(&record_with_block_size("r2", 64));

    let mut stream = AlignmentStream::from_reader(Cursor::new(payload));
    stream.set_fields(&["QNAME"]);
    let mut values = FieldValues::new();
    let mut names = Vec::new();
    while stream.advance(&mut values)? {
        names.push(values.get(&Field::QueryName).unwrap().to_string());
    }
    assert_eq!(stream.framing(), Some(HeaderFraming::Text));
    assert_eq!(names, ["r1", "r2"]);
    Ok(())
}

#[test]
fn test_headerless_stream_starting_with_magic_byte() -> Result<()> {
    let mut payload = record_with_block_size("b1", 66);
    payload.extend_from_slice(&record_with_block_size("b2", 66));

    let mut stream = AlignmentStream::from_reader(Cursor::new(payload));
    stream.set_fields(&["QNAME"]);
    let mut values = FieldValues::new();
    assert!(stream.advance(&mut values)?);
    assert_eq!(stream.framing(), Some(HeaderFraming::Absent));
    assert!(stream.advance(&mut values)?);
    assert_eq!(values.get(&Field::QueryName).and_then(|v| v.as_str()), Some("b2"));
    assert!(!stream.advance(&mut values)?);
    Ok(())
}

#[test]
fn test_reference_outside_dictionary_is_error() {
    let record = RecordBuilder::new("stray")
        .reference_id(5)
        .position(1)
        .sequence(b"A")
        .build()
        .unwrap();
    let mut data = Vec::new();
    write_header(&mut data, &header()).unwrap();
    data.extend_from_slice(&record);

    let mut stream = AlignmentStream::from_reader(Cursor::new(data));
    stream.set_fields(&["RNAME"]);
    let mut values = FieldValues::new();
    assert!(stream.advance(&mut values).is_err());
    assert!(values.is_empty());
}

#[test]
fn test_truncated_stream_is_error() {
    let mut data = binary_payload();
    data.truncate(data.len() - 5);
    let mut stream = AlignmentStream::from_reader(Cursor::new(data));
    let mut values = FieldValues::new();
    assert!(stream.advance(&mut values).unwrap());
    assert!(stream.advance(&mut values).unwrap());
    assert!(stream.advance(&mut values).is_err());
}

#[test]
fn test_buffer_reuse_across_records() -> Result<()> {
    let mut stream = AlignmentStream::from_reader(Cursor::new(binary_payload()));
    stream.set_fields(&["QNAME"]);
    let mut values = FieldValues::new();
    let mut names = Vec::new();
    while stream.advance(&mut values)? {
        names.push(values.get(&Field::QueryName).unwrap().to_string());
        assert_eq!(values.len(), 1);
    }
    assert_eq!(names, ["plain", "clipped", "unmapped"]);
    assert_eq!(stream.records_read(), 3);
    Ok(())
}
