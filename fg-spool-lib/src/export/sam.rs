//! SAM text emission: the header, the eleven mandatory fields, and tags.

use itertools::Itertools;

use crate::export::record::{MappingRecord, MateId, INT32_UNSET};
use crate::export::schema::{TableSchema, TagColumnSpec, TagColumnType};
use crate::table::{ContigSet, Value};
use crate::util::dna::reverse_complement;

/// The tag carrying the record's read group, present on every line.
const READ_GROUP_TAG: &str = "RG";

/// The tag carrying the source row id when id emission is enabled.
const ROW_ID_TAG: &str = "ZD";

/// Renders the SAM header: one `@SQ` line per contig, in contig-set order,
/// then one `@RG` line per read group.
pub fn format_header(contigs: &ContigSet, read_groups: usize) -> String {
    let mut header = String::new();
    for contig in contigs.iter() {
        header.push_str(&format!("@SQ\tSN:{}\tLN:{}\n", contig.name, contig.length));
    }
    for id in 0..read_groups {
        header.push_str(&format!("@RG\tID:{id}\tSM:Sample_{id}\n"));
    }
    header
}

/// Formats one complete SAM line, terminated by a single newline.
pub fn format_record(record: &MappingRecord, schema: &TableSchema, write_ids: bool) -> String {
    let name = record.name.trim_start_matches('@');
    let qname = if name.is_empty() { "*" } else { name };

    let (rname, pos) =
        if record.chr.is_empty() { ("*", 0) } else { (record.chr.as_str(), record.lo + 1) };

    // RNEXT collapses to `=` on the same contig, but an absent mate contig
    // wins over the equality shorthand.
    let (rnext, pnext) = if record.chr2.is_empty() {
        ("*", 0)
    } else if record.chr2 == record.chr {
        ("=", record.lo2 + 1)
    } else {
        (record.chr2.as_str(), record.lo2 + 1)
    };

    let quality = if record.quality.is_empty() {
        "*".to_string()
    } else {
        record.quality.trim_end_matches('\n').to_string()
    };
    let (seq, qual) = if record.negative_strand {
        (reverse_complement(&record.sequence), quality.chars().rev().collect())
    } else {
        (record.sequence.clone(), quality)
    };

    let mandatory = [
        qname.to_string(),
        record.flag().to_string(),
        rname.to_string(),
        pos.to_string(),
        record.error_probability.to_string(),
        record.cigar.clone(),
        rnext.to_string(),
        pnext.to_string(),
        template_length(record).to_string(),
        seq,
        qual,
    ];

    let mut line =
        mandatory.into_iter().chain(format_tags(record, schema, write_ids)).join("\t");
    line.push('\n');
    line
}

/// Encodes the record's tag fields in schema order, applying the type-aware
/// suppression rules, then the read group tag and optionally the row id.
pub fn format_tags(record: &MappingRecord, schema: &TableSchema, write_ids: bool) -> Vec<String> {
    let mut tags = Vec::new();
    for spec in schema.tag_columns() {
        let value = match record.tags.get(&spec.column) {
            Some(value) => value,
            None => continue,
        };
        if is_suppressed(spec, value) {
            continue;
        }
        if spec.raw {
            tags.push(value.to_string());
        } else {
            tags.push(format!("{}:{}:{}", spec.tag, spec.kind.code(), value));
        }
    }
    tags.push(format!("{READ_GROUP_TAG}:Z:{}", record.read_group));
    if write_ids {
        tags.push(format!("{ROW_ID_TAG}:Z:{}", record.row_id));
    }
    tags
}

/// True when the value is its declared type's "no data" marker.
fn is_suppressed(spec: &TagColumnSpec, value: &Value) -> bool {
    match spec.kind {
        TagColumnType::Int32 => value.as_i64() == Some(INT32_UNSET),
        TagColumnType::Float => value.as_f64().map_or(false, f64::is_nan),
        TagColumnType::Text => matches!(value, Value::Str(text) if text.is_empty()),
    }
}

/// Observed template length: zero unless the record is paired and both ends
/// sit on the same named contig; negative for the rightmost end.
fn template_length(record: &MappingRecord) -> i64 {
    if record.mate_id == MateId::Unpaired
        || record.chr != record.chr2
        || record.chr.is_empty()
        || record.chr == "*"
    {
        return 0;
    }
    let length = record.hi.max(record.hi2) - record.lo.min(record.lo2);
    if record.lo > record.lo2 {
        -length
    } else {
        length
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::export::record::MappingStatus;
    use crate::table::{ColumnDesc, TableDescription};
    use rstest::rstest;

    fn schema_of(columns: Vec<ColumnDesc>) -> TableSchema {
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let description =
            TableDescription { name: "mappings".to_string(), length: 0, columns };
        TableSchema::resolve(&description, &names).unwrap()
    }

    fn minimal_schema() -> TableSchema {
        schema_of(vec![ColumnDesc::new("name", "string")])
    }

    fn tag_schema() -> TableSchema {
        schema_of(vec![
            ColumnDesc::new("name", "string"),
            ColumnDesc::new("sam_field_NM", "int32"),
            ColumnDesc::new("sam_field_AS", "float"),
            ColumnDesc::new("sam_field_MD", "string"),
            ColumnDesc::new("sam_optional_fields", "string"),
        ])
    }

    fn fields(line: &str) -> Vec<&str> {
        line.trim_end_matches('\n').split('\t').collect()
    }

    #[test]
    fn test_header_lists_contigs_then_read_groups() {
        let contigs = ContigSet::from_parallel(
            vec!["chr1".to_string(), "chr2".to_string()],
            vec![1000, 2000],
        )
        .unwrap();
        assert_eq!(
            format_header(&contigs, 1),
            "@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chr2\tLN:2000\n@RG\tID:0\tSM:Sample_0\n"
        );
    }

    #[test]
    fn test_header_of_an_empty_contig_set_is_empty() {
        assert_eq!(format_header(&ContigSet::default(), 0), "");
    }

    #[test]
    fn test_default_record_formats_as_an_unmapped_placeholder() {
        let record = MappingRecord::default();
        let line = format_record(&record, &minimal_schema(), false);
        // Absent CIGAR and sequence are empty fields, not `*`.
        assert_eq!(line, "*\t4\t*\t0\t0\t\t*\t0\t0\t\t*\tRG:Z:0\n");
    }

    #[test]
    fn test_mapped_forward_read() {
        let record = MappingRecord {
            name: "@read1".to_string(),
            sequence: "AAGT".to_string(),
            quality: "!!##".to_string(),
            status: MappingStatus::Mapped,
            chr: "chr1".to_string(),
            lo: 99,
            hi: 103,
            cigar: "4M".to_string(),
            error_probability: 37,
            ..MappingRecord::default()
        };
        let line = format_record(&record, &minimal_schema(), false);
        assert_eq!(line, "read1\t0\tchr1\t100\t37\t4M\t*\t0\t0\tAAGT\t!!##\tRG:Z:0\n");
    }

    #[test]
    fn test_negative_strand_reverse_complements_seq_and_reverses_qual() {
        let record = MappingRecord {
            name: "read1".to_string(),
            sequence: "AAGT".to_string(),
            quality: "!!##".to_string(),
            status: MappingStatus::Mapped,
            chr: "chr1".to_string(),
            lo: 99,
            hi: 103,
            negative_strand: true,
            ..MappingRecord::default()
        };
        let line = format_record(&record, &minimal_schema(), false);
        let fields = fields(&line);
        assert_eq!(fields[1], "16");
        assert_eq!(fields[9], "ACTT");
        assert_eq!(fields[10], "##!!");
    }

    #[rstest]
    #[case("", "*")]
    #[case("@", "*")]
    #[case("@read", "read")]
    #[case("@@read", "read")]
    #[case("re@ad", "re@ad")]
    fn test_qname_strips_leading_at_signs(#[case] name: &str, #[case] expected: &str) {
        let record = MappingRecord { name: name.to_string(), ..MappingRecord::default() };
        let line = format_record(&record, &minimal_schema(), false);
        assert_eq!(fields(&line)[0], expected);
    }

    #[rstest]
    #[case("chr1", "chr1", "=", "50")]
    #[case("chr1", "chr2", "chr2", "50")]
    #[case("chr1", "", "*", "0")]
    #[case("", "", "*", "0")]
    fn test_rnext_and_pnext(
        #[case] chr: &str,
        #[case] chr2: &str,
        #[case] rnext: &str,
        #[case] pnext: &str,
    ) {
        let record = MappingRecord {
            status: MappingStatus::Mapped,
            mate_id: MateId::First,
            chr: chr.to_string(),
            chr2: chr2.to_string(),
            lo2: 49,
            ..MappingRecord::default()
        };
        let line = format_record(&record, &minimal_schema(), false);
        assert_eq!(fields(&line)[6], rnext);
        assert_eq!(fields(&line)[7], pnext);
    }

    #[rstest]
    // Leftmost end of a same-contig pair spans the union of both intervals.
    #[case(MateId::First, "chr1", 100, 200, "chr1", 150, 250, 150)]
    // Rightmost end carries the negated length.
    #[case(MateId::Second, "chr1", 150, 250, "chr1", 100, 200, -150)]
    #[case(MateId::First, "chr1", 100, 200, "chr2", 150, 250, 0)]
    #[case(MateId::Unpaired, "chr1", 100, 200, "chr1", 150, 250, 0)]
    #[case(MateId::First, "*", 100, 200, "*", 150, 250, 0)]
    #[case(MateId::First, "", 100, 200, "", 150, 250, 0)]
    fn test_template_length(
        #[case] mate_id: MateId,
        #[case] chr: &str,
        #[case] lo: i64,
        #[case] hi: i64,
        #[case] chr2: &str,
        #[case] lo2: i64,
        #[case] hi2: i64,
        #[case] expected: i64,
    ) {
        let record = MappingRecord {
            status: MappingStatus::Mapped,
            mate_id,
            chr: chr.to_string(),
            lo,
            hi,
            chr2: chr2.to_string(),
            lo2,
            hi2,
            ..MappingRecord::default()
        };
        assert_eq!(template_length(&record), expected);
    }

    #[test]
    fn test_default_sentinels_suppress_tags() {
        let mut record = MappingRecord::default();
        record.tags.insert("sam_field_NM".to_string(), Value::Int(INT32_UNSET));
        record.tags.insert("sam_field_AS".to_string(), Value::Float(f64::NAN));
        record.tags.insert("sam_field_MD".to_string(), Value::Str(String::new()));
        record.tags.insert("sam_optional_fields".to_string(), Value::Str(String::new()));

        let tags = format_tags(&record, &tag_schema(), false);
        assert_eq!(tags, ["RG:Z:0"]);
    }

    #[test]
    fn test_populated_tags_encode_by_declared_type_in_schema_order() {
        let mut record = MappingRecord::default();
        record.read_group = 2;
        record.tags.insert("sam_field_NM".to_string(), Value::Int(3));
        record.tags.insert("sam_field_AS".to_string(), Value::Float(0.5));
        record.tags.insert("sam_field_MD".to_string(), Value::Str("10A5".to_string()));
        record
            .tags
            .insert("sam_optional_fields".to_string(), Value::Str("XX:Z:kept".to_string()));

        let tags = format_tags(&record, &tag_schema(), false);
        assert_eq!(tags, ["NM:i:3", "AS:f:0.5", "MD:Z:10A5", "XX:Z:kept", "RG:Z:2"]);
    }

    #[test]
    fn test_absent_tag_columns_are_skipped() {
        let record = MappingRecord::default();
        let tags = format_tags(&record, &tag_schema(), false);
        assert_eq!(tags, ["RG:Z:0"]);
    }

    #[test]
    fn test_row_id_tag_is_last_when_requested() {
        let mut record = MappingRecord::default();
        record.row_id = 7;
        record.tags.insert("sam_field_NM".to_string(), Value::Int(1));
        let tags = format_tags(&record, &tag_schema(), true);
        assert_eq!(tags, ["NM:i:1", "RG:Z:0", "ZD:Z:7"]);
    }

    #[test]
    fn test_quality_trailing_newlines_are_stripped() {
        let record = MappingRecord {
            quality: "IIII\n".to_string(),
            sequence: "ACGT".to_string(),
            ..MappingRecord::default()
        };
        let line = format_record(&record, &minimal_schema(), false);
        assert_eq!(fields(&line)[10], "IIII");
    }
}
