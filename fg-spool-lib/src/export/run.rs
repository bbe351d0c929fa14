//! The export run: reference resolution, row iteration, and mate pairing.

use std::io::Write;

use derive_builder::Builder;
use log::{debug, info};
use proglog::{CountFormatterKind, ProgLog, ProgLogBuilder};

use crate::error::{Result, SpoolError};
use crate::export::record::{MappingRecord, MappingStatus, MateId};
use crate::export::regions::Region;
use crate::export::sam::{format_header, format_record};
use crate::export::schema::TableSchema;
use crate::table::{ContigSet, MappingsTable, QueryMode, TableDescription};

/// The column that distinguishes paired tables.
const MATE_ID_COLUMN: &str = "mate_id";

/// The genomic range index maintained on mappings tables.
const GENOMIC_RANGE_INDEX: &str = "gri";

/// Log progress every this many written records.
const PROGRESS_UNIT: usize = 100_000;

/// Options controlling one export run.
#[derive(Clone, Debug, Builder)]
#[builder(name = "Builder", build_fn(name = "build_options"))]
pub struct ExportOptions {
    /// First row to export in full-range mode.
    #[builder(default)]
    start_row: u64,
    /// Row to stop before in full-range mode; `None` exports to the table end.
    #[builder(default)]
    end_row: Option<u64>,
    /// Regions to query; when non-empty, region mode replaces full-range mode.
    #[builder(default)]
    regions: Vec<Region>,
    /// Added to both bounds of every region before querying.
    #[builder(default)]
    region_index_offset: i64,
    /// Drop unmapped records instead of emitting placeholder lines.
    #[builder(default)]
    discard_unmapped: bool,
    /// Resolve mates in region mode so both ends of a pair are emitted.
    #[builder(default)]
    read_pair_aware: bool,
    /// Append `ZD:Z:<row id>` to every record.
    #[builder(default)]
    write_ids: bool,
    /// Contig-set record overriding the table's linked reference.
    #[builder(default)]
    reference: Option<String>,
}

/// Runs one export against `table`, writing the header and records to
/// `output` and flushing it before returning.
pub fn run_export<T: MappingsTable, W: Write>(
    table: &T,
    options: &ExportOptions,
    output: &mut W,
) -> Result<()> {
    let description = table.describe()?;
    let details = table.details()?;
    let schema = TableSchema::resolve(&description, &table.column_names()?)?;
    let contigs = resolve_reference(
        table,
        options.reference.as_deref(),
        details.original_contigset.as_deref(),
    )?;

    info!(
        "exporting table '{}' ({} rows, {} contigs, {} read groups)",
        description.name,
        description.length,
        contigs.len(),
        details.read_groups.len()
    );

    let mut writer = RecordWriter::new(output, &schema, options.write_ids);
    writer.write_header(&contigs, details.read_groups.len())?;
    if options.regions.is_empty() {
        export_full_range(table, &description, options, &mut writer)?;
    } else {
        export_regions(table, &schema, options, &mut writer)?;
    }
    writer.finish()
}

/// Picks the reference contig set: the explicit override when given, else the
/// table's linked original contig set.
fn resolve_reference<T: MappingsTable>(
    table: &T,
    override_id: Option<&str>,
    linked_id: Option<&str>,
) -> Result<ContigSet> {
    let id = override_id.or(linked_id).ok_or(SpoolError::MissingReference)?;
    debug!("using reference contig set {id}");
    table.contig_set(id)
}

fn export_full_range<T: MappingsTable, W: Write>(
    table: &T,
    description: &TableDescription,
    options: &ExportOptions,
    writer: &mut RecordWriter<'_, W>,
) -> Result<()> {
    if options.start_row > description.length {
        return Err(SpoolError::StartRowBeyondTable {
            start: options.start_row,
            length: description.length,
        });
    }
    if let Some(end) = options.end_row {
        if end < options.start_row {
            return Err(SpoolError::EndRowBeforeStart { start: options.start_row, end });
        }
    }
    for row in table.iterate_rows(options.start_row, options.end_row)? {
        let record = MappingRecord::from_row(row?);
        if options.discard_unmapped && record.status == MappingStatus::Unmapped {
            continue;
        }
        writer.write(&record)?;
    }
    Ok(())
}

fn export_regions<T: MappingsTable, W: Write>(
    table: &T,
    schema: &TableSchema,
    options: &ExportOptions,
    writer: &mut RecordWriter<'_, W>,
) -> Result<()> {
    let pair_aware = options.read_pair_aware && schema.has_column(MATE_ID_COLUMN);
    if options.read_pair_aware && !pair_aware {
        debug!("table has no {MATE_ID_COLUMN} column, exporting without mate resolution");
    }
    for region in &options.regions {
        let (lo, hi) = shift_region(region, options.region_index_offset)?;
        debug!("querying {}:{}-{}", region.chr, lo, hi);
        let query = table.genomic_range_query(
            &region.chr,
            lo,
            hi,
            QueryMode::Overlap,
            GENOMIC_RANGE_INDEX,
        )?;
        for row in table.iterate_query_rows(&query)? {
            let record = MappingRecord::from_row(row?);
            if pair_aware {
                export_pair_aware(table, &record, options, writer)?;
            } else if !(options.discard_unmapped && record.status == MappingStatus::Unmapped) {
                writer.write(&record)?;
            }
        }
    }
    Ok(())
}

/// Applies the index offset to a region's bounds. A bound the offset pushes
/// outside the representable range is fatal.
fn shift_region(region: &Region, offset: i64) -> Result<(i64, i64)> {
    match (region.lo.checked_add(offset), region.hi.checked_add(offset)) {
        (Some(lo), Some(hi)) => Ok((lo, hi)),
        _ => Err(SpoolError::InvalidRegion {
            text: format!("{}:{}-{}", region.chr, region.lo, region.hi),
        }),
    }
}

/// Emits one record from a paired table. Left mates pull their right mate in
/// through a lookup over the recorded mate interval; right mates reached in
/// the primary iteration are skipped, since only a left mate's lookup emits
/// them.
fn export_pair_aware<T: MappingsTable, W: Write>(
    table: &T,
    record: &MappingRecord,
    options: &ExportOptions,
    writer: &mut RecordWriter<'_, W>,
) -> Result<()> {
    match record.mate_id {
        MateId::Unpaired => {
            if !(options.discard_unmapped && record.status == MappingStatus::Unmapped) {
                writer.write(record)?;
            }
        }
        MateId::First => {
            writer.write(record)?;
            if record.status2 != Some(MappingStatus::Unmapped) {
                resolve_mate(table, record, writer)?;
            }
        }
        MateId::Second => {}
    }
    Ok(())
}

/// Scans the left mate's recorded mate interval and emits the first second
/// mate whose own mate coordinates point back at the left mate.
fn resolve_mate<T: MappingsTable, W: Write>(
    table: &T,
    record: &MappingRecord,
    writer: &mut RecordWriter<'_, W>,
) -> Result<()> {
    let query = table.genomic_range_query(
        &record.chr2,
        record.lo2,
        record.hi2,
        QueryMode::Overlap,
        GENOMIC_RANGE_INDEX,
    )?;
    for row in table.iterate_query_rows(&query)? {
        let candidate = MappingRecord::from_row(row?);
        if candidate.mate_id == MateId::Second
            && candidate.chr2 == record.chr
            && candidate.lo2 == record.lo
            && candidate.hi2 == record.hi
        {
            writer.write(&candidate)?;
            return Ok(());
        }
    }
    debug!(
        "no mate found for {} over {}:{}-{}",
        record.name, record.chr2, record.lo2, record.hi2
    );
    Ok(())
}

/// Writes formatted records to the sink, tracking and logging progress.
struct RecordWriter<'a, W: Write> {
    output: &'a mut W,
    schema: &'a TableSchema,
    write_ids: bool,
    progress: ProgLog,
    written: u64,
}

impl<'a, W: Write> RecordWriter<'a, W> {
    fn new(output: &'a mut W, schema: &'a TableSchema, write_ids: bool) -> Self {
        let progress = ProgLogBuilder::new()
            .name("spool-progress")
            .noun("records")
            .verb("Wrote")
            .unit(PROGRESS_UNIT.try_into().unwrap())
            .count_formatter(CountFormatterKind::Comma)
            .build();
        Self { output, schema, write_ids, progress, written: 0 }
    }

    fn write_header(&mut self, contigs: &ContigSet, read_groups: usize) -> Result<()> {
        self.output.write_all(format_header(contigs, read_groups).as_bytes())?;
        Ok(())
    }

    fn write(&mut self, record: &MappingRecord) -> Result<()> {
        let line = format_record(record, self.schema, self.write_ids);
        self.output.write_all(line.as_bytes())?;
        self.progress.record();
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.output.flush()?;
        info!("wrote {} records", self.written);
        Ok(())
    }
}
