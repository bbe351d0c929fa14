use super::command::Command;
use crate::client::ApiTable;
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use spool::{
    export::{regions::parse_regions, run_export, Builder},
    util::{io::new_output_writer, version::built_info},
};
use std::{fs, path::PathBuf};

/// Streams a remote mappings table as SAM text.
///
/// The table's columns are resolved once up front: the fixed mapping columns
/// feed the eleven mandatory SAM fields, `sam_field_*` columns become typed
/// optional tags, and `sam_optional_fields` passes through verbatim. The
/// header is built from the reference contig set linked to the table (or the
/// `--reference` override) plus one `@RG` line per table read group.
///
/// With no region file, rows stream in table order from `--start_row` up to
/// (but not including) `--end_row`. With `--region_file`, the file is scanned
/// for `-L <chr>:<lo>-<hi>` tokens and each region is fetched through the
/// table's genomic range index in file order. `--read_pair_aware` additionally
/// resolves each exported first mate's partner through a second range query so
/// both ends of a pair are written together.
#[derive(Parser, Debug, Clone)]
#[clap(version = built_info::VERSION.as_str(), term_width = 0)]
pub struct Export {
    /// The identifier of the mappings table to export.
    #[clap(display_order = 1)]
    mappings: Option<String>,

    /// Write SAM text to this path instead of standard output; a `.gz` path
    /// is compressed.
    #[clap(long, short = 'o', display_order = 2)]
    output: Option<PathBuf>,

    /// The first row to export.
    #[clap(long = "start_row", default_value = "0", display_order = 3)]
    start_row: u64,

    /// The row to stop before; 0 exports through the end of the table.
    #[clap(long = "end_row", default_value = "0", display_order = 4)]
    end_row: u64,

    /// A file scanned for `-L <chr>:<lo>-<hi>` tokens naming the regions to
    /// export.
    #[clap(long = "region_file", display_order = 5)]
    region_file: Option<PathBuf>,

    /// Added to both bounds of every region before querying.
    #[clap(
        long = "region_index_offset",
        default_value = "0",
        allow_hyphen_values = true,
        display_order = 6
    )]
    region_index_offset: i64,

    /// Discard unmapped reads instead of emitting placeholder records.
    #[clap(long = "discard_unmapped", default_value = "false", display_order = 7)]
    discard_unmapped: bool,

    /// In region mode, also emit the second mate of each exported first mate.
    #[clap(long = "read_pair_aware", default_value = "false", display_order = 8)]
    read_pair_aware: bool,

    /// Append a `ZD:Z:<row id>` tag to every record.
    #[clap(long = "output_ids", default_value = "false", display_order = 9)]
    output_ids: bool,

    /// A contig-set record to use in place of the table's linked reference.
    #[clap(long, display_order = 10)]
    reference: Option<String>,
}

impl Export {
    /// Executes the export command
    pub fn execute(&self) -> Result<()> {
        let mappings = match &self.mappings {
            Some(id) => id,
            None => bail!("a mappings table identifier is required"),
        };
        info!("Starting export of mappings table {mappings}...");
        match &self.output {
            Some(path) => info!("Writing SAM text to {}", path.display()),
            None => info!("Writing SAM text to standard output"),
        }

        let regions = match &self.region_file {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| {
                    format!("failed to read region file {}", path.display())
                })?;
                parse_regions(&text)?
            }
            None => Vec::new(),
        };

        let mut builder = Builder::default();
        builder
            .start_row(self.start_row)
            .end_row(if self.end_row == 0 { None } else { Some(self.end_row) })
            .regions(regions)
            .region_index_offset(self.region_index_offset)
            .discard_unmapped(self.discard_unmapped)
            .read_pair_aware(self.read_pair_aware)
            .write_ids(self.output_ids)
            .reference(self.reference.clone());
        let options = builder.build_options()?;

        let table = ApiTable::from_env(mappings)?;
        let mut output = new_output_writer(self.output.as_ref())?;
        run_export(&table, &options, &mut output)?;
        Ok(())
    }
}

impl Command for Export {
    fn execute(&self) -> Result<()> {
        Export::execute(self)
    }
}
