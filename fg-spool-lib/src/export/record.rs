//! The typed mapping record, its defaults, and SAM flag computation.

use std::collections::HashMap;

use crate::table::{Row, Value};

/// The value remote tables store in an int32 cell that carries no data.
pub const INT32_UNSET: i64 = 2_147_483_647;

/// SAM FLAG bits.
pub mod sam_flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
}

/// Mapping status of one read end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingStatus {
    Mapped,
    Unmapped,
    Secondary,
}

impl MappingStatus {
    /// Parses a status cell. Only `UNMAPPED` and `SECONDARY` change emitted
    /// output, so anything unrecognized behaves as a primary mapping.
    fn from_cell(text: &str) -> MappingStatus {
        match text {
            "UNMAPPED" => MappingStatus::Unmapped,
            "SECONDARY" => MappingStatus::Secondary,
            _ => MappingStatus::Mapped,
        }
    }
}

/// Which end of a pair a record is. Tables store -1 for unpaired reads, 0 for
/// the first end, and 1 for the second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MateId {
    Unpaired,
    First,
    Second,
}

impl MateId {
    fn from_cell(value: i64) -> MateId {
        match value {
            0 => MateId::First,
            1 => MateId::Second,
            _ => MateId::Unpaired,
        }
    }

    pub fn is_paired(self) -> bool {
        !matches!(self, MateId::Unpaired)
    }
}

/// One read mapping, fully populated. Every field a row does not supply (or
/// supplies with an unusable type) holds its default, so downstream code
/// never looks a field up twice or handles absence.
#[derive(Clone, Debug, PartialEq)]
pub struct MappingRecord {
    pub row_id: u64,
    pub sequence: String,
    pub name: String,
    pub quality: String,
    pub status: MappingStatus,
    pub chr: String,
    pub lo: i64,
    pub hi: i64,
    pub negative_strand: bool,
    pub error_probability: i64,
    pub qc_fail: bool,
    pub duplicate: bool,
    pub cigar: String,
    pub mate_id: MateId,
    pub status2: Option<MappingStatus>,
    pub chr2: String,
    pub lo2: i64,
    pub hi2: i64,
    pub negative_strand2: bool,
    pub proper_pair: bool,
    pub read_group: i64,
    /// Cell values not consumed by the fixed fields above, keyed by column
    /// name. Tag columns are read from here.
    pub tags: HashMap<String, Value>,
}

impl Default for MappingRecord {
    fn default() -> Self {
        Self {
            row_id: 0,
            sequence: String::new(),
            name: String::new(),
            quality: String::new(),
            status: MappingStatus::Unmapped,
            chr: String::new(),
            lo: 0,
            hi: 0,
            negative_strand: false,
            error_probability: 0,
            qc_fail: false,
            duplicate: false,
            cigar: String::new(),
            mate_id: MateId::Unpaired,
            status2: None,
            chr2: String::new(),
            lo2: 0,
            hi2: 0,
            negative_strand2: false,
            proper_pair: false,
            read_group: 0,
            tags: HashMap::new(),
        }
    }
}

impl MappingRecord {
    /// Merges a raw row over the default record. Consumes the row; every cell
    /// not claimed by a fixed field lands in `tags`.
    pub fn from_row(row: Row) -> Self {
        let Row { id, mut values } = row;
        let mut record = Self { row_id: id, ..Self::default() };

        if let Some(text) = take_string(&mut values, "sequence") {
            record.sequence = text;
        }
        if let Some(text) = take_string(&mut values, "name") {
            record.name = text;
        }
        if let Some(text) = take_string(&mut values, "quality") {
            record.quality = text;
        }
        if let Some(text) = take_string(&mut values, "status") {
            record.status = MappingStatus::from_cell(&text);
        }
        if let Some(text) = take_string(&mut values, "chr") {
            record.chr = text;
        }
        if let Some(value) = take_i64(&mut values, "lo") {
            record.lo = value;
        }
        if let Some(value) = take_i64(&mut values, "hi") {
            record.hi = value;
        }
        if let Some(value) = take_bool(&mut values, "negative_strand") {
            record.negative_strand = value;
        }
        if let Some(value) = take_i64(&mut values, "error_probability") {
            record.error_probability = value;
        }
        if let Some(value) = take_bool(&mut values, "qc_fail") {
            record.qc_fail = value;
        }
        if let Some(value) = take_bool(&mut values, "duplicate") {
            record.duplicate = value;
        }
        if let Some(text) = take_string(&mut values, "cigar") {
            record.cigar = text;
        }
        if let Some(value) = take_i64(&mut values, "mate_id") {
            record.mate_id = MateId::from_cell(value);
        }
        if let Some(text) = take_string(&mut values, "status2") {
            // An empty secondary status means "no mate information", which is
            // distinct from an unmapped mate.
            if !text.is_empty() {
                record.status2 = Some(MappingStatus::from_cell(&text));
            }
        }
        if let Some(text) = take_string(&mut values, "chr2") {
            record.chr2 = text;
        }
        if let Some(value) = take_i64(&mut values, "lo2") {
            record.lo2 = value;
        }
        if let Some(value) = take_i64(&mut values, "hi2") {
            record.hi2 = value;
        }
        if let Some(value) = take_bool(&mut values, "negative_strand2") {
            record.negative_strand2 = value;
        }
        if let Some(value) = take_bool(&mut values, "proper_pair") {
            record.proper_pair = value;
        }
        if let Some(value) = take_i64(&mut values, "read_group") {
            record.read_group = value;
        }

        record.tags = values;
        record
    }

    /// Computes the SAM FLAG. Total: every record has a flag.
    pub fn flag(&self) -> u16 {
        let mut flag = 0;
        if self.mate_id.is_paired() {
            flag |= sam_flags::PAIRED;
        }
        if self.proper_pair {
            flag |= sam_flags::PROPER_PAIR;
        }
        if self.status == MappingStatus::Unmapped {
            flag |= sam_flags::UNMAPPED;
        }
        if self.status2 == Some(MappingStatus::Unmapped) {
            flag |= sam_flags::MATE_UNMAPPED;
        }
        if self.negative_strand {
            flag |= sam_flags::REVERSE;
        }
        if self.negative_strand2 {
            flag |= sam_flags::MATE_REVERSE;
        }
        if self.mate_id == MateId::First {
            flag |= sam_flags::FIRST_IN_PAIR;
        }
        if self.mate_id == MateId::Second {
            flag |= sam_flags::SECOND_IN_PAIR;
        }
        if self.status == MappingStatus::Secondary {
            flag |= sam_flags::SECONDARY;
        }
        if self.qc_fail {
            flag |= sam_flags::QC_FAIL;
        }
        if self.duplicate {
            flag |= sam_flags::DUPLICATE;
        }
        flag
    }
}

fn take_string(values: &mut HashMap<String, Value>, name: &str) -> Option<String> {
    values.remove(name).map(|value| match value {
        Value::Str(text) => text,
        other => other.to_string(),
    })
}

fn take_i64(values: &mut HashMap<String, Value>, name: &str) -> Option<i64> {
    values.remove(name).and_then(|value| value.as_i64())
}

fn take_bool(values: &mut HashMap<String, Value>, name: &str) -> Option<bool> {
    values.remove(name).and_then(|value| match value {
        Value::Bool(flag) => Some(flag),
        Value::Int(value) => Some(value != 0),
        _ => None,
    })
}
