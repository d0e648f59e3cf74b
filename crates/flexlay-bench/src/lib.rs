//! Benchmark profiles for flexlay.
//!
//! Provides one composite declared with [`flex_layout!`](flexlay::flex_layout),
//! [`Record`], and the conventional equivalent, [`BoxedRecord`], which
//! keeps each array in its own `Vec`. The [`RecordShape`] presets size both
//! the same way.

#![deny(rustdoc::broken_intra_doc_links)]

flexlay::flex_layout! {
    /// Identifier, raw payload, numeric tags, and owned names.
    #[derive(Debug)]
    pub struct Record {
        pub id: value(u64),
        pub payload: unsized_array(u8),
        pub tags: sized_array(u32),
        pub names: sized_array(String),
    }
}

/// [`Record`] with one heap allocation per array.
#[derive(Debug)]
pub struct BoxedRecord {
    pub id: u64,
    pub payload: Vec<u8>,
    pub tags: Vec<u32>,
    pub names: Vec<String>,
}

impl BoxedRecord {
    pub fn build(id: u64, shape: RecordShape) -> Box<Self> {
        Box::new(Self {
            id,
            payload: vec![0; shape.payload],
            tags: vec![0; shape.tags],
            names: vec![String::new(); shape.names],
        })
    }
}

/// Element counts for one record.
#[derive(Clone, Copy, Debug)]
pub struct RecordShape {
    pub payload: usize,
    pub tags: usize,
    pub names: usize,
}

impl RecordShape {
    pub fn build_flex(self, id: u64) -> flexlay::arena::FlexBox<Record> {
        Record::build(id, self.payload, self.tags, self.names)
    }
}

/// A header-sized message: a short payload, a few tags, no names.
pub const SMALL: RecordShape = RecordShape {
    payload: 24,
    tags: 4,
    names: 0,
};

/// Kilobytes of payload and a few dozen owned names.
pub const LARGE: RecordShape = RecordShape {
    payload: 4096,
    tags: 256,
    names: 32,
};
