//! Shared binary framing: magic header, footer constants and the footer
//! code cipher.

use log::debug;

use super::error::{FbxError, Result};
use super::node::FbxDocument;

/// Magic bytes opening every binary FBX file.
pub const HEADER_MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Size of the all-zero record terminating a sibling list.
pub const NULL_RECORD_SIZE: usize = 13;

/// Fixed source value the footer code cipher starts from.
pub const SOURCE_ID: [u8; 16] = [
    0x58, 0xAB, 0xA9, 0xF0, 0x6C, 0xA2, 0xD8, 0x3F, 0x4D, 0x47, 0x49, 0xA3, 0xB4, 0xB2, 0xE7, 0x3D,
];

/// Fixed key used for the middle cipher pass.
pub const KEY: [u8; 16] = [
    0xE2, 0x4F, 0x7B, 0x5F, 0xCD, 0xE4, 0xC8, 0x6D, 0xDB, 0xD8, 0xFB, 0xD7, 0x40, 0x58, 0xC6, 0x78,
];

/// Constant trailing every compliant file.
pub const EXTENSION: [u8; 16] = [
    0xF8, 0x5A, 0x8C, 0x6A, 0xDE, 0xF5, 0xD9, 0x7E, 0xEC, 0xE9, 0x0C, 0xE3, 0x75, 0x8F, 0x29, 0x0B,
];

pub const FOOTER_CODE_SIZE: usize = 16;
pub const FOOTER_ZEROES_1: usize = 20;
pub const FOOTER_ZEROES_2: usize = 120;

/// The document creation time, as stored under
/// `FBXHeaderExtension/CreationTimeStamp`. Keys the footer code cipher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
    pub millisecond: i32,
}

impl Timestamp {
    fn check(&self) -> Result<()> {
        let in_range = (0..=9999).contains(&self.year)
            && (0..=12).contains(&self.month)
            && (0..=31).contains(&self.day)
            && (0..24).contains(&self.hour)
            && (0..60).contains(&self.minute)
            && (0..60).contains(&self.second)
            && (0..1000).contains(&self.millisecond);
        if !in_range {
            return Err(FbxError::InvalidArgument(format!(
                "Creation timestamp field out of range: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Read the timestamp from a document's header extension, if present.
    pub fn from_document(document: &FbxDocument) -> Option<Timestamp> {
        let node = document.get_relative("FBXHeaderExtension/CreationTimeStamp")?;
        let field = |name: &str| node.child(name).and_then(|n| n.value()?.as_i32());
        Some(Timestamp {
            year: field("Year")?,
            month: field("Month")?,
            day: field("Day")?,
            hour: field("Hour")?,
            minute: field("Minute")?,
            second: field("Second")?,
            millisecond: field("Millisecond")?,
        })
    }

    /// The 16-character keying string for the footer cipher.
    ///
    /// Field order is second, month, hour, day, centisecond, year, minute;
    /// each zero-padded to its width. This exact order is required, it is
    /// not calendar order.
    fn mangle(&self) -> [u8; FOOTER_CODE_SIZE] {
        let text = format!(
            "{:02}{:02}{:02}{:02}{:02}{:04}{:02}",
            self.second,
            self.month,
            self.hour,
            self.day,
            self.millisecond / 10,
            self.year,
            self.minute
        );
        let mut out = [0u8; FOOTER_CODE_SIZE];
        out.copy_from_slice(text.as_bytes());
        out
    }
}

// One cipher pass: a byte-wise XOR chain where each output byte feeds the
// next as a running key, seeded at 64.
fn encrypt(a: &mut [u8; FOOTER_CODE_SIZE], b: &[u8; FOOTER_CODE_SIZE]) {
    let mut c = 64u8;
    for i in 0..FOOTER_CODE_SIZE {
        a[i] ^= c ^ b[i];
        c = a[i];
    }
}

/// Derive the 16-byte footer code for the given creation time.
///
/// Three cipher passes over the fixed source value, keyed by the mangled
/// timestamp, the fixed key, and the mangled timestamp again.
pub fn footer_code(timestamp: &Timestamp) -> Result<[u8; FOOTER_CODE_SIZE]> {
    timestamp.check()?;
    let mangled = timestamp.mangle();
    let mut code = SOURCE_ID;
    encrypt(&mut code, &mangled);
    encrypt(&mut code, &KEY);
    encrypt(&mut code, &mangled);
    Ok(code)
}

/// The footer code for a document: keyed by its creation timestamp when one
/// is stored in the tree, otherwise by the zero timestamp so that any tree
/// can be written deterministically. Readers never re-derive the code.
pub fn document_footer_code(document: &FbxDocument) -> Result<[u8; FOOTER_CODE_SIZE]> {
    let timestamp = match Timestamp::from_document(document) {
        Some(ts) => ts,
        None => {
            debug!("Document has no creation timestamp, keying footer code with zeros");
            Timestamp::default()
        }
    };
    footer_code(&timestamp)
}
