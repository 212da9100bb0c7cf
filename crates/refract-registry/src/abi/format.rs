//! Wire layout of an ABI blob.
//!
//! All integers are little-endian. The blob starts with a fixed
//! [`HEADER_SIZE`]-byte [`Header`], followed by nine sections, each starting
//! at an 8-byte aligned offset recorded in the header:
//!
//! | Section      | Entry                 | Size |
//! |--------------|-----------------------|------|
//! | types        | [`TypeRecord`]        | 72   |
//! | fields       | [`FieldRecord`]       | 40   |
//! | methods      | [`MethodRecord`]      | 48   |
//! | ctors        | [`CtorRecord`]        | 24   |
//! | attributes   | [`AttributeRecord`]   | 24   |
//! | params       | type hash (`u64`)     | 8    |
//! | strings      | UTF-8 bytes           | 1    |
//! | method fns   | function slot (`u64`) | 8    |
//! | ctor fns     | function slot (`u64`) | 8    |
//!
//! Records refer to each other through `(begin, count)` [`Range`]s into the
//! other sections and to text through [`StrRef`]s into the string section.
//! Method and constructor function slots are parallel to the method and
//! constructor records.

use std::ops::Range as Span;

/// Current format version.
pub const VERSION: u32 = 1;

pub const HEADER_SIZE: usize = 120;
pub const TYPE_RECORD_SIZE: usize = 72;
pub const FIELD_RECORD_SIZE: usize = 40;
pub const METHOD_RECORD_SIZE: usize = 48;
pub const CTOR_RECORD_SIZE: usize = 24;
pub const ATTRIBUTE_RECORD_SIZE: usize = 24;
pub const PARAM_SIZE: usize = 8;
pub const SLOT_SIZE: usize = 8;

/// Field offset value meaning "unknown".
pub const NO_OFFSET: u64 = u64::MAX;

// ============================================================================
// Encoding primitives
// ============================================================================

/// Append-only little-endian writer.
pub(crate) struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Zero-fill up to absolute position `offset`.
    pub(crate) fn pad_to(&mut self, offset: u64) {
        let offset = offset as usize;
        if self.buf.len() < offset {
            self.buf.resize(offset, 0);
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    let raw = bytes.get(at..at.checked_add(8)?)?;
    Some(u64::from_le_bytes(raw.try_into().ok()?))
}

const fn align8(offset: u64) -> u64 {
    (offset + 7) & !7
}

// ============================================================================
// References
// ============================================================================

/// Location of a string in the string section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrRef {
    pub offset: u32,
    pub len: u32,
}

impl StrRef {
    /// Pack into one `u64` (offset in the low half).
    pub const fn pack(self) -> u64 {
        self.offset as u64 | (self.len as u64) << 32
    }

    pub const fn unpack(raw: u64) -> Self {
        StrRef {
            offset: raw as u32,
            len: (raw >> 32) as u32,
        }
    }

    /// Byte span within the string section, if it fits in `section_len`.
    pub fn span(self, section_len: usize) -> Option<Span<usize>> {
        let start = self.offset as usize;
        let end = start.checked_add(self.len as usize)?;
        (end <= section_len).then_some(start..end)
    }

    fn encode(self, enc: &mut Encoder) {
        enc.put_u32(self.offset);
        enc.put_u32(self.len);
    }

    fn decode(bytes: &[u8], at: usize) -> Option<Self> {
        Some(StrRef {
            offset: read_u32(bytes, at)?,
            len: read_u32(bytes, at + 4)?,
        })
    }
}

/// `(begin, count)` run of entries in another section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub begin: u32,
    pub count: u32,
}

impl Range {
    pub const fn new(begin: usize, count: usize) -> Self {
        Range {
            begin: begin as u32,
            count: count as u32,
        }
    }

    /// Index span, if it lies within a section of `len` entries.
    pub fn span(self, len: usize) -> Option<Span<usize>> {
        let start = self.begin as usize;
        let end = start.checked_add(self.count as usize)?;
        (end <= len).then_some(start..end)
    }

    fn encode(self, enc: &mut Encoder) {
        enc.put_u32(self.begin);
        enc.put_u32(self.count);
    }

    fn decode(bytes: &[u8], at: usize) -> Option<Self> {
        Some(Range {
            begin: read_u32(bytes, at)?,
            count: read_u32(bytes, at + 4)?,
        })
    }
}

// ============================================================================
// Header
// ============================================================================

/// Number of entries in each counted section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionCounts {
    pub types: u32,
    pub fields: u32,
    pub methods: u32,
    pub ctors: u32,
    pub attributes: u32,
    pub params: u32,
    pub string_bytes: u32,
}

/// Absolute byte offset of each section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionOffsets {
    pub types: u64,
    pub fields: u64,
    pub methods: u64,
    pub ctors: u64,
    pub attributes: u64,
    pub params: u64,
    pub strings: u64,
    pub method_fns: u64,
    pub ctor_fns: u64,
}

/// The fixed-size blob header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub version: u32,
    pub flags: u32,
    pub counts: SectionCounts,
    pub offsets: SectionOffsets,
    pub total_size: u64,
}

impl Header {
    /// Lay the sections out back to back for `counts`.
    pub fn layout(counts: SectionCounts) -> Self {
        let mut cursor = HEADER_SIZE as u64;
        let mut place = |len: u64| {
            let offset = align8(cursor);
            cursor = offset + len;
            offset
        };

        let offsets = SectionOffsets {
            types: place(counts.types as u64 * TYPE_RECORD_SIZE as u64),
            fields: place(counts.fields as u64 * FIELD_RECORD_SIZE as u64),
            methods: place(counts.methods as u64 * METHOD_RECORD_SIZE as u64),
            ctors: place(counts.ctors as u64 * CTOR_RECORD_SIZE as u64),
            attributes: place(counts.attributes as u64 * ATTRIBUTE_RECORD_SIZE as u64),
            params: place(counts.params as u64 * PARAM_SIZE as u64),
            strings: place(counts.string_bytes as u64),
            method_fns: place(counts.methods as u64 * SLOT_SIZE as u64),
            ctor_fns: place(counts.ctors as u64 * SLOT_SIZE as u64),
        };

        Header {
            version: VERSION,
            flags: 0,
            counts,
            offsets,
            total_size: align8(cursor),
        }
    }

    /// `(offset, byte length)` of every section, in layout order.
    pub fn regions(&self) -> [(u64, Option<u64>); 9] {
        let c = &self.counts;
        let o = &self.offsets;
        let sized = |count: u32, size: usize| (count as u64).checked_mul(size as u64);
        [
            (o.types, sized(c.types, TYPE_RECORD_SIZE)),
            (o.fields, sized(c.fields, FIELD_RECORD_SIZE)),
            (o.methods, sized(c.methods, METHOD_RECORD_SIZE)),
            (o.ctors, sized(c.ctors, CTOR_RECORD_SIZE)),
            (o.attributes, sized(c.attributes, ATTRIBUTE_RECORD_SIZE)),
            (o.params, sized(c.params, PARAM_SIZE)),
            (o.strings, Some(c.string_bytes as u64)),
            (o.method_fns, sized(c.methods, SLOT_SIZE)),
            (o.ctor_fns, sized(c.ctors, SLOT_SIZE)),
        ]
    }

    pub(crate) fn encode(&self, enc: &mut Encoder) {
        enc.put_u32(self.version);
        enc.put_u32(self.flags);

        let c = &self.counts;
        for count in [
            c.types,
            c.fields,
            c.methods,
            c.ctors,
            c.attributes,
            c.params,
            c.string_bytes,
        ] {
            enc.put_u32(count);
        }
        enc.put_u32(0);

        let o = &self.offsets;
        for offset in [
            o.types,
            o.fields,
            o.methods,
            o.ctors,
            o.attributes,
            o.params,
            o.strings,
            o.method_fns,
            o.ctor_fns,
        ] {
            enc.put_u64(offset);
        }
        enc.put_u64(self.total_size);
    }

    /// Read a header. `None` if `bytes` is shorter than [`HEADER_SIZE`].
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let count = |i: usize| read_u32(bytes, 8 + 4 * i);
        let offset = |i: usize| read_u64(bytes, 40 + 8 * i);

        Some(Header {
            version: read_u32(bytes, 0)?,
            flags: read_u32(bytes, 4)?,
            counts: SectionCounts {
                types: count(0)?,
                fields: count(1)?,
                methods: count(2)?,
                ctors: count(3)?,
                attributes: count(4)?,
                params: count(5)?,
                string_bytes: count(6)?,
            },
            offsets: SectionOffsets {
                types: offset(0)?,
                fields: offset(1)?,
                methods: offset(2)?,
                ctors: offset(3)?,
                attributes: offset(4)?,
                params: offset(5)?,
                strings: offset(6)?,
                method_fns: offset(7)?,
                ctor_fns: offset(8)?,
            },
            total_size: read_u64(bytes, 112)?,
        })
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeRecord {
    pub name: StrRef,
    pub type_hash: u64,
    pub module: u64,
    pub size: u64,
    pub align: u32,
    pub flags: u32,
    pub fields: Range,
    pub methods: Range,
    pub ctors: Range,
    pub attributes: Range,
}

impl TypeRecord {
    pub(crate) fn encode(&self, enc: &mut Encoder) {
        self.name.encode(enc);
        enc.put_u64(self.type_hash);
        enc.put_u64(self.module);
        enc.put_u64(self.size);
        enc.put_u32(self.align);
        enc.put_u32(self.flags);
        self.fields.encode(enc);
        self.methods.encode(enc);
        self.ctors.encode(enc);
        self.attributes.encode(enc);
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        Some(TypeRecord {
            name: StrRef::decode(bytes, 0)?,
            type_hash: read_u64(bytes, 8)?,
            module: read_u64(bytes, 16)?,
            size: read_u64(bytes, 24)?,
            align: read_u32(bytes, 32)?,
            flags: read_u32(bytes, 36)?,
            fields: Range::decode(bytes, 40)?,
            methods: Range::decode(bytes, 48)?,
            ctors: Range::decode(bytes, 56)?,
            attributes: Range::decode(bytes, 64)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldRecord {
    pub name: StrRef,
    pub type_hash: u64,
    /// Byte offset, or [`NO_OFFSET`].
    pub offset: u64,
    pub accessor_slot: u64,
    pub attributes: Range,
}

impl FieldRecord {
    pub(crate) fn encode(&self, enc: &mut Encoder) {
        self.name.encode(enc);
        enc.put_u64(self.type_hash);
        enc.put_u64(self.offset);
        enc.put_u64(self.accessor_slot);
        self.attributes.encode(enc);
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        Some(FieldRecord {
            name: StrRef::decode(bytes, 0)?,
            type_hash: read_u64(bytes, 8)?,
            offset: read_u64(bytes, 16)?,
            accessor_slot: read_u64(bytes, 24)?,
            attributes: Range::decode(bytes, 32)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodRecord {
    pub name: StrRef,
    pub return_type: u64,
    pub signature: u64,
    pub params: Range,
    pub flags: u32,
    pub attributes: Range,
}

impl MethodRecord {
    pub(crate) fn encode(&self, enc: &mut Encoder) {
        self.name.encode(enc);
        enc.put_u64(self.return_type);
        enc.put_u64(self.signature);
        self.params.encode(enc);
        enc.put_u32(self.flags);
        enc.put_u32(0);
        self.attributes.encode(enc);
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        Some(MethodRecord {
            name: StrRef::decode(bytes, 0)?,
            return_type: read_u64(bytes, 8)?,
            signature: read_u64(bytes, 16)?,
            params: Range::decode(bytes, 24)?,
            flags: read_u32(bytes, 32)?,
            attributes: Range::decode(bytes, 40)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtorRecord {
    pub signature: u64,
    pub params: Range,
    pub attributes: Range,
}

impl CtorRecord {
    pub(crate) fn encode(&self, enc: &mut Encoder) {
        enc.put_u64(self.signature);
        self.params.encode(enc);
        self.attributes.encode(enc);
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        Some(CtorRecord {
            signature: read_u64(bytes, 0)?,
            params: Range::decode(bytes, 8)?,
            attributes: Range::decode(bytes, 16)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeRecord {
    pub key: StrRef,
    /// [`AttributeKind`](refract_core::AttributeKind) tag.
    pub kind: u8,
    /// Kind-specific payload. Strings store a packed [`StrRef`].
    pub payload: u64,
}

impl AttributeRecord {
    pub(crate) fn encode(&self, enc: &mut Encoder) {
        self.key.encode(enc);
        enc.put_u8(self.kind);
        enc.put_bytes(&[0; 7]);
        enc.put_u64(self.payload);
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        Some(AttributeRecord {
            key: StrRef::decode(bytes, 0)?,
            kind: *bytes.get(8)?,
            payload: read_u64(bytes, 16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_layout() {
        let mut enc = Encoder::with_capacity(0);
        TypeRecord::default().encode(&mut enc);
        assert_eq!(enc.into_bytes().len(), TYPE_RECORD_SIZE);

        let mut enc = Encoder::with_capacity(0);
        FieldRecord::default().encode(&mut enc);
        assert_eq!(enc.into_bytes().len(), FIELD_RECORD_SIZE);

        let mut enc = Encoder::with_capacity(0);
        MethodRecord::default().encode(&mut enc);
        assert_eq!(enc.into_bytes().len(), METHOD_RECORD_SIZE);

        let mut enc = Encoder::with_capacity(0);
        CtorRecord::default().encode(&mut enc);
        assert_eq!(enc.into_bytes().len(), CTOR_RECORD_SIZE);

        let mut enc = Encoder::with_capacity(0);
        AttributeRecord::default().encode(&mut enc);
        assert_eq!(enc.into_bytes().len(), ATTRIBUTE_RECORD_SIZE);

        let mut enc = Encoder::with_capacity(0);
        Header::default().encode(&mut enc);
        assert_eq!(enc.into_bytes().len(), HEADER_SIZE);
    }

    #[test]
    fn layout_is_aligned_and_ordered() {
        let header = Header::layout(SectionCounts {
            types: 2,
            fields: 3,
            methods: 1,
            ctors: 1,
            attributes: 0,
            params: 3,
            string_bytes: 13,
        });

        assert_eq!(header.offsets.types, HEADER_SIZE as u64);
        let regions = header.regions();
        for pair in regions.windows(2) {
            let (offset, len) = pair[0];
            assert_eq!(offset % 8, 0);
            assert!(offset + len.unwrap() <= pair[1].0);
        }
        assert_eq!(header.total_size % 8, 0);
        assert_eq!(header.offsets.method_fns, align8(header.offsets.strings + 13));
    }

    #[test]
    fn header_decode_reads_what_encode_wrote() {
        let header = Header::layout(SectionCounts {
            types: 1,
            string_bytes: 5,
            ..SectionCounts::default()
        });
        let mut enc = Encoder::with_capacity(HEADER_SIZE);
        header.encode(&mut enc);
        let bytes = enc.into_bytes();

        assert_eq!(Header::decode(&bytes), Some(header));
        assert_eq!(Header::decode(&bytes[..HEADER_SIZE - 1]), None);
    }

    #[test]
    fn spans_reject_overflow() {
        assert_eq!(StrRef { offset: 2, len: 3 }.span(5), Some(2..5));
        assert_eq!(StrRef { offset: 2, len: 4 }.span(5), None);
        assert_eq!(Range { begin: u32::MAX, count: 1 }.span(u32::MAX as usize), None);
        assert_eq!(Range::new(1, 2).span(3), Some(1..3));
        assert_eq!(Range::new(1, 3).span(3), None);
        assert_eq!(StrRef::unpack(StrRef { offset: 7, len: 9 }.pack()), StrRef { offset: 7, len: 9 });
    }
}
