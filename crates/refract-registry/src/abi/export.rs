//! Registry to blob.

use rustc_hash::FxHashMap;
use tracing::debug;

use refract_core::AttributeValue;

use super::format::{
    AttributeRecord, CtorRecord, Encoder, FieldRecord, Header, MethodRecord, NO_OFFSET, Range,
    SectionCounts, StrRef, TypeRecord,
};
use super::{AbiBlob, ExportTable, exports};
use crate::Registry;
use crate::descriptor::{AttributeDescriptor, TypeDescriptor};

/// Deduplicated string section.
#[derive(Default)]
struct StringTable {
    bytes: Vec<u8>,
    seen: FxHashMap<String, StrRef>,
}

impl StringTable {
    fn add(&mut self, text: &str) -> StrRef {
        if let Some(&existing) = self.seen.get(text) {
            return existing;
        }
        let entry = StrRef {
            offset: self.bytes.len() as u32,
            len: text.len() as u32,
        };
        self.bytes.extend_from_slice(text.as_bytes());
        self.seen.insert(text.to_string(), entry);
        entry
    }
}

/// Records collected before the blob is laid out.
#[derive(Default)]
struct Sections {
    strings: StringTable,
    types: Vec<TypeRecord>,
    fields: Vec<FieldRecord>,
    methods: Vec<MethodRecord>,
    ctors: Vec<CtorRecord>,
    attributes: Vec<AttributeRecord>,
    params: Vec<u64>,
    method_fns: Vec<u64>,
    ctor_fns: Vec<u64>,
}

impl Sections {
    fn push_type(&mut self, row: &TypeDescriptor, table: &mut ExportTable) {
        let name = self.strings.add(row.name.as_str());

        let begin = self.fields.len();
        for field in &row.fields {
            let name = self.strings.add(field.name.as_str());
            let attributes = self.push_attributes(&field.attributes);
            self.fields.push(FieldRecord {
                name,
                type_hash: field.type_hash.0,
                offset: field.offset.map_or(NO_OFFSET, |o| o as u64),
                accessor_slot: table.field_slot(&field.accessor),
                attributes,
            });
        }
        let fields = Range::new(begin, row.fields.len());

        let begin = self.methods.len();
        for method in &row.methods {
            let name = self.strings.add(method.name.as_str());
            let params = self.push_params(&method.params);
            let attributes = self.push_attributes(&method.attributes);
            self.methods.push(MethodRecord {
                name,
                return_type: method.return_type.0,
                signature: method.signature.0,
                params,
                flags: method.flags.bits(),
                attributes,
            });
            self.method_fns.push(table.invoke_slot(&method.trampoline));
        }
        let methods = Range::new(begin, row.methods.len());

        let begin = self.ctors.len();
        for ctor in &row.constructors {
            let params = self.push_params(&ctor.params);
            let attributes = self.push_attributes(&ctor.attributes);
            self.ctors.push(CtorRecord {
                signature: ctor.signature.0,
                params,
                attributes,
            });
            self.ctor_fns.push(table.invoke_slot(&ctor.trampoline));
        }
        let ctors = Range::new(begin, row.constructors.len());

        let attributes = self.push_attributes(&row.attributes);

        self.types.push(TypeRecord {
            name,
            type_hash: row.type_hash.0,
            module: row.module.0,
            size: row.size as u64,
            align: row.align as u32,
            flags: row.flags.bits(),
            fields,
            methods,
            ctors,
            attributes,
        });
    }

    fn push_params(&mut self, params: &[refract_core::TypeHash]) -> Range {
        let begin = self.params.len();
        self.params.extend(params.iter().map(|p| p.0));
        Range::new(begin, params.len())
    }

    fn push_attributes(&mut self, attributes: &[AttributeDescriptor]) -> Range {
        let begin = self.attributes.len();
        for attribute in attributes {
            let key = self.strings.add(attribute.key.as_str());
            let payload = match &attribute.value {
                AttributeValue::Bool(v) => u64::from(*v),
                AttributeValue::Int(v) => *v as u64,
                AttributeValue::Double(v) => v.0.to_bits(),
                AttributeValue::String(text) => self.strings.add(text).pack(),
                AttributeValue::Type(hash) => hash.0,
            };
            self.attributes.push(AttributeRecord {
                key,
                kind: attribute.value.kind().into(),
                payload,
            });
        }
        Range::new(begin, attributes.len())
    }

    fn finish(self) -> AbiBlob {
        let header = Header::layout(SectionCounts {
            types: self.types.len() as u32,
            fields: self.fields.len() as u32,
            methods: self.methods.len() as u32,
            ctors: self.ctors.len() as u32,
            attributes: self.attributes.len() as u32,
            params: self.params.len() as u32,
            string_bytes: self.strings.bytes.len() as u32,
        });
        let offsets = header.offsets;

        let mut enc = Encoder::with_capacity(header.total_size as usize);
        header.encode(&mut enc);

        enc.pad_to(offsets.types);
        self.types.iter().for_each(|r| r.encode(&mut enc));
        enc.pad_to(offsets.fields);
        self.fields.iter().for_each(|r| r.encode(&mut enc));
        enc.pad_to(offsets.methods);
        self.methods.iter().for_each(|r| r.encode(&mut enc));
        enc.pad_to(offsets.ctors);
        self.ctors.iter().for_each(|r| r.encode(&mut enc));
        enc.pad_to(offsets.attributes);
        self.attributes.iter().for_each(|r| r.encode(&mut enc));
        enc.pad_to(offsets.params);
        self.params.iter().for_each(|&p| enc.put_u64(p));
        enc.pad_to(offsets.strings);
        enc.put_bytes(&self.strings.bytes);
        enc.pad_to(offsets.method_fns);
        self.method_fns.iter().for_each(|&s| enc.put_u64(s));
        enc.pad_to(offsets.ctor_fns);
        self.ctor_fns.iter().for_each(|&s| enc.put_u64(s));
        enc.pad_to(header.total_size);

        AbiBlob {
            bytes: enc.into_bytes(),
        }
    }
}

impl Registry {
    /// Serialize every published type into an [`AbiBlob`].
    ///
    /// Rows are written in slot order. Methods and constructors keep their
    /// declaration order, so overload resolution on the merged side picks
    /// the same candidates.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn export(&self) -> AbiBlob {
        let state = self.read();
        let mut table = exports();
        let mut sections = Sections::default();

        for (_, row) in state.types() {
            sections.push_type(row, &mut table);
        }
        drop(table);
        drop(state);

        let types = sections.types.len();
        let blob = sections.finish();
        debug!(types, bytes = blob.len(), "exported registry");
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::format::{HEADER_SIZE, VERSION};

    #[test]
    fn strings_are_deduplicated() {
        let mut table = StringTable::default();
        let a = table.add("len");
        let b = table.add("width");
        assert_eq!(table.add("len"), a);
        assert_eq!(b.offset, 3);
        assert_eq!(table.bytes, b"lenwidth");
    }

    #[test]
    fn empty_registry_exports_header_only() {
        let registry = Registry::new();
        let blob = registry.export();
        let header = blob.header().unwrap();

        assert_eq!(header.version, VERSION);
        assert_eq!(header.counts.types, 0);
        assert_eq!(blob.len(), HEADER_SIZE);
        assert_eq!(header.total_size, HEADER_SIZE as u64);
    }

    #[test]
    fn primitives_are_exported() {
        let registry = Registry::new();
        registry.ensure_registered::<i32>();
        registry.ensure_registered::<f64>();

        let header = registry.export().header().unwrap();
        assert_eq!(header.counts.types, 2);
        assert_eq!(header.counts.string_bytes, 6);
    }
}
