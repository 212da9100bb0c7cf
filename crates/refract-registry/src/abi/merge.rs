//! Blob to registry.
//!
//! A merge runs in two phases:
//!
//! 1. **Decode**: the whole blob is validated and turned into owned records.
//!    Function slots are resolved against the export table. Any problem
//!    fails the merge before the registry is touched.
//! 2. **Apply**: under the registration lock and the write lock, every
//!    decoded type is inserted, skipped or replaced according to the
//!    [`ConflictPolicy`]. With [`ConflictPolicy::Reject`] all conflicts are
//!    found first, so a rejected merge leaves the registry unchanged.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use refract_core::{
    AttributeKind, AttributeValue, Interner, MergeError, ModuleId, TypeHash,
};

use super::exports;
use super::format::{
    ATTRIBUTE_RECORD_SIZE, AttributeRecord, CTOR_RECORD_SIZE, CtorRecord, FIELD_RECORD_SIZE,
    FieldRecord, HEADER_SIZE, Header, METHOD_RECORD_SIZE, MethodRecord, NO_OFFSET, PARAM_SIZE,
    Range, StrRef, TYPE_RECORD_SIZE, TypeRecord, VERSION, read_u32, read_u64,
};
use crate::descriptor::{
    AttributeDescriptor, ConstructorDescriptor, FieldAccessor, FieldDescriptor, MethodDescriptor,
    MethodFlags, RowState, TypeDescriptor, TypeFlags,
};
use crate::registry::intern_attribute;
use crate::trampoline::Trampoline;
use crate::{ConflictPolicy, MergeOptions, Registry};

// ============================================================================
// Report
// ============================================================================

/// What happened to a conflicting type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictResolution {
    /// The existing row was kept.
    Skipped,
    /// The existing row was replaced by the incoming one.
    Replaced,
}

/// One type that was already registered when a merge ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDiagnostic {
    pub type_hash: TypeHash,
    pub name: Arc<str>,
    pub existing_module: ModuleId,
    pub incoming_module: ModuleId,
    pub resolution: ConflictResolution,
}

/// Outcome of a successful merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Types inserted into fresh slots.
    pub types_added: usize,
    /// Conflicting types whose existing row was kept.
    pub types_conflicted: usize,
    /// Conflicting types whose existing row was replaced.
    pub types_replaced: usize,
    /// Per-conflict details, when collection is enabled.
    pub conflicts: Vec<ConflictDiagnostic>,
}

impl MergeReport {
    /// True when no incoming type collided with an existing one.
    pub fn is_clean(&self) -> bool {
        self.types_conflicted == 0 && self.types_replaced == 0
    }
}

// ============================================================================
// Decode
// ============================================================================

#[derive(Clone)]
struct DecodedAttribute {
    key: String,
    value: AttributeValue,
}

#[derive(Clone)]
struct DecodedField {
    name: String,
    type_hash: TypeHash,
    offset: Option<usize>,
    accessor: Arc<FieldAccessor>,
    attributes: Vec<DecodedAttribute>,
}

#[derive(Clone)]
struct DecodedMethod {
    name: String,
    params: Vec<TypeHash>,
    return_type: TypeHash,
    signature: TypeHash,
    flags: MethodFlags,
    trampoline: Arc<Trampoline>,
    attributes: Vec<DecodedAttribute>,
}

#[derive(Clone)]
struct DecodedCtor {
    params: Vec<TypeHash>,
    signature: TypeHash,
    trampoline: Arc<Trampoline>,
    attributes: Vec<DecodedAttribute>,
}

struct DecodedType {
    name: String,
    type_hash: TypeHash,
    module: ModuleId,
    size: usize,
    align: usize,
    flags: TypeFlags,
    fields: Vec<DecodedField>,
    methods: Vec<DecodedMethod>,
    ctors: Vec<DecodedCtor>,
    attributes: Vec<DecodedAttribute>,
}

/// A blob whose header and section bounds have been checked.
struct BlobView<'a> {
    bytes: &'a [u8],
    header: Header,
    strings: &'a [u8],
}

impl<'a> BlobView<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, MergeError> {
        let version = read_u32(bytes, 0).ok_or(MergeError::CorruptOffsets)?;
        if version != VERSION {
            return Err(MergeError::UnsupportedVersion { found: version });
        }
        let header = Header::decode(bytes).ok_or(MergeError::CorruptOffsets)?;
        if header.total_size > bytes.len() as u64 {
            return Err(MergeError::CorruptOffsets);
        }

        for (offset, len) in header.regions() {
            let len = len.ok_or(MergeError::CorruptOffsets)?;
            if len == 0 {
                continue;
            }
            let end = offset.checked_add(len).ok_or(MergeError::CorruptOffsets)?;
            if offset < HEADER_SIZE as u64 || end > header.total_size {
                return Err(MergeError::CorruptOffsets);
            }
        }

        let strings = if header.counts.string_bytes == 0 {
            &[][..]
        } else {
            let start = header.offsets.strings as usize;
            bytes
                .get(start..start + header.counts.string_bytes as usize)
                .ok_or(MergeError::CorruptOffsets)?
        };

        Ok(BlobView {
            bytes,
            header,
            strings,
        })
    }

    fn record(&self, section: u64, size: usize, index: usize) -> Option<&'a [u8]> {
        let start = (section as usize).checked_add(index.checked_mul(size)?)?;
        self.bytes.get(start..start.checked_add(size)?)
    }

    /// One 8-byte entry of the params or function slot sections.
    fn word(&self, section: u64, index: usize) -> Option<u64> {
        let at = (section as usize).checked_add(index.checked_mul(PARAM_SIZE)?)?;
        read_u64(self.bytes, at)
    }

    fn string(&self, reference: StrRef) -> Option<&'a str> {
        let span = reference.span(self.strings.len())?;
        std::str::from_utf8(&self.strings[span]).ok()
    }

    fn params(&self, range: Range) -> Option<Vec<TypeHash>> {
        let span = range.span(self.header.counts.params as usize)?;
        span.map(|i| self.word(self.header.offsets.params, i).map(TypeHash))
            .collect()
    }
}

fn pick<T: Clone>(decoded: &[T], range: Range) -> Option<Vec<T>> {
    range.span(decoded.len()).map(|span| decoded[span].to_vec())
}

/// Validate the whole blob and resolve its function slots.
fn decode(bytes: &[u8]) -> Result<Vec<DecodedType>, MergeError> {
    let view = BlobView::parse(bytes)?;
    let counts = view.header.counts;
    let offsets = view.header.offsets;
    let table = exports();

    let mut attributes = Vec::with_capacity(counts.attributes as usize);
    for index in 0..counts.attributes as usize {
        let corrupt = MergeError::CorruptAttributeRecord { index };
        let record = view
            .record(offsets.attributes, ATTRIBUTE_RECORD_SIZE, index)
            .and_then(AttributeRecord::decode)
            .ok_or(corrupt.clone())?;
        let key = view.string(record.key).ok_or(corrupt.clone())?;
        let kind = AttributeKind::try_from(record.kind).map_err(|_| corrupt.clone())?;
        let value = match kind {
            AttributeKind::Bool => match record.payload {
                0 => AttributeValue::Bool(false),
                1 => AttributeValue::Bool(true),
                _ => return Err(corrupt),
            },
            AttributeKind::Int => AttributeValue::Int(record.payload as i64),
            AttributeKind::Double => AttributeValue::from(f64::from_bits(record.payload)),
            AttributeKind::String => {
                let text = view
                    .string(StrRef::unpack(record.payload))
                    .ok_or(corrupt)?;
                AttributeValue::from(text)
            }
            AttributeKind::Type => AttributeValue::Type(TypeHash(record.payload)),
        };
        attributes.push(DecodedAttribute {
            key: key.to_string(),
            value,
        });
    }

    let mut fields = Vec::with_capacity(counts.fields as usize);
    for index in 0..counts.fields as usize {
        let corrupt = MergeError::CorruptFieldRecord { index };
        let record = view
            .record(offsets.fields, FIELD_RECORD_SIZE, index)
            .and_then(FieldRecord::decode)
            .ok_or(corrupt.clone())?;
        let name = view.string(record.name).ok_or(corrupt.clone())?;
        let accessor = table.field(record.accessor_slot).ok_or(corrupt.clone())?;
        let offset = match record.offset {
            NO_OFFSET => None,
            raw => Some(usize::try_from(raw).map_err(|_| corrupt.clone())?),
        };
        fields.push(DecodedField {
            name: name.to_string(),
            type_hash: TypeHash(record.type_hash),
            offset,
            accessor: Arc::clone(accessor),
            attributes: pick(&attributes, record.attributes).ok_or(corrupt)?,
        });
    }

    let mut methods = Vec::with_capacity(counts.methods as usize);
    for index in 0..counts.methods as usize {
        let corrupt = MergeError::CorruptMethodRecord { index };
        let record = view
            .record(offsets.methods, METHOD_RECORD_SIZE, index)
            .and_then(MethodRecord::decode)
            .ok_or(corrupt.clone())?;
        let name = view.string(record.name).ok_or(corrupt.clone())?;
        let params = view.params(record.params).ok_or(corrupt.clone())?;
        let flags = MethodFlags::from_bits(record.flags).ok_or(corrupt.clone())?;
        let trampoline = view
            .word(offsets.method_fns, index)
            .and_then(|slot| table.invoke(slot))
            .filter(|t| t.arity() == params.len())
            .ok_or(corrupt.clone())?;
        methods.push(DecodedMethod {
            name: name.to_string(),
            params,
            return_type: TypeHash(record.return_type),
            signature: TypeHash(record.signature),
            flags,
            trampoline: Arc::clone(trampoline),
            attributes: pick(&attributes, record.attributes).ok_or(corrupt)?,
        });
    }

    let mut ctors = Vec::with_capacity(counts.ctors as usize);
    for index in 0..counts.ctors as usize {
        let corrupt = MergeError::CorruptCtorRecord { index };
        let record = view
            .record(offsets.ctors, CTOR_RECORD_SIZE, index)
            .and_then(CtorRecord::decode)
            .ok_or(corrupt.clone())?;
        let params = view.params(record.params).ok_or(corrupt.clone())?;
        let trampoline = view
            .word(offsets.ctor_fns, index)
            .and_then(|slot| table.invoke(slot))
            .filter(|t| t.arity() == params.len())
            .ok_or(corrupt.clone())?;
        ctors.push(DecodedCtor {
            params,
            signature: TypeHash(record.signature),
            trampoline: Arc::clone(trampoline),
            attributes: pick(&attributes, record.attributes).ok_or(corrupt)?,
        });
    }
    drop(table);

    let mut seen = FxHashSet::default();
    let mut types = Vec::with_capacity(counts.types as usize);
    for index in 0..counts.types as usize {
        let corrupt = MergeError::CorruptTypeRecord { index };
        let record = view
            .record(offsets.types, TYPE_RECORD_SIZE, index)
            .and_then(TypeRecord::decode)
            .ok_or(corrupt.clone())?;
        if !seen.insert(record.type_hash) {
            return Err(corrupt);
        }
        let name = view.string(record.name).ok_or(corrupt.clone())?;
        types.push(DecodedType {
            name: name.to_string(),
            type_hash: TypeHash(record.type_hash),
            module: ModuleId(record.module),
            size: usize::try_from(record.size).map_err(|_| corrupt.clone())?,
            align: record.align as usize,
            flags: TypeFlags::from_bits(record.flags).ok_or(corrupt.clone())?,
            fields: pick(&fields, record.fields).ok_or(corrupt.clone())?,
            methods: pick(&methods, record.methods).ok_or(corrupt.clone())?,
            ctors: pick(&ctors, record.ctors).ok_or(corrupt.clone())?,
            attributes: pick(&attributes, record.attributes).ok_or(corrupt)?,
        });
    }

    Ok(types)
}

// ============================================================================
// Apply
// ============================================================================

fn intern_all(
    names: &mut Interner,
    attributes: Vec<DecodedAttribute>,
    module: ModuleId,
) -> Vec<AttributeDescriptor> {
    attributes
        .into_iter()
        .map(|a| intern_attribute(names, &a.key, a.value, module))
        .collect()
}

/// Build a published row for `ty` owned by `module`.
fn build_row(names: &mut Interner, ty: DecodedType, module: ModuleId) -> TypeDescriptor {
    let name = names.intern_in(&ty.name, module);
    let mut row = TypeDescriptor::skeleton(
        name,
        ty.type_hash,
        module,
        ty.size,
        ty.align,
        ty.flags,
    );

    for field in ty.fields {
        row.add_field(FieldDescriptor {
            name: names.intern_in(&field.name, module),
            type_hash: field.type_hash,
            offset: field.offset,
            accessor: field.accessor,
            attributes: intern_all(names, field.attributes, module),
        });
    }
    for method in ty.methods {
        row.add_method(MethodDescriptor {
            name: names.intern_in(&method.name, module),
            params: method.params,
            return_type: method.return_type,
            flags: method.flags,
            signature: method.signature,
            trampoline: method.trampoline,
            attributes: intern_all(names, method.attributes, module),
        });
    }
    for ctor in ty.ctors {
        row.add_constructor(ConstructorDescriptor {
            params: ctor.params,
            signature: ctor.signature,
            trampoline: ctor.trampoline,
            attributes: intern_all(names, ctor.attributes, module),
        });
    }
    row.attributes = intern_all(names, ty.attributes, module);
    row.state = RowState::Published;
    row
}

/// Move the members a blob cannot carry from `old` into `row`.
fn carry_over(names: &mut Interner, old: &TypeDescriptor, row: &mut TypeDescriptor) {
    for property in &old.properties {
        let mut property = property.clone();
        property.name = names.intern_in(property.name.as_str(), row.module);
        row.add_property(property);
    }
    for base in &old.bases {
        row.add_base(base.clone());
    }
    for value in &old.enum_values {
        let mut value = value.clone();
        value.name = names.intern_in(value.name.as_str(), row.module);
        row.add_enum_value(value);
    }
}

impl Registry {
    /// Merge a blob using the registry's configured conflict handling.
    pub fn merge(&self, bytes: &[u8]) -> Result<MergeReport, MergeError> {
        self.merge_with(bytes, &MergeOptions::from(self.config()))
    }

    /// Merge a blob produced by [`Registry::export`].
    ///
    /// # Arguments
    ///
    /// * `bytes` - The blob
    /// * `options` - Conflict policy and ownership overrides
    ///
    /// # Returns
    ///
    /// * `Ok(MergeReport)` - Counts of added, skipped and replaced types
    /// * `Err(MergeError)` - The blob is malformed, or the policy rejected a
    ///   conflict. The registry is unchanged in either case.
    ///
    /// A replaced row keeps its slot and gets a new generation, so handles
    /// to the old row go stale. A row that is still being registered is
    /// never replaced.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn merge_with(
        &self,
        bytes: &[u8],
        options: &MergeOptions,
    ) -> Result<MergeReport, MergeError> {
        let decoded = decode(bytes)?;

        let _serial = self.registration_lock();
        let mut guard = self.write();
        let state = &mut *guard;

        if options.policy == ConflictPolicy::Reject {
            let conflicting: Vec<TypeHash> = decoded
                .iter()
                .map(|ty| ty.type_hash)
                .filter(|hash| state.index_of(*hash).is_some())
                .collect();
            if let Some(&first) = conflicting.first() {
                warn!(
                    type_hash = %first,
                    conflicted = conflicting.len(),
                    "merge rejected"
                );
                return Err(MergeError::DuplicateTypeId {
                    type_hash: first,
                    conflicted: conflicting.len(),
                });
            }
        }

        let mut report = MergeReport::default();
        for ty in decoded {
            let type_hash = ty.type_hash;
            let incoming = options.module_override.unwrap_or(ty.module);
            let existing = state.index_of(ty.type_hash).and_then(|index| {
                let row = state.slots.get(index as usize)?.row.as_ref()?;
                Some((index, row.module, row.name.text(), row.is_published()))
            });

            let Some((index, existing_module, name, published)) = existing else {
                let row = build_row(&mut state.names, ty, incoming);
                state.insert_row(row);
                report.types_added += 1;
                continue;
            };

            let replace = options.policy == ConflictPolicy::Replace
                && published
                && (existing_module == incoming || options.allow_any_module);

            let resolution = if replace {
                let mut row = build_row(&mut state.names, ty, incoming);
                if let Some(old) = state.slots[index as usize].row.as_ref() {
                    carry_over(&mut state.names, old, &mut row);
                }
                state.replace_row(index, row);
                report.types_replaced += 1;
                ConflictResolution::Replaced
            } else {
                warn!(
                    type_name = %name,
                    existing = ?existing_module,
                    incoming = ?incoming,
                    "merge kept existing type"
                );
                report.types_conflicted += 1;
                ConflictResolution::Skipped
            };

            if options.collect_conflicts {
                report.conflicts.push(ConflictDiagnostic {
                    type_hash,
                    name,
                    existing_module,
                    incoming_module: incoming,
                    resolution,
                });
            }
        }

        debug!(
            added = report.types_added,
            conflicted = report.types_conflicted,
            replaced = report.types_replaced,
            "merged blob"
        );
        Ok(report)
    }
}
