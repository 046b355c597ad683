//! Dynamic message storage.
//!
//! A [`DynamicMessage`] is the runtime entity behind both generated accessors
//! and generic reflection: a mapping from field number to value, with
//! presence tracking for singular fields, ordered storage for repeated
//! fields, and side-channels for unrecognized fields and extensions. It
//! knows nothing about the wire format; the codecs in [`crate::codec`] read
//! and write it through the operations here.
//!
//! Every mutation is type-checked against the shared descriptor at the call
//! site, so a message that exists is always internally consistent and
//! serialization cannot fail on a type error.

mod unknown;

use crate::descriptor::{
    DescriptorRegistry, ExtensionDescriptor, FieldDescriptor, FieldKind, MessageDescriptor,
};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use unknown::{UnknownField, UnknownFieldSet};

/// A single field value: the runtime counterpart of [`FieldKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// int32, sint32, sfixed32
    I32(i32),
    /// int64, sint64, sfixed64
    I64(i64),
    /// uint32, fixed32
    U32(u32),
    /// uint64, fixed64
    U64(u64),
    /// float
    F32(f32),
    /// double
    F64(f64),
    /// bool
    Bool(bool),
    /// string
    String(String),
    /// bytes
    Bytes(Bytes),
    /// enum, stored as its raw number so unrecognized values round-trip
    EnumNumber(i32),
    /// message or group
    Message(DynamicMessage),
}

impl Value {
    /// Name of this value's shape, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
        }
    }

    /// The value an absent singular field reads as: the declared proto2
    /// default if any, otherwise the type's zero value. Message fields have
    /// no default.
    pub fn default_for(field: &FieldDescriptor) -> Option<Value> {
        if let Some(declared) = field.default_value() {
            return Some(declared.clone());
        }
        let zero = match field.kind() {
            FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => Value::I32(0),
            FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => Value::I64(0),
            FieldKind::Uint32 | FieldKind::Fixed32 => Value::U32(0),
            FieldKind::Uint64 | FieldKind::Fixed64 => Value::U64(0),
            FieldKind::Float => Value::F32(0.0),
            FieldKind::Double => Value::F64(0.0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => Value::Bytes(Bytes::new()),
            FieldKind::Enum => Value::EnumNumber(0),
            FieldKind::Message | FieldKind::Group => return None,
        };
        Some(zero)
    }

    /// Borrow the nested message, if this value holds one
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    fn matches(&self, field: &FieldDescriptor) -> bool {
        match (field.kind(), self) {
            (FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32, Value::I32(_)) => true,
            (FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64, Value::I64(_)) => true,
            (FieldKind::Uint32 | FieldKind::Fixed32, Value::U32(_)) => true,
            (FieldKind::Uint64 | FieldKind::Fixed64, Value::U64(_)) => true,
            (FieldKind::Float, Value::F32(_)) => true,
            (FieldKind::Double, Value::F64(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Bytes, Value::Bytes(_)) => true,
            (FieldKind::Enum, Value::EnumNumber(_)) => true,
            (FieldKind::Message | FieldKind::Group, Value::Message(m)) => {
                Some(m.descriptor().full_name()) == field.type_name()
            }
            _ => false,
        }
    }
}

/// Storage slot for one declared field
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Singular(Value),
    Repeated(Vec<Value>),
}

/// Storage slot for one extension field, carrying the identity it was set
/// under so definitions sharing a number stay distinguishable
#[derive(Debug, Clone)]
struct ExtensionValue {
    descriptor: Arc<ExtensionDescriptor>,
    value: FieldValue,
}

impl PartialEq for ExtensionValue {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.full_name() == other.descriptor.full_name() && self.value == other.value
    }
}

const EMPTY_VALUES: &[Value] = &[];

/// A message instance whose shape is driven entirely by its descriptor.
///
/// Created empty, from bytes (via [`crate::codec::binary`]) or from JSON
/// text (via [`crate::codec::json`]); mutated through the typed operations
/// below. Ownership of nested messages is strictly tree-shaped: assigning a
/// message value moves it into the parent, and sharing across trees requires
/// an explicit clone.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    fields: BTreeMap<u32, FieldValue>,
    extensions: BTreeMap<u32, ExtensionValue>,
    unknown: UnknownFieldSet,
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.full_name() == other.descriptor.full_name()
            && self.fields == other.fields
            && self.extensions == other.extensions
            && self.unknown == other.unknown
    }
}

impl DynamicMessage {
    /// Creates an empty message of the given type: all singular fields
    /// absent, all repeated fields empty.
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            fields: BTreeMap::new(),
            extensions: BTreeMap::new(),
            unknown: UnknownFieldSet::new(),
        }
    }

    /// The shared descriptor describing this message's type
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// True if a singular field is present, or a repeated field non-empty
    pub fn has_field(&self, number: u32) -> bool {
        match self.fields.get(&number) {
            Some(FieldValue::Singular(_)) => true,
            Some(FieldValue::Repeated(values)) => !values.is_empty(),
            None => false,
        }
    }

    /// Value of a singular field, or `None` when absent (or when the number
    /// names a repeated field; use [`DynamicMessage::get_repeated`] there)
    pub fn get_field(&self, number: u32) -> Option<&Value> {
        match self.fields.get(&number) {
            Some(FieldValue::Singular(value)) => Some(value),
            _ => None,
        }
    }

    /// Value of a singular field, falling back to its declared or zero
    /// default when absent. `None` for undeclared numbers, repeated fields
    /// and absent message fields.
    pub fn get_field_or_default(&self, number: u32) -> Option<Value> {
        if let Some(value) = self.get_field(number) {
            return Some(value.clone());
        }
        let field = self.descriptor.field(number)?;
        if field.is_repeated() {
            return None;
        }
        Value::default_for(field)
    }

    /// Set a singular field, replacing any present value.
    ///
    /// Fails with [`Error::FieldNotFound`] for undeclared numbers, and
    /// [`Error::TypeMismatch`] when the value's shape does not match the
    /// declared type (repeated fields included; append to those instead).
    pub fn set_field(&mut self, number: u32, value: Value) -> Result<()> {
        let field = self.field_descriptor(number)?;
        if field.is_repeated() {
            return Err(Error::type_mismatch(
                self.descriptor.field_path(field),
                "repeated",
                value.kind_name(),
            ));
        }
        Self::check_value(&self.descriptor, field, &value)?;
        self.fields.insert(number, FieldValue::Singular(value));
        Ok(())
    }

    /// Clear a field: singular becomes absent, repeated becomes empty.
    /// Clearing an undeclared or already-clear field is a no-op.
    pub fn clear_field(&mut self, number: u32) {
        self.fields.remove(&number);
    }

    /// Values of a repeated field in order; empty for absent or singular
    /// numbers
    pub fn get_repeated(&self, number: u32) -> &[Value] {
        match self.fields.get(&number) {
            Some(FieldValue::Repeated(values)) => values,
            _ => EMPTY_VALUES,
        }
    }

    /// Append one value to a repeated field.
    ///
    /// Fails with [`Error::TypeMismatch`] on singular fields or on a value
    /// shape mismatch.
    pub fn append_repeated(&mut self, number: u32, value: Value) -> Result<()> {
        let field = self.field_descriptor(number)?;
        if !field.is_repeated() {
            return Err(Error::type_mismatch(
                self.descriptor.field_path(field),
                "singular",
                "repeated append",
            ));
        }
        Self::check_value(&self.descriptor, field, &value)?;
        match self
            .fields
            .entry(number)
            .or_insert_with(|| FieldValue::Repeated(Vec::new()))
        {
            FieldValue::Repeated(values) => values.push(value),
            FieldValue::Singular(_) => unreachable!("repeated field stored as singular"),
        }
        Ok(())
    }

    /// Merge `other` into this message: singular scalars overwrite, singular
    /// messages merge recursively, repeated fields and unknown sets
    /// concatenate.
    ///
    /// Fails with [`Error::TypeMismatch`] when the two messages are of
    /// different types.
    pub fn merge_from(&mut self, other: DynamicMessage) -> Result<()> {
        if self.descriptor.full_name() != other.descriptor.full_name() {
            return Err(Error::type_mismatch(
                self.descriptor.full_name(),
                "same message type",
                "different message type",
            ));
        }

        for (number, slot) in other.fields {
            match slot {
                FieldValue::Repeated(values) => {
                    match self
                        .fields
                        .entry(number)
                        .or_insert_with(|| FieldValue::Repeated(Vec::new()))
                    {
                        FieldValue::Repeated(existing) => existing.extend(values),
                        FieldValue::Singular(_) => {
                            unreachable!("repeated field stored as singular")
                        }
                    }
                }
                FieldValue::Singular(Value::Message(sub)) => {
                    self.set_or_merge_message(number, sub)?;
                }
                FieldValue::Singular(value) => {
                    self.fields.insert(number, FieldValue::Singular(value));
                }
            }
        }

        for (number, ext) in other.extensions {
            match self.extensions.get_mut(&number) {
                Some(existing)
                    if existing.descriptor.full_name() == ext.descriptor.full_name() =>
                {
                    match (&mut existing.value, ext.value) {
                        (FieldValue::Repeated(left), FieldValue::Repeated(right)) => {
                            left.extend(right)
                        }
                        (
                            FieldValue::Singular(Value::Message(left)),
                            FieldValue::Singular(Value::Message(right)),
                        ) => left.merge_from(right)?,
                        (slot, incoming) => *slot = incoming,
                    }
                }
                _ => {
                    self.extensions.insert(number, ext);
                }
            }
        }

        self.unknown.extend(other.unknown);
        Ok(())
    }

    /// Set a singular message field, or recursively merge into the value
    /// already present (the wire-format rule for repeated occurrences of a
    /// singular message field).
    pub(crate) fn set_or_merge_message(&mut self, number: u32, sub: DynamicMessage) -> Result<()> {
        if let Some(FieldValue::Singular(Value::Message(existing))) = self.fields.get_mut(&number)
        {
            existing.merge_from(sub)
        } else {
            self.set_field(number, Value::Message(sub))
        }
    }

    /// Unrecognized fields retained by the last parse
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    /// Remove and return the raw unknown entries for a field number (the
    /// typed-accessor claim hook; see [`UnknownFieldSet::take`])
    pub fn take_unknown(&mut self, number: u32) -> Vec<UnknownField> {
        self.unknown.take(number)
    }

    pub(crate) fn push_unknown(&mut self, field: UnknownField) {
        self.unknown.push(field);
    }

    /// Presence check for an extension under its global identity
    pub fn has_extension(&self, ext: &ExtensionDescriptor) -> bool {
        self.extension_slot(ext).is_some()
    }

    /// Value of a singular extension, or `None` when absent or registered
    /// under a different identity for the same number
    pub fn get_extension(&self, ext: &ExtensionDescriptor) -> Option<&Value> {
        match self.extension_slot(ext) {
            Some(FieldValue::Singular(value)) => Some(value),
            _ => None,
        }
    }

    /// Values of a repeated extension in order
    pub fn get_repeated_extension(&self, ext: &ExtensionDescriptor) -> &[Value] {
        match self.extension_slot(ext) {
            Some(FieldValue::Repeated(values)) => values,
            _ => EMPTY_VALUES,
        }
    }

    /// Set a singular extension field, with the same type checks as
    /// [`DynamicMessage::set_field`]
    pub fn set_extension(&mut self, ext: &Arc<ExtensionDescriptor>, value: Value) -> Result<()> {
        self.check_extension(ext, &value, false)?;
        self.extensions.insert(
            ext.field().number(),
            ExtensionValue {
                descriptor: ext.clone(),
                value: FieldValue::Singular(value),
            },
        );
        Ok(())
    }

    /// Append one value to a repeated extension field
    pub fn append_extension(&mut self, ext: &Arc<ExtensionDescriptor>, value: Value) -> Result<()> {
        self.check_extension(ext, &value, true)?;
        let number = ext.field().number();
        let slot = self
            .extensions
            .entry(number)
            .or_insert_with(|| ExtensionValue {
                descriptor: ext.clone(),
                value: FieldValue::Repeated(Vec::new()),
            });
        // A different definition over the same number is evicted, not mixed
        if slot.descriptor.full_name() != ext.full_name() {
            *slot = ExtensionValue {
                descriptor: ext.clone(),
                value: FieldValue::Repeated(Vec::new()),
            };
        }
        match &mut slot.value {
            FieldValue::Repeated(values) => values.push(value),
            FieldValue::Singular(_) => unreachable!("repeated extension stored as singular"),
        }
        Ok(())
    }

    /// Clear an extension field (no-op when absent)
    pub fn clear_extension(&mut self, ext: &ExtensionDescriptor) {
        if self.extension_slot(ext).is_some() {
            self.extensions.remove(&ext.field().number());
        }
    }

    /// Strict enum validation: fails with [`Error::InvalidEnumValue`] if any
    /// enum-typed field (nested messages and extensions included) holds a
    /// number the enum does not declare. By default unknown enum numbers are
    /// legal and round-trip untouched; this is the opt-in check.
    pub fn validate_enums(&self, registry: &DescriptorRegistry) -> Result<()> {
        let slots = self
            .fields
            .iter()
            .filter_map(|(number, slot)| {
                self.descriptor.field(*number).map(|field| (field, slot))
            })
            .chain(
                self.extensions
                    .values()
                    .map(|ext| (ext.descriptor.field(), &ext.value)),
            );

        for (field, slot) in slots {
            let values = match slot {
                FieldValue::Singular(value) => std::slice::from_ref(value),
                FieldValue::Repeated(values) => values.as_slice(),
            };
            for value in values {
                match value {
                    Value::EnumNumber(number) => {
                        let enum_name = field.type_name().unwrap_or_default();
                        let descriptor = registry.enum_by_name(enum_name)?;
                        if descriptor.name(*number).is_none() {
                            return Err(Error::InvalidEnumValue {
                                enum_name: enum_name.to_string(),
                                number: *number,
                            });
                        }
                    }
                    Value::Message(sub) => sub.validate_enums(registry)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Iterate declared fields present in this message, in ascending number
    /// order, for the serializer
    pub(crate) fn field_slots(
        &self,
    ) -> impl Iterator<Item = (&FieldDescriptor, SlotRef<'_>)> {
        self.fields.iter().filter_map(|(number, slot)| {
            let field = self.descriptor.field(*number)?;
            Some((field, SlotRef::from(slot)))
        })
    }

    /// Iterate extension slots in ascending number order, for the serializer
    pub(crate) fn extension_slots(
        &self,
    ) -> impl Iterator<Item = (&Arc<ExtensionDescriptor>, SlotRef<'_>)> {
        self.extensions
            .values()
            .map(|ext| (&ext.descriptor, SlotRef::from(&ext.value)))
    }

    /// Wire-side extension assignment: repeated extensions append, singular
    /// messages merge into a present value, everything else overwrites
    pub(crate) fn set_extension_from_wire(
        &mut self,
        ext: &Arc<ExtensionDescriptor>,
        value: Value,
    ) -> Result<()> {
        if ext.field().is_repeated() {
            return self.append_extension(ext, value);
        }
        if let Value::Message(sub) = value {
            let existing = self
                .extensions
                .get_mut(&ext.field().number())
                .filter(|slot| slot.descriptor.full_name() == ext.full_name());
            if let Some(slot) = existing {
                if let FieldValue::Singular(Value::Message(current)) = &mut slot.value {
                    return current.merge_from(sub);
                }
            }
            return self.set_extension(ext, Value::Message(sub));
        }
        self.set_extension(ext, value)
    }

    fn field_descriptor(&self, number: u32) -> Result<&FieldDescriptor> {
        self.descriptor.field(number).ok_or_else(|| Error::FieldNotFound {
            message: self.descriptor.full_name().to_string(),
            number,
        })
    }

    fn check_value(
        descriptor: &MessageDescriptor,
        field: &FieldDescriptor,
        value: &Value,
    ) -> Result<()> {
        if value.matches(field) {
            Ok(())
        } else {
            Err(Error::type_mismatch(
                descriptor.field_path(field),
                field.kind().proto_name(),
                value.kind_name(),
            ))
        }
    }

    fn check_extension(
        &self,
        ext: &ExtensionDescriptor,
        value: &Value,
        repeated: bool,
    ) -> Result<()> {
        let field = ext.field();
        if ext.extendee() != self.descriptor.full_name() {
            return Err(Error::type_mismatch(
                ext.full_name(),
                "extension of this message type",
                "extension of another type",
            ));
        }
        if field.is_repeated() != repeated {
            return Err(Error::type_mismatch(
                ext.full_name(),
                if field.is_repeated() { "repeated" } else { "singular" },
                if repeated { "repeated append" } else { "singular set" },
            ));
        }
        if !value.matches(field) {
            return Err(Error::type_mismatch(
                ext.full_name(),
                field.kind().proto_name(),
                value.kind_name(),
            ));
        }
        Ok(())
    }

    fn extension_slot(&self, ext: &ExtensionDescriptor) -> Option<&FieldValue> {
        self.extensions
            .get(&ext.field().number())
            .filter(|slot| slot.descriptor.full_name() == ext.full_name())
            .map(|slot| &slot.value)
    }
}

/// Borrowed view of a storage slot, shared by the serializers
#[derive(Debug, Clone, Copy)]
pub(crate) enum SlotRef<'a> {
    Singular(&'a Value),
    Repeated(&'a [Value]),
}

impl<'a> From<&'a FieldValue> for SlotRef<'a> {
    fn from(slot: &'a FieldValue) -> Self {
        match slot {
            FieldValue::Singular(value) => SlotRef::Singular(value),
            FieldValue::Repeated(values) => SlotRef::Repeated(values),
        }
    }
}
