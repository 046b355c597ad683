//! Immutable schema metadata and the registry that owns it.
//!
//! Descriptors are built once from a `FileDescriptorSet` (the stable output
//! of an external `.proto` compiler, decoded with `prost`) and shared via
//! [`Arc`] by every message instance and codec afterwards. Nothing in this
//! module is mutable after [`DescriptorRegistry`] construction, which is what
//! makes the metadata safe to share across threads without synchronization.
//!
//! ## Type references
//!
//! Message graphs are frequently cyclic (a tree node message holding repeated
//! children of its own type), so field descriptors refer to their target
//! message or enum by fully-qualified name; the registry resolves the name to
//! the shared descriptor instance. All references are checked eagerly at
//! build time, so a lookup through a built registry cannot fail for a name
//! the schema declared.

use crate::error::{Error, Result};
use crate::message::Value;
use crate::wire::WireType;
use prost::Message as _;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Proto syntax revision a file was declared under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Proto2 syntax (explicit presence, unpacked-by-default repeated fields)
    Proto2,
    /// Proto3 syntax (zero defaults, packed-by-default repeated fields)
    Proto3,
}

impl Syntax {
    fn from_declaration(s: &str) -> Self {
        // An empty declaration is proto2 per descriptor.proto; anything
        // unrecognized gets the conservative reading
        match s {
            "proto3" => Syntax::Proto3,
            _ => Syntax::Proto2,
        }
    }
}

/// Declared type of a field, as written in the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 64-bit IEEE float, fixed64 wire type
    Double,
    /// 32-bit IEEE float, fixed32 wire type
    Float,
    /// Varint-encoded signed 32-bit (negative values take 10 bytes)
    Int32,
    /// Varint-encoded signed 64-bit
    Int64,
    /// Varint-encoded unsigned 32-bit
    Uint32,
    /// Varint-encoded unsigned 64-bit
    Uint64,
    /// Zigzag varint signed 32-bit
    Sint32,
    /// Zigzag varint signed 64-bit
    Sint64,
    /// Little-endian unsigned 32-bit
    Fixed32,
    /// Little-endian unsigned 64-bit
    Fixed64,
    /// Little-endian signed 32-bit
    Sfixed32,
    /// Little-endian signed 64-bit
    Sfixed64,
    /// Single varint byte 0 or 1
    Bool,
    /// Length-delimited UTF-8
    String,
    /// Length-delimited raw bytes
    Bytes,
    /// Length-delimited nested message
    Message,
    /// Nested message with legacy group framing
    Group,
    /// Varint-encoded enum number
    Enum,
}

impl FieldKind {
    /// The wire type values of this kind are framed with
    pub fn wire_type(self) -> WireType {
        match self {
            FieldKind::Double | FieldKind::Fixed64 | FieldKind::Sfixed64 => WireType::Fixed64,
            FieldKind::Float | FieldKind::Fixed32 | FieldKind::Sfixed32 => WireType::Fixed32,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message => {
                WireType::LengthDelimited
            }
            FieldKind::Group => WireType::StartGroup,
            _ => WireType::Varint,
        }
    }

    /// True for kinds eligible for packed repeated encoding
    pub fn is_packable(self) -> bool {
        !matches!(
            self,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message | FieldKind::Group
        )
    }

    /// Schema-language spelling, used in diagnostics
    pub fn proto_name(self) -> &'static str {
        match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Uint32 => "uint32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Sint32 => "sint32",
            FieldKind::Sint64 => "sint64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Message => "message",
            FieldKind::Group => "group",
            FieldKind::Enum => "enum",
        }
    }

    fn from_proto(ty: Type) -> Self {
        match ty {
            Type::Double => FieldKind::Double,
            Type::Float => FieldKind::Float,
            Type::Int32 => FieldKind::Int32,
            Type::Int64 => FieldKind::Int64,
            Type::Uint32 => FieldKind::Uint32,
            Type::Uint64 => FieldKind::Uint64,
            Type::Sint32 => FieldKind::Sint32,
            Type::Sint64 => FieldKind::Sint64,
            Type::Fixed32 => FieldKind::Fixed32,
            Type::Fixed64 => FieldKind::Fixed64,
            Type::Sfixed32 => FieldKind::Sfixed32,
            Type::Sfixed64 => FieldKind::Sfixed64,
            Type::Bool => FieldKind::Bool,
            Type::String => FieldKind::String,
            Type::Bytes => FieldKind::Bytes,
            Type::Message => FieldKind::Message,
            Type::Group => FieldKind::Group,
            Type::Enum => FieldKind::Enum,
        }
    }
}

/// How many values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one value, presence tracked
    Optional,
    /// Exactly one value (legacy proto2 semantics; storage-wise identical
    /// to optional)
    Required,
    /// Ordered sequence of values
    Repeated,
}

/// Immutable metadata for a single declared field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    json_name: String,
    kind: FieldKind,
    cardinality: Cardinality,
    packed: bool,
    type_name: Option<String>,
    default: Option<Value>,
}

impl FieldDescriptor {
    /// Field number, unique within the message
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Declared field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON mapping name (declared `json_name` or the camelCase derivation)
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    /// Declared type kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Declared cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// True for repeated fields
    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    /// True when the writer should emit this repeated field in packed form
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Fully-qualified target type name for message/group/enum fields
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Declared proto2 default value, if any
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn from_proto(
        proto: &FieldDescriptorProto,
        syntax: Syntax,
        enums: &HashMap<String, Arc<EnumDescriptor>>,
    ) -> Result<Self> {
        let kind = FieldKind::from_proto(proto.r#type());
        let cardinality = match proto.label() {
            Label::Optional => Cardinality::Optional,
            Label::Required => Cardinality::Required,
            Label::Repeated => Cardinality::Repeated,
        };

        let number = u32::try_from(proto.number()).map_err(|_| {
            Error::invalid_descriptor(format!(
                "field '{}' has negative number {}",
                proto.name(),
                proto.number()
            ))
        })?;

        let packable = cardinality == Cardinality::Repeated && kind.is_packable();
        let packed = match proto.options.as_ref().and_then(|o| o.packed) {
            Some(explicit) => explicit && packable,
            None => packable && syntax == Syntax::Proto3,
        };

        let type_name = match kind {
            FieldKind::Message | FieldKind::Group | FieldKind::Enum => {
                Some(strip_leading_dot(proto.type_name()).to_string())
            }
            _ => None,
        };

        let json_name = match proto.json_name.as_deref() {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => to_lower_camel_case(proto.name()),
        };

        let default = match proto.default_value.as_deref() {
            Some(raw) => Some(parse_default(proto.name(), kind, raw, type_name.as_deref(), enums)?),
            // proto2 enum fields default to the first declared value
            None if kind == FieldKind::Enum && syntax == Syntax::Proto2 => type_name
                .as_deref()
                .and_then(|n| enums.get(n))
                .map(|e| Value::EnumNumber(e.default_number())),
            None => None,
        };

        Ok(Self {
            number,
            name: proto.name().to_string(),
            json_name,
            kind,
            cardinality,
            packed,
            type_name,
            default,
        })
    }
}

/// Immutable metadata for a message type
#[derive(Debug)]
pub struct MessageDescriptor {
    full_name: String,
    syntax: Syntax,
    fields: BTreeMap<u32, FieldDescriptor>,
    by_name: HashMap<String, u32>,
    by_json_name: HashMap<String, u32>,
    map_entry: bool,
    extension_ranges: Vec<(u32, u32)>,
}

impl MessageDescriptor {
    /// Fully-qualified type name, without a leading dot
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Syntax of the file this message was declared in
    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Field lookup by number
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.get(&number)
    }

    /// Field lookup by declared name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).and_then(|n| self.fields.get(n))
    }

    /// Field lookup by JSON mapping name
    pub fn field_by_json_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_json_name.get(name).and_then(|n| self.fields.get(n))
    }

    /// Fields in ascending number order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// True for the synthetic key/value entry type backing a map field
    pub fn is_map_entry(&self) -> bool {
        self.map_entry
    }

    /// Key and value fields of a map-entry type (numbers 1 and 2)
    pub fn map_entry_fields(&self) -> Option<(&FieldDescriptor, &FieldDescriptor)> {
        if !self.map_entry {
            return None;
        }
        Some((self.fields.get(&1)?, self.fields.get(&2)?))
    }

    /// True when `number` falls inside a declared extension range
    pub fn accepts_extension(&self, number: u32) -> bool {
        self.extension_ranges
            .iter()
            .any(|&(start, end)| number >= start && number < end)
    }

    /// Qualified `Message.field` spelling for diagnostics
    pub fn field_path(&self, field: &FieldDescriptor) -> String {
        format!("{}.{}", self.full_name, field.name())
    }

    fn from_proto(
        proto: &DescriptorProto,
        full_name: String,
        syntax: Syntax,
        enums: &HashMap<String, Arc<EnumDescriptor>>,
    ) -> Result<Self> {
        let mut fields = BTreeMap::new();
        let mut by_name = HashMap::new();
        let mut by_json_name = HashMap::new();

        for field_proto in &proto.field {
            let field = FieldDescriptor::from_proto(field_proto, syntax, enums)?;
            by_name.insert(field.name.clone(), field.number);
            by_json_name.insert(field.json_name.clone(), field.number);
            if fields.insert(field.number, field).is_some() {
                return Err(Error::invalid_descriptor(format!(
                    "message '{}' declares field number {} twice",
                    full_name,
                    field_proto.number()
                )));
            }
        }

        let extension_ranges = proto
            .extension_range
            .iter()
            .map(|r| (r.start() as u32, r.end() as u32))
            .collect();

        Ok(Self {
            full_name,
            syntax,
            fields,
            by_name,
            by_json_name,
            map_entry: proto
                .options
                .as_ref()
                .map_or(false, |o| o.map_entry.unwrap_or(false)),
            extension_ranges,
        })
    }
}

/// Immutable metadata for an enum type.
///
/// Numbers may be aliased to several names; the first declaration wins for
/// number-to-name mapping, matching descriptor order.
#[derive(Debug)]
pub struct EnumDescriptor {
    full_name: String,
    by_number: BTreeMap<i32, String>,
    by_name: HashMap<String, i32>,
    default_number: i32,
}

impl EnumDescriptor {
    /// Fully-qualified type name, without a leading dot
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Symbolic name for a number, if declared
    pub fn name(&self, number: i32) -> Option<&str> {
        self.by_number.get(&number).map(String::as_str)
    }

    /// Number for a symbolic name, if declared
    pub fn number(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// Number of the first declared value (the proto2 default)
    pub fn default_number(&self) -> i32 {
        self.default_number
    }

    fn from_proto(proto: &EnumDescriptorProto, full_name: String) -> Result<Self> {
        if proto.value.is_empty() {
            return Err(Error::invalid_descriptor(format!(
                "enum '{}' declares no values",
                full_name
            )));
        }

        let mut by_number = BTreeMap::new();
        let mut by_name = HashMap::new();
        for value in &proto.value {
            by_number
                .entry(value.number())
                .or_insert_with(|| value.name().to_string());
            by_name.insert(value.name().to_string(), value.number());
        }

        Ok(Self {
            full_name,
            by_number,
            by_name,
            default_number: proto.value[0].number(),
        })
    }
}

/// An extension field: a [`FieldDescriptor`] injected into another message's
/// number space.
///
/// Extensions are identified by their own fully-qualified name, not by the
/// `(extendee, number)` pair alone; two files may legitimately declare
/// different extensions over the same number.
#[derive(Debug)]
pub struct ExtensionDescriptor {
    full_name: String,
    extendee: String,
    field: FieldDescriptor,
}

impl ExtensionDescriptor {
    /// Fully-qualified name of the extension itself (its global identity)
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Fully-qualified name of the message being extended
    pub fn extendee(&self) -> &str {
        &self.extendee
    }

    /// The field metadata this extension contributes
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }
}

/// Process-wide descriptor pool with init-once semantics.
///
/// Built from a complete `FileDescriptorSet` and immutable afterwards; the
/// registry is an explicit value to be passed where needed rather than a
/// hidden global.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    messages: HashMap<String, Arc<MessageDescriptor>>,
    enums: HashMap<String, Arc<EnumDescriptor>>,
    extensions: HashMap<(String, u32), Arc<ExtensionDescriptor>>,
}

impl DescriptorRegistry {
    /// Build a registry from encoded `FileDescriptorSet` bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let fds = FileDescriptorSet::decode(data)?;
        Self::from_file_descriptor_set(&fds)
    }

    /// Build a registry from a decoded `FileDescriptorSet`.
    ///
    /// All type-name references (field targets, extension extendees) are
    /// resolved eagerly; an unresolved or duplicate name fails construction.
    pub fn from_file_descriptor_set(fds: &FileDescriptorSet) -> Result<Self> {
        let mut registry = Self::default();

        // Enums first: proto2 enum defaults on fields resolve against them
        for file in &fds.file {
            registry.collect_enums(file)?;
        }
        for file in &fds.file {
            registry.collect_messages(file)?;
        }
        for file in &fds.file {
            registry.collect_extensions(file)?;
        }

        registry.validate_references()?;

        debug!(
            "descriptor registry built: {} message(s), {} enum(s), {} extension(s)",
            registry.messages.len(),
            registry.enums.len(),
            registry.extensions.len()
        );

        Ok(registry)
    }

    /// Shared message descriptor for a fully-qualified name.
    ///
    /// A leading dot (descriptor-proto reference spelling) is accepted.
    pub fn message_by_name(&self, name: &str) -> Result<Arc<MessageDescriptor>> {
        self.messages
            .get(strip_leading_dot(name))
            .cloned()
            .ok_or_else(|| Error::type_not_found(strip_leading_dot(name)))
    }

    /// Shared enum descriptor for a fully-qualified name
    pub fn enum_by_name(&self, name: &str) -> Result<Arc<EnumDescriptor>> {
        self.enums
            .get(strip_leading_dot(name))
            .cloned()
            .ok_or_else(|| Error::type_not_found(strip_leading_dot(name)))
    }

    /// Extension registered against `extendee` for `number`, if any
    pub fn extension_for(&self, extendee: &str, number: u32) -> Option<Arc<ExtensionDescriptor>> {
        self.extensions
            .get(&(strip_leading_dot(extendee).to_string(), number))
            .cloned()
    }

    /// Extension lookup by its own fully-qualified name
    pub fn extension_by_name(&self, full_name: &str) -> Option<Arc<ExtensionDescriptor>> {
        let wanted = strip_leading_dot(full_name);
        self.extensions
            .values()
            .find(|ext| ext.full_name == wanted)
            .cloned()
    }

    /// Number of registered message types
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of registered enum types
    pub fn enum_count(&self) -> usize {
        self.enums.len()
    }

    fn collect_enums(&mut self, file: &FileDescriptorProto) -> Result<()> {
        let package = file.package();
        for enum_proto in &file.enum_type {
            self.add_enum(enum_proto, qualify(package, enum_proto.name()))?;
        }
        for message in &file.message_type {
            self.collect_nested_enums(message, qualify(package, message.name()))?;
        }
        Ok(())
    }

    fn collect_nested_enums(&mut self, message: &DescriptorProto, prefix: String) -> Result<()> {
        for enum_proto in &message.enum_type {
            self.add_enum(enum_proto, qualify(&prefix, enum_proto.name()))?;
        }
        for nested in &message.nested_type {
            self.collect_nested_enums(nested, qualify(&prefix, nested.name()))?;
        }
        Ok(())
    }

    fn add_enum(&mut self, proto: &EnumDescriptorProto, full_name: String) -> Result<()> {
        let descriptor = EnumDescriptor::from_proto(proto, full_name.clone())?;
        if self
            .enums
            .insert(full_name.clone(), Arc::new(descriptor))
            .is_some()
        {
            return Err(Error::DuplicateType { name: full_name });
        }
        Ok(())
    }

    fn collect_messages(&mut self, file: &FileDescriptorProto) -> Result<()> {
        let syntax = Syntax::from_declaration(file.syntax());
        let package = file.package();
        for message in &file.message_type {
            self.add_message(message, qualify(package, message.name()), syntax)?;
        }
        Ok(())
    }

    fn add_message(
        &mut self,
        proto: &DescriptorProto,
        full_name: String,
        syntax: Syntax,
    ) -> Result<()> {
        let descriptor =
            MessageDescriptor::from_proto(proto, full_name.clone(), syntax, &self.enums)?;
        if self
            .messages
            .insert(full_name.clone(), Arc::new(descriptor))
            .is_some()
        {
            return Err(Error::DuplicateType { name: full_name });
        }
        for nested in &proto.nested_type {
            self.add_message(nested, qualify(&full_name, nested.name()), syntax)?;
        }
        Ok(())
    }

    fn collect_extensions(&mut self, file: &FileDescriptorProto) -> Result<()> {
        let syntax = Syntax::from_declaration(file.syntax());
        let package = file.package();
        for ext in &file.extension {
            self.add_extension(ext, package, syntax)?;
        }
        for message in &file.message_type {
            self.collect_nested_extensions(message, &qualify(package, message.name()), syntax)?;
        }
        Ok(())
    }

    fn collect_nested_extensions(
        &mut self,
        message: &DescriptorProto,
        prefix: &str,
        syntax: Syntax,
    ) -> Result<()> {
        for ext in &message.extension {
            self.add_extension(ext, prefix, syntax)?;
        }
        for nested in &message.nested_type {
            self.collect_nested_extensions(nested, &qualify(prefix, nested.name()), syntax)?;
        }
        Ok(())
    }

    fn add_extension(
        &mut self,
        proto: &FieldDescriptorProto,
        scope: &str,
        syntax: Syntax,
    ) -> Result<()> {
        let field = FieldDescriptor::from_proto(proto, syntax, &self.enums)?;
        let extendee = strip_leading_dot(proto.extendee()).to_string();
        let full_name = qualify(scope, proto.name());
        let number = field.number;

        let target = self
            .messages
            .get(&extendee)
            .ok_or_else(|| Error::type_not_found(extendee.clone()))?;
        if !target.accepts_extension(number) {
            return Err(Error::ExtensionOutOfRange {
                extension: full_name,
                extendee,
                number,
            });
        }

        self.extensions.insert(
            (extendee.clone(), number),
            Arc::new(ExtensionDescriptor {
                full_name,
                extendee,
                field,
            }),
        );
        Ok(())
    }

    /// Every message/group/enum field target must name a registered type
    fn validate_references(&self) -> Result<()> {
        let field_targets = self
            .messages
            .values()
            .flat_map(|m| m.fields())
            .chain(self.extensions.values().map(|e| e.field()));

        for field in field_targets {
            let Some(target) = field.type_name() else {
                continue;
            };
            let resolved = match field.kind() {
                FieldKind::Enum => self.enums.contains_key(target),
                _ => self.messages.contains_key(target),
            };
            if !resolved {
                return Err(Error::type_not_found(target));
            }
        }
        Ok(())
    }
}

/// Join a scope and a simple name into a fully-qualified name
fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn strip_leading_dot(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

/// Convert a snake_case name to lowerCamelCase
fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Parse a proto2 `default_value` declaration into a runtime value
fn parse_default(
    field_name: &str,
    kind: FieldKind,
    raw: &str,
    type_name: Option<&str>,
    enums: &HashMap<String, Arc<EnumDescriptor>>,
) -> Result<Value> {
    let bad = || {
        Error::invalid_descriptor(format!(
            "field '{}' has invalid default '{}'",
            field_name, raw
        ))
    };

    let value = match kind {
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            Value::I32(raw.parse().map_err(|_| bad())?)
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            Value::I64(raw.parse().map_err(|_| bad())?)
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => Value::U32(raw.parse().map_err(|_| bad())?),
        FieldKind::Uint64 | FieldKind::Fixed64 => Value::U64(raw.parse().map_err(|_| bad())?),
        FieldKind::Float => Value::F32(parse_float(raw).map_err(|_| bad())? as f32),
        FieldKind::Double => Value::F64(parse_float(raw).map_err(|_| bad())?),
        FieldKind::Bool => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad()),
        },
        FieldKind::String => Value::String(raw.to_string()),
        FieldKind::Bytes => Value::Bytes(unescape_bytes(raw).ok_or_else(bad)?.into()),
        FieldKind::Enum => {
            let enum_name = type_name.ok_or_else(bad)?;
            let descriptor = enums
                .get(enum_name)
                .ok_or_else(|| Error::type_not_found(enum_name))?;
            let number = descriptor.number(raw).ok_or_else(|| Error::UnknownEnumName {
                enum_name: enum_name.to_string(),
                name: raw.to_string(),
            })?;
            Value::EnumNumber(number)
        }
        FieldKind::Message | FieldKind::Group => return Err(bad()),
    };
    Ok(value)
}

fn parse_float(raw: &str) -> std::result::Result<f64, std::num::ParseFloatError> {
    match raw {
        "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        "nan" => Ok(f64::NAN),
        _ => raw.parse(),
    }
}

/// Undo proto text-format escaping in a bytes default
fn unescape_bytes(raw: &str) -> Option<Vec<u8>> {
    let mut result = Vec::with_capacity(raw.len());
    let mut chars = raw.bytes().peekable();

    while let Some(byte) = chars.next() {
        if byte != b'\\' {
            result.push(byte);
            continue;
        }
        match chars.next()? {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'\\' => result.push(b'\\'),
            b'\'' => result.push(b'\''),
            b'"' => result.push(b'"'),
            b'x' => {
                let hi = (chars.next()? as char).to_digit(16)?;
                let lo = (chars.next()? as char).to_digit(16)?;
                result.push((hi * 16 + lo) as u8);
            }
            digit @ b'0'..=b'7' => {
                let mut value = (digit - b'0') as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            chars.next();
                        }
                        _ => break,
                    }
                }
                result.push(u8::try_from(value).ok()?);
            }
            _ => return None,
        }
    }
    Some(result)
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_lookup() {
        let registry = test_registry();
        let outer = registry.message_by_name("test.Outer").unwrap();
        assert_eq!(outer.full_name(), "test.Outer");
        assert_eq!(outer.syntax(), Syntax::Proto3);

        // Leading-dot references resolve too
        assert!(registry.message_by_name(".test.Inner").is_ok());
        assert!(registry.message_by_name("test.Missing").is_err());
    }

    #[test]
    fn test_field_lookup_by_number_and_name() {
        let registry = test_registry();
        let outer = registry.message_by_name("test.Outer").unwrap();

        let id = outer.field(1).unwrap();
        assert_eq!(id.name(), "id");
        assert_eq!(id.kind(), FieldKind::Int32);
        assert!(!id.is_repeated());

        let scores = outer.field_by_name("scores").unwrap();
        assert_eq!(scores.number(), 3);
        assert!(scores.is_repeated());
        // proto3 repeated scalar defaults to packed
        assert!(scores.is_packed());

        assert!(outer.field(99).is_none());
    }

    #[test]
    fn test_json_name_derivation() {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("n.proto".to_string()),
                package: Some("n".to_string()),
                syntax: Some("proto3".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("M".to_string()),
                    field: vec![field("my_field_name", 1, Type::Int32, Label::Optional)],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let registry = DescriptorRegistry::from_file_descriptor_set(&fds).unwrap();
        let m = registry.message_by_name("n.M").unwrap();
        let f = m.field_by_json_name("myFieldName").unwrap();
        assert_eq!(f.number(), 1);
        assert_eq!(m.field_by_name("my_field_name").unwrap().number(), 1);
    }

    #[test]
    fn test_enum_lookup_both_directions() {
        let registry = test_registry();
        let mood = registry.enum_by_name("test.Mood").unwrap();
        assert_eq!(mood.name(1), Some("MOOD_HAPPY"));
        assert_eq!(mood.number("MOOD_GRIM"), Some(2));
        assert_eq!(mood.name(42), None);
        assert_eq!(mood.number("MOOD_ABSENT"), None);
        assert_eq!(mood.default_number(), 0);
    }

    #[test]
    fn test_enum_alias_first_name_wins() {
        let proto = EnumDescriptorProto {
            name: Some("Aliased".to_string()),
            value: vec![
                enum_value("FIRST", 0),
                enum_value("ALSO_FIRST", 0),
                enum_value("SECOND", 1),
            ],
            ..Default::default()
        };
        let descriptor = EnumDescriptor::from_proto(&proto, "Aliased".to_string()).unwrap();
        assert_eq!(descriptor.name(0), Some("FIRST"));
        assert_eq!(descriptor.number("ALSO_FIRST"), Some(0));
    }

    #[test]
    fn test_map_entry_flag() {
        let registry = test_registry();
        let entry = registry
            .message_by_name("test.Outer.CountsEntry")
            .unwrap();
        assert!(entry.is_map_entry());
        let (key, value) = entry.map_entry_fields().unwrap();
        assert_eq!(key.kind(), FieldKind::String);
        assert_eq!(value.kind(), FieldKind::Int32);

        let outer = registry.message_by_name("test.Outer").unwrap();
        assert!(!outer.is_map_entry());
    }

    #[test]
    fn test_unresolved_type_reference_fails() {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("broken.proto".to_string()),
                package: Some("b".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("M".to_string()),
                    field: vec![message_field("other", 1, "b.Nowhere", Label::Optional)],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        assert!(matches!(
            DescriptorRegistry::from_file_descriptor_set(&fds),
            Err(Error::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_number_fails() {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("dup.proto".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("M".to_string()),
                    field: vec![
                        field("a", 1, Type::Int32, Label::Optional),
                        field("b", 1, Type::String, Label::Optional),
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        assert!(DescriptorRegistry::from_file_descriptor_set(&fds).is_err());
    }

    #[test]
    fn test_proto2_defaults() {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("legacy.proto".to_string()),
                package: Some("legacy".to_string()),
                syntax: Some("proto2".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("Old".to_string()),
                    field: vec![
                        FieldDescriptorProto {
                            default_value: Some("41".to_string()),
                            ..field("answer", 1, Type::Int32, Label::Optional)
                        },
                        FieldDescriptorProto {
                            default_value: Some("lights on".to_string()),
                            ..field("motto", 2, Type::String, Label::Optional)
                        },
                        FieldDescriptorProto {
                            default_value: Some("a\\n\\x00b".to_string()),
                            ..field("blob", 3, Type::Bytes, Label::Optional)
                        },
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let registry = DescriptorRegistry::from_file_descriptor_set(&fds).unwrap();
        let old = registry.message_by_name("legacy.Old").unwrap();

        assert_eq!(old.field(1).unwrap().default_value(), Some(&Value::I32(41)));
        assert_eq!(
            old.field(2).unwrap().default_value(),
            Some(&Value::String("lights on".to_string()))
        );
        assert_eq!(
            old.field(3).unwrap().default_value(),
            Some(&Value::Bytes(vec![b'a', b'\n', 0, b'b'].into()))
        );
    }

    #[test]
    fn test_unescape_bytes() {
        assert_eq!(unescape_bytes("plain").unwrap(), b"plain");
        assert_eq!(unescape_bytes("a\\tb").unwrap(), b"a\tb");
        assert_eq!(unescape_bytes("\\x41\\102").unwrap(), b"AB");
        assert!(unescape_bytes("bad\\q").is_none());
    }

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("hello_world"), "helloWorld");
        assert_eq!(to_lower_camel_case("my_field_name"), "myFieldName");
        assert_eq!(to_lower_camel_case("simple"), "simple");
    }

    #[test]
    fn test_field_kind_wire_types() {
        assert_eq!(FieldKind::Int32.wire_type(), WireType::Varint);
        assert_eq!(FieldKind::Double.wire_type(), WireType::Fixed64);
        assert_eq!(FieldKind::Float.wire_type(), WireType::Fixed32);
        assert_eq!(FieldKind::String.wire_type(), WireType::LengthDelimited);
        assert_eq!(FieldKind::Group.wire_type(), WireType::StartGroup);
        assert!(FieldKind::Enum.is_packable());
        assert!(!FieldKind::Bytes.is_packable());
    }
}
