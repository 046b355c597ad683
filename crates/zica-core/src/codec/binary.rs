//! Reflection-driven binary serialization.
//!
//! The serializer walks a message's storage in ascending field-number order
//! (deterministic output, convenient for byte-level assertions) and frames
//! each present value per its declared kind; the parser reads tag/value
//! pairs to exhaustion, dispatching on the descriptor. Field numbers the
//! descriptor does not declare are preserved as raw bytes rather than
//! dropped, and both packed and unpacked repeated encodings are accepted
//! regardless of how the field is declared — only the writer follows the
//! declared preference.

use crate::descriptor::{
    DescriptorRegistry, ExtensionDescriptor, FieldDescriptor, FieldKind, MessageDescriptor,
};
use crate::error::{Error, Result};
use crate::message::{DynamicMessage, SlotRef, UnknownField, Value};
use crate::wire::{
    zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64, WireReader, WireType,
    WireWriter,
};
use crate::RECURSION_LIMIT;
use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;

/// Serialize a message to contiguous wire bytes.
///
/// Declared fields and extensions are written interleaved in ascending
/// field-number order; retained unknown fields follow verbatim, in their
/// original encounter order.
pub fn serialize(message: &DynamicMessage) -> Vec<u8> {
    let mut writer = WireWriter::new();
    write_message(&mut writer, message);
    writer.into_bytes()
}

/// Parse wire bytes into a message of the given type.
///
/// Any malformed encoding aborts the whole parse; no partial message is
/// returned.
pub fn parse(
    data: &[u8],
    descriptor: &Arc<MessageDescriptor>,
    registry: &DescriptorRegistry,
) -> Result<DynamicMessage> {
    let mut reader = WireReader::new(data);
    parse_message(&mut reader, descriptor, registry, 0, None)
}

fn write_message(writer: &mut WireWriter, message: &DynamicMessage) {
    let mut slots: Vec<(&FieldDescriptor, SlotRef<'_>)> = message
        .field_slots()
        .chain(message.extension_slots().map(|(ext, slot)| (ext.field(), slot)))
        .collect();
    slots.sort_by_key(|(field, _)| field.number());

    for (field, slot) in slots {
        match slot {
            SlotRef::Singular(value) => write_single(writer, field, value),
            SlotRef::Repeated(values) => write_repeated(writer, field, values),
        }
    }

    for unknown in message.unknown_fields().iter() {
        writer.write_tag(unknown.number, unknown.wire_type);
        writer.write_raw(&unknown.bytes);
    }
}

fn write_repeated(writer: &mut WireWriter, field: &FieldDescriptor, values: &[Value]) {
    if values.is_empty() {
        return;
    }
    if field.is_packed() {
        let mut payload = WireWriter::new();
        for value in values {
            write_scalar_payload(&mut payload, field.kind(), value);
        }
        let payload = payload.into_bytes();
        writer.write_tag(field.number(), WireType::LengthDelimited);
        writer.write_length_delimited(&payload);
    } else {
        for value in values {
            write_single(writer, field, value);
        }
    }
}

fn write_single(writer: &mut WireWriter, field: &FieldDescriptor, value: &Value) {
    let number = field.number();
    match (field.kind(), value) {
        (FieldKind::Group, Value::Message(sub)) => {
            writer.write_tag(number, WireType::StartGroup);
            write_message(writer, sub);
            writer.write_tag(number, WireType::EndGroup);
        }
        (FieldKind::Message, Value::Message(sub)) => {
            let bytes = serialize(sub);
            writer.write_tag(number, WireType::LengthDelimited);
            writer.write_length_delimited(&bytes);
        }
        _ => {
            writer.write_tag(number, field.kind().wire_type());
            write_scalar_payload(writer, field.kind(), value);
        }
    }
}

fn write_scalar_payload(writer: &mut WireWriter, kind: FieldKind, value: &Value) {
    match (kind, value) {
        // int32 negatives sign-extend to ten varint bytes, per the format
        (FieldKind::Int32, Value::I32(v)) => writer.write_varint(*v as i64 as u64),
        (FieldKind::Int64, Value::I64(v)) => writer.write_varint(*v as u64),
        (FieldKind::Uint32, Value::U32(v)) => writer.write_varint(*v as u64),
        (FieldKind::Uint64, Value::U64(v)) => writer.write_varint(*v),
        (FieldKind::Sint32, Value::I32(v)) => writer.write_varint(zigzag_encode32(*v) as u64),
        (FieldKind::Sint64, Value::I64(v)) => writer.write_varint(zigzag_encode64(*v)),
        (FieldKind::Fixed32, Value::U32(v)) => writer.write_fixed32(*v),
        (FieldKind::Fixed64, Value::U64(v)) => writer.write_fixed64(*v),
        (FieldKind::Sfixed32, Value::I32(v)) => writer.write_fixed32(*v as u32),
        (FieldKind::Sfixed64, Value::I64(v)) => writer.write_fixed64(*v as u64),
        (FieldKind::Float, Value::F32(v)) => writer.write_fixed32(v.to_bits()),
        (FieldKind::Double, Value::F64(v)) => writer.write_fixed64(v.to_bits()),
        (FieldKind::Bool, Value::Bool(v)) => writer.write_varint(*v as u64),
        (FieldKind::Enum, Value::EnumNumber(v)) => writer.write_varint(*v as i64 as u64),
        (FieldKind::String, Value::String(s)) => writer.write_length_delimited(s.as_bytes()),
        (FieldKind::Bytes, Value::Bytes(b)) => writer.write_length_delimited(b),
        // The store type-checks every assignment, so kind and value agree
        _ => unreachable!("value shape diverged from declared kind"),
    }
}

fn parse_message(
    reader: &mut WireReader<'_>,
    descriptor: &Arc<MessageDescriptor>,
    registry: &DescriptorRegistry,
    depth: usize,
    group_number: Option<u32>,
) -> Result<DynamicMessage> {
    if depth >= RECURSION_LIMIT {
        return Err(Error::RecursionLimit {
            limit: RECURSION_LIMIT,
        });
    }

    let mut message = DynamicMessage::new(descriptor.clone());

    while reader.has_remaining() {
        let tag_offset = reader.position();
        let (number, wire_type) = reader.read_tag()?;

        if wire_type == WireType::EndGroup {
            return match group_number {
                Some(own) if own == number => Ok(message),
                _ => Err(Error::UnmatchedGroup {
                    number,
                    offset: tag_offset,
                }),
            };
        }

        if let Some(field) = descriptor.field(number) {
            let decoded = decode_field(reader, field, wire_type, tag_offset, registry, depth)?;
            store_field(&mut message, field, decoded)?;
        } else if let Some(ext) = registry.extension_for(descriptor.full_name(), number) {
            let decoded =
                decode_field(reader, ext.field(), wire_type, tag_offset, registry, depth)?;
            store_extension(&mut message, &ext, decoded)?;
        } else {
            let raw = reader.skip_field(number, wire_type)?;
            trace!(
                "retaining unknown field {} ({:?}, {} byte(s)) in {}",
                number,
                wire_type,
                raw.len(),
                descriptor.full_name()
            );
            message.push_unknown(UnknownField {
                number,
                wire_type,
                bytes: Bytes::copy_from_slice(raw),
            });
        }
    }

    match group_number {
        // Input exhausted inside an open group
        Some(number) => Err(Error::UnmatchedGroup {
            number,
            offset: reader.position(),
        }),
        None => Ok(message),
    }
}

/// One decoded occurrence of a field: a single value, or a packed run
enum Decoded {
    One(Value),
    Packed(Vec<Value>),
}

fn decode_field(
    reader: &mut WireReader<'_>,
    field: &FieldDescriptor,
    wire_type: WireType,
    tag_offset: usize,
    registry: &DescriptorRegistry,
    depth: usize,
) -> Result<Decoded> {
    let kind = field.kind();
    match kind {
        FieldKind::Message => {
            if wire_type != WireType::LengthDelimited {
                return Err(Error::invalid_wire_type(tag_offset, wire_type as u8));
            }
            let payload = reader.read_length_delimited()?;
            let sub_descriptor = registry.message_by_name(field.type_name().unwrap_or_default())?;
            let mut sub_reader = WireReader::new(payload);
            let sub = parse_message(&mut sub_reader, &sub_descriptor, registry, depth + 1, None)?;
            Ok(Decoded::One(Value::Message(sub)))
        }
        FieldKind::Group => {
            if wire_type != WireType::StartGroup {
                return Err(Error::invalid_wire_type(tag_offset, wire_type as u8));
            }
            let sub_descriptor = registry.message_by_name(field.type_name().unwrap_or_default())?;
            let sub = parse_message(
                reader,
                &sub_descriptor,
                registry,
                depth + 1,
                Some(field.number()),
            )?;
            Ok(Decoded::One(Value::Message(sub)))
        }
        _ => {
            // Packed runs are accepted for any packable repeated field, even
            // when the field is declared unpacked (wire compatibility rule)
            if field.is_repeated()
                && kind.is_packable()
                && wire_type == WireType::LengthDelimited
                && kind.wire_type() != WireType::LengthDelimited
            {
                let payload = reader.read_length_delimited()?;
                let mut sub_reader = WireReader::new(payload);
                let mut values = Vec::new();
                while sub_reader.has_remaining() {
                    values.push(decode_scalar(&mut sub_reader, kind, field.number())?);
                }
                return Ok(Decoded::Packed(values));
            }

            if wire_type != kind.wire_type() {
                return Err(Error::invalid_wire_type(tag_offset, wire_type as u8));
            }
            Ok(Decoded::One(decode_scalar(reader, kind, field.number())?))
        }
    }
}

fn decode_scalar(reader: &mut WireReader<'_>, kind: FieldKind, number: u32) -> Result<Value> {
    let value = match kind {
        FieldKind::Int32 => Value::I32(reader.read_varint()? as i32),
        FieldKind::Int64 => Value::I64(reader.read_varint()? as i64),
        FieldKind::Uint32 => Value::U32(reader.read_varint()? as u32),
        FieldKind::Uint64 => Value::U64(reader.read_varint()?),
        FieldKind::Sint32 => Value::I32(zigzag_decode32(reader.read_varint()? as u32)),
        FieldKind::Sint64 => Value::I64(zigzag_decode64(reader.read_varint()?)),
        FieldKind::Fixed32 => Value::U32(reader.read_fixed32()?),
        FieldKind::Fixed64 => Value::U64(reader.read_fixed64()?),
        FieldKind::Sfixed32 => Value::I32(reader.read_fixed32()? as i32),
        FieldKind::Sfixed64 => Value::I64(reader.read_fixed64()? as i64),
        FieldKind::Float => Value::F32(f32::from_bits(reader.read_fixed32()?)),
        FieldKind::Double => Value::F64(f64::from_bits(reader.read_fixed64()?)),
        FieldKind::Bool => Value::Bool(reader.read_varint()? != 0),
        FieldKind::Enum => Value::EnumNumber(reader.read_varint()? as i32),
        FieldKind::String => {
            let bytes = reader.read_length_delimited()?;
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::InvalidString { number })?;
            Value::String(text.to_string())
        }
        FieldKind::Bytes => Value::Bytes(Bytes::copy_from_slice(reader.read_length_delimited()?)),
        FieldKind::Message | FieldKind::Group => {
            unreachable!("composite kinds are decoded before scalar dispatch")
        }
    };
    Ok(value)
}

fn store_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    decoded: Decoded,
) -> Result<()> {
    let number = field.number();
    match decoded {
        Decoded::Packed(values) => {
            for value in values {
                message.append_repeated(number, value)?;
            }
        }
        Decoded::One(value) if field.is_repeated() => {
            message.append_repeated(number, value)?;
        }
        // Repeated occurrences of a singular message field merge; scalars
        // overwrite so the last occurrence wins
        Decoded::One(Value::Message(sub)) => message.set_or_merge_message(number, sub)?,
        Decoded::One(value) => message.set_field(number, value)?,
    }
    Ok(())
}

fn store_extension(
    message: &mut DynamicMessage,
    ext: &Arc<ExtensionDescriptor>,
    decoded: Decoded,
) -> Result<()> {
    match decoded {
        Decoded::Packed(values) => {
            for value in values {
                message.append_extension(ext, value)?;
            }
        }
        Decoded::One(value) => message.set_extension_from_wire(ext, value)?,
    }
    Ok(())
}
