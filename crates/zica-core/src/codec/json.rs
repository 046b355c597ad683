//! JSON mapping per the standard protobuf JSON rules.
//!
//! Printing maps each present field to its declared or camelCase JSON name,
//! omits proto3 default values unless asked otherwise, renders 64-bit
//! integers as quoted decimal strings (JSON number precision is 53 bits),
//! bytes as standard base64, enums as symbolic names, and map fields as
//! objects. Unknown binary fields are never emitted.
//!
//! Parsing accepts both the JSON name and the original field name, 64-bit
//! values as numbers or strings, enums by name or number, and treats `null`
//! as absence. Unrecognized keys fail the parse unless the
//! "ignore unknown fields" option is set, in which case they are silently
//! discarded (not preserved, unlike unknown binary fields).

use crate::descriptor::{DescriptorRegistry, FieldDescriptor, FieldKind, MessageDescriptor};
use crate::error::{Error, Result};
use crate::message::{DynamicMessage, Value};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use bytes::Bytes;
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Options controlling the JSON mapping
#[derive(Debug, Clone, Default)]
pub struct JsonOptions {
    /// Print fields holding their default value instead of omitting them
    pub emit_default_values: bool,
    /// Silently discard JSON keys that match no declared field
    pub ignore_unknown_fields: bool,
}

impl JsonOptions {
    /// Creates options with the standard behavior: defaults omitted,
    /// unknown keys rejected
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether default values are printed explicitly
    pub fn emit_default_values(mut self, emit: bool) -> Self {
        self.emit_default_values = emit;
        self
    }

    /// Sets whether unrecognized JSON keys are ignored on parse
    pub fn ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }
}

/// Render a message as compact JSON text
pub fn to_json(
    message: &DynamicMessage,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<String> {
    let value = message_to_value(message, registry, options)?;
    Ok(serde_json::to_string(&value)?)
}

/// Render a message as human-readable indented JSON text
pub fn to_json_pretty(
    message: &DynamicMessage,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<String> {
    let value = message_to_value(message, registry, options)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Parse JSON text into a message of the given type
pub fn from_json(
    text: &str,
    descriptor: &Arc<MessageDescriptor>,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<DynamicMessage> {
    let value: JsonValue = serde_json::from_str(text)?;
    value_to_message(&value, descriptor, registry, options)
}

fn message_to_value(
    message: &DynamicMessage,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<JsonValue> {
    let mut map = Map::new();
    let descriptor = message.descriptor();

    for field in descriptor.fields() {
        let number = field.number();
        let key = field.json_name().to_string();

        if field.is_repeated() {
            let values = message.get_repeated(number);
            if values.is_empty() && !options.emit_default_values {
                continue;
            }
            if let Some(entry_descriptor) = map_entry_descriptor(field, registry) {
                map.insert(
                    key,
                    map_field_to_value(&entry_descriptor, values, registry, options)?,
                );
            } else {
                let items = values
                    .iter()
                    .map(|value| single_to_value(field, value, registry, options))
                    .collect::<Result<Vec<_>>>()?;
                map.insert(key, JsonValue::Array(items));
            }
            continue;
        }

        match field.kind() {
            // Message fields have no default: present means emitted, even
            // when empty
            FieldKind::Message | FieldKind::Group => {
                if let Some(Value::Message(sub)) = message.get_field(number) {
                    map.insert(key, message_to_value(sub, registry, options)?);
                }
            }
            _ => {
                let value = match message.get_field(number) {
                    Some(present) => present.clone(),
                    None => match Value::default_for(field) {
                        Some(default) if options.emit_default_values => default,
                        _ => continue,
                    },
                };
                if !options.emit_default_values
                    && Value::default_for(field).as_ref() == Some(&value)
                {
                    continue;
                }
                map.insert(key, single_to_value(field, &value, registry, options)?);
            }
        }
    }

    Ok(JsonValue::Object(map))
}

fn single_to_value(
    field: &FieldDescriptor,
    value: &Value,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<JsonValue> {
    let rendered = match value {
        Value::Message(sub) => return message_to_value(sub, registry, options),
        Value::I32(v) => JsonValue::Number(Number::from(*v)),
        Value::U32(v) => JsonValue::Number(Number::from(*v)),
        // 64-bit integers as quoted decimal strings
        Value::I64(v) => JsonValue::String(v.to_string()),
        Value::U64(v) => JsonValue::String(v.to_string()),
        Value::F32(v) => float_to_value(f64::from(*v), field)?,
        Value::F64(v) => float_to_value(*v, field)?,
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::String(v) => JsonValue::String(v.clone()),
        Value::Bytes(v) => JsonValue::String(STANDARD.encode(v)),
        Value::EnumNumber(number) => {
            let enum_descriptor = registry.enum_by_name(field.type_name().unwrap_or_default())?;
            match enum_descriptor.name(*number) {
                Some(name) => JsonValue::String(name.to_string()),
                // Unrecognized numbers print numerically and survive the trip
                None => JsonValue::Number(Number::from(*number)),
            }
        }
    };
    Ok(rendered)
}

fn float_to_value(value: f64, field: &FieldDescriptor) -> Result<JsonValue> {
    if value.is_nan() {
        return Ok(JsonValue::String("NaN".to_string()));
    }
    if value.is_infinite() {
        let spelled = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return Ok(JsonValue::String(spelled.to_string()));
    }
    Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or_else(|| Error::json_value(field.name(), "finite number"))
}

fn map_entry_descriptor(
    field: &FieldDescriptor,
    registry: &DescriptorRegistry,
) -> Option<Arc<MessageDescriptor>> {
    if field.kind() != FieldKind::Message {
        return None;
    }
    let descriptor = registry.message_by_name(field.type_name()?).ok()?;
    descriptor.is_map_entry().then_some(descriptor)
}

fn map_field_to_value(
    entry_descriptor: &Arc<MessageDescriptor>,
    entries: &[Value],
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<JsonValue> {
    let (key_field, value_field) = entry_descriptor
        .map_entry_fields()
        .ok_or_else(|| Error::invalid_descriptor("map entry lacks key/value fields"))?;

    let mut map = Map::new();
    for entry in entries {
        let Value::Message(entry) = entry else {
            continue;
        };
        let key = match entry.get_field_or_default(key_field.number()) {
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::I32(v)) => v.to_string(),
            Some(Value::I64(v)) => v.to_string(),
            Some(Value::U32(v)) => v.to_string(),
            Some(Value::U64(v)) => v.to_string(),
            Some(Value::String(s)) => s,
            _ => {
                return Err(Error::json_value(
                    entry_descriptor.full_name(),
                    "integer, bool or string map key",
                ))
            }
        };
        let rendered = match entry.get_field(value_field.number()) {
            Some(value) => single_to_value(value_field, value, registry, options)?,
            // Absent message value prints as an empty object, absent scalar
            // as its default
            None => match value_field.kind() {
                FieldKind::Message | FieldKind::Group => JsonValue::Object(Map::new()),
                _ => match Value::default_for(value_field) {
                    Some(default) => single_to_value(value_field, &default, registry, options)?,
                    None => JsonValue::Null,
                },
            },
        };
        map.insert(key, rendered);
    }
    Ok(JsonValue::Object(map))
}

fn value_to_message(
    value: &JsonValue,
    descriptor: &Arc<MessageDescriptor>,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<DynamicMessage> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::json_value(descriptor.full_name(), "object"))?;

    let mut message = DynamicMessage::new(descriptor.clone());
    let mut claimed: HashSet<&str> = HashSet::new();

    for field in descriptor.fields() {
        // Original field name wins when both spellings are present; the
        // JSON-name key still counts as consumed in that case
        let by_name = object.get_key_value(field.name());
        let by_json = if field.json_name() != field.name() {
            object.get_key_value(field.json_name())
        } else {
            None
        };
        let (key, incoming) = match (by_name, by_json) {
            (Some((key, value)), shadowed) => {
                if let Some((shadowed_key, _)) = shadowed {
                    claimed.insert(shadowed_key.as_str());
                }
                (key, value)
            }
            (None, Some((key, value))) => (key, value),
            (None, None) => continue,
        };
        claimed.insert(key.as_str());

        // null reads as absence, the field keeps its default
        if incoming.is_null() {
            continue;
        }
        set_field_from_json(&mut message, field, incoming, registry, options)?;
    }

    for key in object.keys() {
        if claimed.contains(key.as_str()) {
            continue;
        }
        if options.ignore_unknown_fields {
            debug!(
                "discarding unknown JSON key '{}' for {}",
                key,
                descriptor.full_name()
            );
        } else {
            return Err(Error::unknown_json_field(descriptor.full_name(), key));
        }
    }

    Ok(message)
}

fn set_field_from_json(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    incoming: &JsonValue,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<()> {
    let number = field.number();

    if let Some(entry_descriptor) = map_entry_descriptor(field, registry) {
        let object = incoming
            .as_object()
            .ok_or_else(|| Error::json_value(field.name(), "object"))?;
        let (key_field, value_field) = entry_descriptor
            .map_entry_fields()
            .ok_or_else(|| Error::invalid_descriptor("map entry lacks key/value fields"))?;
        for (key, value) in object {
            let mut entry = DynamicMessage::new(entry_descriptor.clone());
            entry.set_field(key_field.number(), map_key_from_string(key_field, key)?)?;
            entry.set_field(
                value_field.number(),
                json_to_single(value_field, value, registry, options)?,
            )?;
            message.append_repeated(number, Value::Message(entry))?;
        }
        return Ok(());
    }

    if field.is_repeated() {
        let items = incoming
            .as_array()
            .ok_or_else(|| Error::json_value(field.name(), "array"))?;
        for item in items {
            message.append_repeated(number, json_to_single(field, item, registry, options)?)?;
        }
        return Ok(());
    }

    message.set_field(number, json_to_single(field, incoming, registry, options)?)
}

fn json_to_single(
    field: &FieldDescriptor,
    incoming: &JsonValue,
    registry: &DescriptorRegistry,
    options: &JsonOptions,
) -> Result<Value> {
    let field_name = field.name();
    let value = match field.kind() {
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            let wide = json_to_i64(incoming, field_name)?;
            Value::I32(
                i32::try_from(wide).map_err(|_| Error::json_value(field_name, "32-bit integer"))?,
            )
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            Value::I64(json_to_i64(incoming, field_name)?)
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => {
            let wide = json_to_u64(incoming, field_name)?;
            Value::U32(
                u32::try_from(wide)
                    .map_err(|_| Error::json_value(field_name, "32-bit unsigned integer"))?,
            )
        }
        FieldKind::Uint64 | FieldKind::Fixed64 => Value::U64(json_to_u64(incoming, field_name)?),
        FieldKind::Float => Value::F32(json_to_f64(incoming, field_name)? as f32),
        FieldKind::Double => Value::F64(json_to_f64(incoming, field_name)?),
        FieldKind::Bool => Value::Bool(
            incoming
                .as_bool()
                .ok_or_else(|| Error::json_value(field_name, "boolean"))?,
        ),
        FieldKind::String => Value::String(
            incoming
                .as_str()
                .ok_or_else(|| Error::json_value(field_name, "string"))?
                .to_string(),
        ),
        FieldKind::Bytes => {
            let text = incoming
                .as_str()
                .ok_or_else(|| Error::json_value(field_name, "base64 string"))?;
            let decoded = STANDARD
                .decode(text)
                .or_else(|_| URL_SAFE.decode(text))
                .map_err(|_| Error::json_value(field_name, "base64 string"))?;
            Value::Bytes(Bytes::from(decoded))
        }
        FieldKind::Enum => {
            let enum_descriptor = registry.enum_by_name(field.type_name().unwrap_or_default())?;
            match incoming {
                JsonValue::String(name) => {
                    let number = enum_descriptor.number(name).ok_or_else(|| {
                        Error::UnknownEnumName {
                            enum_name: enum_descriptor.full_name().to_string(),
                            name: name.clone(),
                        }
                    })?;
                    Value::EnumNumber(number)
                }
                JsonValue::Number(_) => {
                    let wide = json_to_i64(incoming, field_name)?;
                    Value::EnumNumber(
                        i32::try_from(wide)
                            .map_err(|_| Error::json_value(field_name, "32-bit enum number"))?,
                    )
                }
                _ => return Err(Error::json_value(field_name, "enum name or number")),
            }
        }
        FieldKind::Message | FieldKind::Group => {
            let sub_descriptor = registry.message_by_name(field.type_name().unwrap_or_default())?;
            Value::Message(value_to_message(incoming, &sub_descriptor, registry, options)?)
        }
    };
    Ok(value)
}

fn json_to_i64(incoming: &JsonValue, field_name: &str) -> Result<i64> {
    match incoming {
        JsonValue::Number(number) => number
            .as_i64()
            .ok_or_else(|| Error::json_value(field_name, "integer")),
        JsonValue::String(text) => text
            .parse()
            .map_err(|_| Error::json_value(field_name, "decimal string")),
        _ => Err(Error::json_value(field_name, "integer")),
    }
}

fn json_to_u64(incoming: &JsonValue, field_name: &str) -> Result<u64> {
    match incoming {
        JsonValue::Number(number) => number
            .as_u64()
            .ok_or_else(|| Error::json_value(field_name, "unsigned integer")),
        JsonValue::String(text) => text
            .parse()
            .map_err(|_| Error::json_value(field_name, "decimal string")),
        _ => Err(Error::json_value(field_name, "unsigned integer")),
    }
}

fn json_to_f64(incoming: &JsonValue, field_name: &str) -> Result<f64> {
    match incoming {
        JsonValue::Number(number) => number
            .as_f64()
            .ok_or_else(|| Error::json_value(field_name, "number")),
        JsonValue::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse()
                .map_err(|_| Error::json_value(field_name, "numeric string")),
        },
        _ => Err(Error::json_value(field_name, "number")),
    }
}

fn map_key_from_string(key_field: &FieldDescriptor, key: &str) -> Result<Value> {
    let bad = || Error::json_value(key_field.name(), "map key");
    let value = match key_field.kind() {
        FieldKind::String => Value::String(key.to_string()),
        FieldKind::Bool => match key {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad()),
        },
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            Value::I32(key.parse().map_err(|_| bad())?)
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            Value::I64(key.parse().map_err(|_| bad())?)
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => Value::U32(key.parse().map_err(|_| bad())?),
        FieldKind::Uint64 | FieldKind::Fixed64 => Value::U64(key.parse().map_err(|_| bad())?),
        _ => return Err(bad()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::testutil::{field, test_registry};
    use pretty_assertions::assert_eq;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, FileDescriptorProto, FileDescriptorSet};
    use serde_json::json;

    fn outer(registry: &DescriptorRegistry) -> Arc<MessageDescriptor> {
        registry.message_by_name("test.Outer").unwrap()
    }

    fn parse_json(text: &str) -> JsonValue {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_defaults_omitted() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let mut msg = DynamicMessage::new(descriptor);

        // Explicitly set to the zero value: still omitted
        msg.set_field(1, Value::I32(0)).unwrap();
        msg.set_field(2, Value::String(String::new())).unwrap();

        let text = to_json(&msg, &registry, &JsonOptions::new()).unwrap();
        assert_eq!(text, "{}");
    }

    #[test]
    fn test_emit_defaults() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let msg = DynamicMessage::new(descriptor);

        let options = JsonOptions::new().emit_default_values(true);
        let rendered = parse_json(&to_json(&msg, &registry, &options).unwrap());
        let object = rendered.as_object().unwrap();

        assert_eq!(object.get("id"), Some(&json!(0)));
        assert_eq!(object.get("name"), Some(&json!("")));
        assert_eq!(object.get("scores"), Some(&json!([])));
        assert_eq!(object.get("big"), Some(&json!("0")));
        assert_eq!(object.get("mood"), Some(&json!("MOOD_UNSET")));
        assert_eq!(object.get("counts"), Some(&json!({})));
        // Absent message fields stay absent even with emit-defaults
        assert_eq!(object.get("inner"), None);
    }

    #[test]
    fn test_scalar_rendering() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let mut msg = DynamicMessage::new(descriptor);

        msg.set_field(1, Value::I32(-5)).unwrap();
        msg.set_field(2, Value::String("žica".into())).unwrap();
        msg.set_field(6, Value::EnumNumber(1)).unwrap();
        msg.set_field(7, Value::U64(u64::MAX)).unwrap();
        msg.set_field(8, Value::Bytes(Bytes::from_static(&[0, 1, 255])))
            .unwrap();
        msg.set_field(10, Value::F64(2.5)).unwrap();
        msg.set_field(11, Value::Bool(true)).unwrap();

        let rendered = parse_json(&to_json(&msg, &registry, &JsonOptions::new()).unwrap());
        assert_eq!(
            rendered,
            json!({
                "id": -5,
                "name": "žica",
                "mood": "MOOD_HAPPY",
                "big": "18446744073709551615",
                "blob": "AAH/",
                "ratio": 2.5,
                "live": true,
            })
        );
    }

    #[test]
    fn test_unrecognized_enum_renders_numeric() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let mut msg = DynamicMessage::new(descriptor);
        msg.set_field(6, Value::EnumNumber(42)).unwrap();

        let rendered = parse_json(&to_json(&msg, &registry, &JsonOptions::new()).unwrap());
        assert_eq!(rendered, json!({ "mood": 42 }));
    }

    #[test]
    fn test_nonfinite_floats_render_as_strings() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let mut msg = DynamicMessage::new(descriptor.clone());
        msg.set_field(10, Value::F64(f64::NAN)).unwrap();
        let rendered = parse_json(&to_json(&msg, &registry, &JsonOptions::new()).unwrap());
        assert_eq!(rendered, json!({ "ratio": "NaN" }));

        let mut msg = DynamicMessage::new(descriptor);
        msg.set_field(10, Value::F64(f64::NEG_INFINITY)).unwrap();
        let rendered = parse_json(&to_json(&msg, &registry, &JsonOptions::new()).unwrap());
        assert_eq!(rendered, json!({ "ratio": "-Infinity" }));
    }

    #[test]
    fn test_map_field_renders_as_object() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let entry_descriptor = registry.message_by_name("test.Outer.CountsEntry").unwrap();

        let mut msg = DynamicMessage::new(descriptor);
        for (key, count) in [("alpha", 1), ("beta", 2)] {
            let mut entry = DynamicMessage::new(entry_descriptor.clone());
            entry.set_field(1, Value::String(key.into())).unwrap();
            entry.set_field(2, Value::I32(count)).unwrap();
            msg.append_repeated(13, Value::Message(entry)).unwrap();
        }

        let rendered = parse_json(&to_json(&msg, &registry, &JsonOptions::new()).unwrap());
        assert_eq!(rendered, json!({ "counts": { "alpha": 1, "beta": 2 } }));
    }

    #[test]
    fn test_nested_message_rendering() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let inner_descriptor = registry.message_by_name("test.Inner").unwrap();

        let mut inner = DynamicMessage::new(inner_descriptor);
        inner.set_field(1, Value::I32(3)).unwrap();
        let mut msg = DynamicMessage::new(descriptor);
        msg.set_field(4, Value::Message(inner)).unwrap();

        let rendered = parse_json(&to_json(&msg, &registry, &JsonOptions::new()).unwrap());
        assert_eq!(rendered, json!({ "inner": { "count": 3 } }));
    }

    #[test]
    fn test_from_json_roundtrip() {
        let registry = test_registry();
        let descriptor = outer(&registry);

        let mut msg = DynamicMessage::new(descriptor.clone());
        msg.set_field(1, Value::I32(9)).unwrap();
        msg.set_field(2, Value::String("round".into())).unwrap();
        msg.set_field(7, Value::U64(1 << 60)).unwrap();
        msg.set_field(9, Value::I64(-77)).unwrap();
        for v in [1, 2, 3] {
            msg.append_repeated(3, Value::I32(v)).unwrap();
        }

        let text = to_json(&msg, &registry, &JsonOptions::new()).unwrap();
        let parsed = from_json(&text, &descriptor, &registry, &JsonOptions::new()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_from_json_accepts_numbers_and_strings_for_64bit() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let options = JsonOptions::new();

        let a = from_json(r#"{"big": 123}"#, &descriptor, &registry, &options).unwrap();
        let b = from_json(r#"{"big": "123"}"#, &descriptor, &registry, &options).unwrap();
        assert_eq!(a.get_field(7), Some(&Value::U64(123)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_json_enum_by_name_or_number() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let options = JsonOptions::new();

        let by_name =
            from_json(r#"{"mood": "MOOD_GRIM"}"#, &descriptor, &registry, &options).unwrap();
        let by_number = from_json(r#"{"mood": 2}"#, &descriptor, &registry, &options).unwrap();
        assert_eq!(by_name.get_field(6), Some(&Value::EnumNumber(2)));
        assert_eq!(by_name, by_number);

        assert!(matches!(
            from_json(r#"{"mood": "MOOD_BOGUS"}"#, &descriptor, &registry, &options),
            Err(Error::UnknownEnumName { .. })
        ));
    }

    #[test]
    fn test_from_json_map_field() {
        let registry = test_registry();
        let descriptor = outer(&registry);

        let parsed = from_json(
            r#"{"counts": {"x": 5, "y": 6}}"#,
            &descriptor,
            &registry,
            &JsonOptions::new(),
        )
        .unwrap();
        let entries = parsed.get_repeated(13);
        assert_eq!(entries.len(), 2);

        let text = to_json(&parsed, &registry, &JsonOptions::new()).unwrap();
        assert_eq!(parse_json(&text), json!({ "counts": { "x": 5, "y": 6 } }));
    }

    #[test]
    fn test_unknown_key_rejected_unless_ignored() {
        let registry = test_registry();
        let descriptor = outer(&registry);

        let err = from_json(
            r#"{"id": 1, "mystery": true}"#,
            &descriptor,
            &registry,
            &JsonOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownJsonField { .. }));
        assert!(err.to_string().contains("mystery"));

        // Ignored keys are dropped, not preserved
        let parsed = from_json(
            r#"{"id": 1, "mystery": true}"#,
            &descriptor,
            &registry,
            &JsonOptions::new().ignore_unknown_fields(true),
        )
        .unwrap();
        assert_eq!(parsed.get_field(1), Some(&Value::I32(1)));
        assert!(parsed.unknown_fields().is_empty());
    }

    #[test]
    fn test_null_reads_as_absent() {
        let registry = test_registry();
        let descriptor = outer(&registry);

        let parsed = from_json(
            r#"{"id": null, "name": null}"#,
            &descriptor,
            &registry,
            &JsonOptions::new(),
        )
        .unwrap();
        assert!(!parsed.has_field(1));
        assert!(!parsed.has_field(2));
    }

    /// Schema with a field whose JSON name differs from its declared name,
    /// for name-acceptance and tie-break coverage
    fn snake_registry() -> (DescriptorRegistry, Arc<MessageDescriptor>) {
        let fds = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("s.proto".to_string()),
                package: Some("s".to_string()),
                syntax: Some("proto3".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("S".to_string()),
                    field: vec![field("my_field", 1, Type::Int32, Label::Optional)],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let registry = DescriptorRegistry::from_file_descriptor_set(&fds).unwrap();
        let descriptor = registry.message_by_name("s.S").unwrap();
        (registry, descriptor)
    }

    #[test]
    fn test_both_field_name_spellings_accepted() {
        let (registry, descriptor) = snake_registry();
        let options = JsonOptions::new();

        let by_json = from_json(r#"{"myField": 4}"#, &descriptor, &registry, &options).unwrap();
        let by_decl = from_json(r#"{"my_field": 4}"#, &descriptor, &registry, &options).unwrap();
        assert_eq!(by_json.get_field(1), Some(&Value::I32(4)));
        assert_eq!(by_json, by_decl);
    }

    #[test]
    fn test_duplicate_spellings_original_name_wins() {
        let (registry, descriptor) = snake_registry();

        // Both spellings present: the declared name's value is taken and the
        // JSON-name key does not count as unknown
        let parsed = from_json(
            r#"{"myField": 1, "my_field": 2}"#,
            &descriptor,
            &registry,
            &JsonOptions::new(),
        )
        .unwrap();
        assert_eq!(parsed.get_field(1), Some(&Value::I32(2)));
    }

    #[test]
    fn test_shape_mismatches_rejected() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let options = JsonOptions::new();

        assert!(from_json(r#"{"id": "text"}"#, &descriptor, &registry, &options).is_err());
        assert!(from_json(r#"{"scores": 3}"#, &descriptor, &registry, &options).is_err());
        assert!(from_json(r#"{"live": 1}"#, &descriptor, &registry, &options).is_err());
        assert!(from_json(r#"[1, 2]"#, &descriptor, &registry, &options).is_err());
        assert!(from_json(r#"{"id": 4294967296}"#, &descriptor, &registry, &options).is_err());
    }

    #[test]
    fn test_bytes_base64_roundtrip() {
        let registry = test_registry();
        let descriptor = outer(&registry);
        let options = JsonOptions::new();

        let parsed = from_json(r#"{"blob": "AAH/"}"#, &descriptor, &registry, &options).unwrap();
        assert_eq!(
            parsed.get_field(8),
            Some(&Value::Bytes(Bytes::from_static(&[0, 1, 255])))
        );

        // URL-safe alphabet is accepted on input
        let urlsafe = from_json(r#"{"blob": "AAH_"}"#, &descriptor, &registry, &options).unwrap();
        assert_eq!(urlsafe, parsed);
    }
}
