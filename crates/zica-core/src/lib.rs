//! # zica-core
//!
//! A schema-driven runtime for the Protocol Buffer wire format.
//!
//! This crate provides the core functionality for:
//! - Encoding and decoding the binary wire format (varints, tags, framing)
//! - Describing message shapes through shared immutable descriptors
//! - Holding message data in a dynamic, descriptor-checked store
//! - Converting messages to and from the standard protobuf JSON mapping
//!
//! ## Architecture
//!
//! The library is organized into several modules, leaf-first:
//!
//! - [`wire`]: Varint codec and tag/value framing primitives
//! - [`descriptor`]: Immutable type metadata and the registry that shares it
//! - [`message`]: The dynamic message store with unknown-field and
//!   extension side-channels
//! - [`codec`]: Binary and JSON codecs driving the store through reflection
//! - [`error`]: Error types and handling
//!
//! Descriptors come in as a `FileDescriptorSet` produced by an external
//! `.proto` compiler; generated accessor classes are a thin layer over
//! [`message::DynamicMessage`]'s `get_field`/`set_field`/`has_field`/
//! `clear_field` contract and are not part of this crate.
//!
//! ## Example
//!
//! ```
//! use prost_types::field_descriptor_proto::{Label, Type};
//! use prost_types::{
//!     DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
//! };
//! use zica_core::{codec::binary, DescriptorRegistry, DynamicMessage, Value};
//!
//! // Schema for `message Ping { uint64 seq = 1; }`, normally emitted by a
//! // .proto compiler
//! let fds = FileDescriptorSet {
//!     file: vec![FileDescriptorProto {
//!         name: Some("ping.proto".into()),
//!         package: Some("demo".into()),
//!         syntax: Some("proto3".into()),
//!         message_type: vec![DescriptorProto {
//!             name: Some("Ping".into()),
//!             field: vec![FieldDescriptorProto {
//!                 name: Some("seq".into()),
//!                 number: Some(1),
//!                 r#type: Some(Type::Uint64 as i32),
//!                 label: Some(Label::Optional as i32),
//!                 ..Default::default()
//!             }],
//!             ..Default::default()
//!         }],
//!         ..Default::default()
//!     }],
//! };
//!
//! let registry = DescriptorRegistry::from_file_descriptor_set(&fds)?;
//! let descriptor = registry.message_by_name("demo.Ping")?;
//!
//! let mut ping = DynamicMessage::new(descriptor.clone());
//! ping.set_field(1, Value::U64(7))?;
//!
//! let bytes = binary::serialize(&ping);
//! let parsed = binary::parse(&bytes, &descriptor, &registry)?;
//! assert_eq!(parsed, ping);
//! # Ok::<(), zica_core::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! Descriptors are immutable once built and safely shared across threads;
//! a [`DynamicMessage`] is plain owned data, mutated through `&mut` and
//! readable concurrently only while no mutation is in flight. No operation
//! in this crate blocks or performs I/O.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod message;
pub mod wire;

// Re-export primary types for convenience
pub use codec::json::JsonOptions;
pub use descriptor::{
    Cardinality, DescriptorRegistry, EnumDescriptor, ExtensionDescriptor, FieldDescriptor,
    FieldKind, MessageDescriptor, Syntax,
};
pub use error::{Error, Result};
pub use message::{DynamicMessage, UnknownField, UnknownFieldSet, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Maximum message nesting depth accepted by the parsers
pub const RECURSION_LIMIT: usize = 100;
