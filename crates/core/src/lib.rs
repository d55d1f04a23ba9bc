// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! Domain types and wire protocol shared by every component of the
//! reactive persistent replication server: the record/access/change
//! model (§3 of the design), the client/server JSON messages (§6), and
//! the error kinds each component reports (§7).

pub mod access;
pub mod change;
pub mod collection;
pub mod error;
pub mod id;
pub mod item;
pub mod message;

pub use access::AccessState;
pub use change::{ChangeOperation, ChangeRecord, TableKind};
pub use collection::CollectionRegistry;
pub use error::Error;
pub use id::generate_id;
pub use item::Item;
pub use message::{ChangeType, ClientMessage, ServerMessage};

pub type Result<T> = std::result::Result<T, Error>;
