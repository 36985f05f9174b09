// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity Secret Store.

// Parity Secret Store is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity Secret Store is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity Secret Store.  If not, see <http://www.gnu.org/licenses/>.

//! Symmetric crypto primitives, master-key lifecycle, and the
//! encrypt-then-MAC storage codec underlying the key distribution service.
//!
//! This crate has no notion of tickets, groups, or HTTP; it is the layer
//! everything else in the workspace is built on.

pub mod crypto;
pub mod master_key;
pub mod storage_codec;

pub use crypto::{CryptoError, EncKey, Key, Prk, SigKey, KEY_SIZE};
pub use master_key::{MasterKey, StartupError};
pub use storage_codec::StorageCodec;
