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

//! Route handlers, one module per resource, mirroring spec §6.1's endpoint
//! table. Each handler validates wire-level shape (base64, JSON) and hands
//! the decoded request straight to the `kds-core` type that owns the
//! business logic.

mod group;
mod key;
mod ticket;

pub use group::{create_group, delete_group};
pub use key::set_key;
pub use ticket::{get_group_key, get_ticket};
