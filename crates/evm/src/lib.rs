// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod authorization;
mod binding;
mod handle;
pub mod helpers;
mod temperature_check;
mod wallet;

pub use authorization::*;
pub use binding::*;
pub use handle::*;
pub use temperature_check::*;
pub use wallet::*;
