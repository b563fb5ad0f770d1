// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod contract;
mod coprocessor;
mod gate;
mod rig;
mod utils;
mod wallet;

pub use contract::*;
pub use coprocessor::*;
pub use gate::*;
pub use rig::*;
pub use utils::*;
pub use wallet::*;
