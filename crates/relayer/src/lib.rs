// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod coprocessor;
mod error;
mod keypair;
mod mock;
mod relayer;
mod session;
mod signature;

pub use coprocessor::*;
pub use error::*;
pub use keypair::*;
pub use mock::*;
pub use relayer::*;
pub use session::*;
pub use signature::*;
