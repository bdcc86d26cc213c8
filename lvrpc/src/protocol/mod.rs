//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Wire protocol: length-value framing of [`Message`](crate::message::Message)s.

mod codec;
mod error;

pub use self::codec::{
    DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, ID_LENGTH_FIELD_SIZE, LENGTH_FIELD_SIZE,
    LengthValueCodec, TYPE_FIELD_SIZE,
};
pub use self::error::ProtocolError;
