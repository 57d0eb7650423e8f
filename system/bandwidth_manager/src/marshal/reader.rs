// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::HandoverError;

pub(crate) trait Read {
    fn read(r: &mut Reader) -> Result<Self, HandoverError>
    where
        Self: Sized;
}

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn get(&mut self, n: usize) -> Result<&'a [u8], HandoverError> {
        if self.pos + n > self.data.len() {
            return Err(HandoverError::Truncated);
        }
        let old_pos = self.pos;
        self.pos += n;
        Ok(&self.data[old_pos..self.pos])
    }

    pub(crate) fn read<T: Read>(&mut self) -> Result<T, HandoverError> {
        T::read(self)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, HandoverError> {
        Ok(self.get(1)?[0])
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

macro_rules! unpack {
    ($v:expr, ($( $n:expr ),*)) => {
        {
            let mut _x = $v;
            ($({
                let y = _x & ((1 << $n) - 1);
                _x >>= $n;
                y
            }),*)
        }
    };
}

pub(crate) use unpack;
