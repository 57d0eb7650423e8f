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

pub(crate) trait Write {
    fn write(&self, w: &mut Writer);
}

pub(crate) struct Writer {
    vec: Vec<u8>,
}

impl Writer {
    pub(crate) fn new(vec: Vec<u8>) -> Self {
        Self { vec }
    }

    pub(crate) fn into_vec(self) -> Vec<u8> {
        self.vec
    }

    pub(crate) fn write<T: Write + ?Sized>(&mut self, v: &T) {
        v.write(self)
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.vec.push(v);
    }
}

impl<T: Write> Write for [T] {
    fn write(&self, w: &mut Writer) {
        w.write_u8(self.len().try_into().unwrap());
        for item in self {
            w.write(item);
        }
    }
}

macro_rules! pack {
    ( $( ($x:expr, $n:expr) ),* ) => {
        {
            let mut y = 0;
            let mut _shl = 0;
            $(
                debug_assert!($x & !((1 << $n) - 1) == 0, "value overflows {} bits", $n);
                y |= ($x << _shl);
                _shl += $n;
            )*
            y
        }
    };
}

pub(crate) use pack;
