// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wire transport helpers used by the generated Rust bindings.
//!
//! The generated code reads typed arguments through the `next_*` accessors
//! and writes messages through `start_write`/`put_*`/`finish_write`. The
//! wire conventions follow the Wayland protocol: 32-bit little-endian
//! words, length-prefixed NUL-terminated strings padded to word
//! boundaries, and file descriptors carried out of band.

use bytes::{Buf, BufMut, BytesMut};
use std::cell::RefCell;
use std::collections::VecDeque;

/// File descriptor handle. Kept as a plain 32-bit value so the crate
/// builds on non-unix targets used for code generation checks.
pub type Fd = i32;

/// Errors surfaced by generated dispatchers and send functions.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("object {object}: unknown opcode {opcode}")]
    UnknownOpcode { object: u32, opcode: u16 },
    #[error("object {object}: id {id} does not resolve to a live object")]
    ExpectedObject { object: u32, id: u32 },
    #[error("object {id} is not of the expected type {expected}")]
    MismatchedObjectType { id: u32, expected: &'static str },
    #[error("object {object}: {value} is not a valid {enum_name} value")]
    InvalidEnumValue { object: u32, value: u32, enum_name: &'static str },
    #[error("message truncated while reading {what}")]
    UnexpectedEndOfMessage { what: &'static str },
    #[error("string argument contains invalid utf-8")]
    InvalidString,
    #[error("array length {len} is not a whole number of words")]
    InvalidArraySize { len: usize },
    #[error("no file descriptor queued for a fd argument")]
    MissingFileDescriptor,
}

/// Connection transport.
///
/// Inbound message bodies are queued with [`Context::feed`] and consumed
/// word by word by the generated dispatchers. Outbound messages are
/// buffered between [`Context::start_write`] and
/// [`Context::finish_write`], which seals the frame with the sender
/// object id and opcode. All accessors take `&self`: one message is
/// always read or written at a time, and interior mutability keeps the
/// generated code free of borrow gymnastics around shared objects.
#[derive(Debug, Default)]
pub struct Context {
    rx: RefCell<BytesMut>,
    rx_fds: RefCell<VecDeque<Fd>>,
    frame: RefCell<BytesMut>,
    tx: RefCell<BytesMut>,
    tx_fds: RefCell<VecDeque<Fd>>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Queue inbound message body bytes.
    pub fn feed(&self, bytes: &[u8]) {
        self.rx.borrow_mut().extend_from_slice(bytes);
    }

    /// Queue an inbound file descriptor.
    pub fn feed_fd(&self, fd: Fd) {
        self.rx_fds.borrow_mut().push_back(fd);
    }

    fn next_word(&self, what: &'static str) -> Result<u32, Error> {
        let mut rx = self.rx.borrow_mut();
        if rx.remaining() < 4 {
            return Err(Error::UnexpectedEndOfMessage { what });
        }
        Ok(rx.get_u32_le())
    }

    pub fn next_int(&self) -> Result<i32, Error> {
        Ok(self.next_word("int")? as i32)
    }

    pub fn next_uint(&self) -> Result<u32, Error> {
        self.next_word("uint")
    }

    /// Read a signed 24.8 fixed-point value as its float carrier.
    pub fn next_fixed(&self) -> Result<f32, Error> {
        Ok(self.next_word("fixed")? as i32 as f32 / 256.0)
    }

    pub fn next_new_id(&self) -> Result<u32, Error> {
        self.next_word("new_id")
    }

    /// Read a length-prefixed string. The length includes the
    /// terminating NUL and the payload is padded to a word boundary.
    pub fn next_string(&self) -> Result<String, Error> {
        let len = self.next_word("string length")? as usize;
        let padded = (len + 3) & !3;
        let mut rx = self.rx.borrow_mut();
        if rx.remaining() < padded {
            return Err(Error::UnexpectedEndOfMessage { what: "string" });
        }
        let bytes = rx.copy_to_bytes(padded);
        let text = bytes[..len.saturating_sub(1)].to_vec();
        String::from_utf8(text).map_err(|_| Error::InvalidString)
    }

    /// Read a byte-length-prefixed array of 32-bit words.
    pub fn next_array(&self) -> Result<Vec<u32>, Error> {
        let len = self.next_word("array length")? as usize;
        if len % 4 != 0 {
            return Err(Error::InvalidArraySize { len });
        }
        let mut words = Vec::with_capacity(len / 4);
        for _ in 0..len / 4 {
            words.push(self.next_word("array")?);
        }
        Ok(words)
    }

    /// Take the next queued file descriptor.
    pub fn next_fd(&self) -> Result<Fd, Error> {
        self.rx_fds.borrow_mut().pop_front().ok_or(Error::MissingFileDescriptor)
    }

    /// Open a new outbound frame. Any unfinished frame is discarded.
    pub fn start_write(&self) {
        self.frame.borrow_mut().clear();
    }

    pub fn put_int(&self, value: i32) {
        self.frame.borrow_mut().put_u32_le(value as u32);
    }

    pub fn put_uint(&self, value: u32) {
        self.frame.borrow_mut().put_u32_le(value);
    }

    pub fn put_fixed(&self, value: f32) {
        self.frame.borrow_mut().put_u32_le((value * 256.0) as i32 as u32);
    }

    pub fn put_new_id(&self, value: u32) {
        self.frame.borrow_mut().put_u32_le(value);
    }

    pub fn put_string(&self, value: &str) {
        let mut frame = self.frame.borrow_mut();
        let len = value.len() + 1;
        frame.put_u32_le(len as u32);
        frame.put_slice(value.as_bytes());
        frame.put_u8(0);
        for _ in len..(len + 3) & !3 {
            frame.put_u8(0);
        }
    }

    pub fn put_array(&self, value: &[u32]) {
        let mut frame = self.frame.borrow_mut();
        frame.put_u32_le((value.len() * 4) as u32);
        for word in value {
            frame.put_u32_le(*word);
        }
    }

    pub fn put_fd(&self, fd: Fd) {
        self.tx_fds.borrow_mut().push_back(fd);
    }

    /// Seal the open frame with the Wayland message header: the sender
    /// object id, then the frame size in the upper halfword and the
    /// opcode in the lower halfword.
    pub fn finish_write(&self, id: u32, opcode: u16) -> Result<(), Error> {
        let body = std::mem::take(&mut *self.frame.borrow_mut());
        let size = 8 + body.len();
        let mut tx = self.tx.borrow_mut();
        tx.put_u32_le(id);
        tx.put_u32_le((size as u32) << 16 | opcode as u32);
        tx.put_slice(&body);
        Ok(())
    }

    /// Drain the buffered outbound bytes. Used by transports and tests.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.tx.borrow_mut()).to_vec()
    }

    /// Drain the buffered outbound file descriptors.
    pub fn take_output_fds(&self) -> Vec<Fd> {
        self.tx_fds.borrow_mut().drain(..).collect()
    }
}
