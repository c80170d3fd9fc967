//! CRC-32 (ISO-HDLC) checksum as used by the ZIP format
//!
//! Reflected polynomial `0xEDB88320`, register initialized to all ones and
//! inverted on output. The lookup table is built at compile time and shared
//! by every hasher.

use std::io::{self, Read};

const POLYNOMIAL: u32 = 0xEDB8_8320;
const INITIAL: u32 = 0xFFFF_FFFF;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                POLYNOMIAL ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Incremental CRC-32 hasher
///
/// ```
/// use rezip::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"1234");
/// crc.update(b"56789");
/// assert_eq!(crc.value(), 0xCBF4_3926);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    register: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self { register: INITIAL }
    }

    /// Checksum of a whole buffer
    pub fn checksum(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.value()
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut reg = self.register;
        for &byte in data {
            reg = TABLE[((reg ^ byte as u32) & 0xFF) as usize] ^ (reg >> 8);
        }
        self.register = reg;
    }

    /// Checksum of everything passed to [`update`](Self::update) so far
    pub fn value(&self) -> u32 {
        !self.register
    }

    pub fn reset(&mut self) {
        self.register = INITIAL;
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader adapter that checksums and counts every byte passing through it
pub(crate) struct CrcReader<R> {
    inner: R,
    crc: Crc32,
    count: u64,
}

impl<R: Read> CrcReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            crc: Crc32::new(),
            count: 0,
        }
    }

    pub(crate) fn crc(&self) -> u32 {
        self.crc.value()
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.crc.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}
