//! XOR checksum over unescaped header and body bytes.

/// XOR-fold every byte of `data`. The checksum of an empty span is `0x00`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Incremental checksum for spans that are not contiguous in memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u8);

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold more bytes into the running checksum.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.0 ^= checksum(data);
        self
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}
