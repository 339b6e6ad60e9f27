//! Transaction id allocation for outgoing requests

/// Issues strictly increasing transaction ids, starting at 1
///
/// Not synchronized; the session keeps it behind the same lock as the
/// transport sink so allocation and send happen together.
#[derive(Debug, Default)]
pub struct TxidAllocator {
    last: u64,
}

impl TxidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
