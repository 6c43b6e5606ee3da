//! Synthetic primary keys for tables that declare none.
//!
//! Key values are a bit-reversed per-table counter, rendered as the decimal
//! form of a signed 64-bit integer. Reversing the bits of a monotonically
//! increasing counter spreads sequential inserts across the whole key space,
//! which avoids hot-spotting on range-partitioned storage while staying
//! collision-free for a single run.

/// Per-table synthetic key state: the injected column's id plus the
/// 0-based sequence counter. One instance per key-less table per run;
/// the counter advances only when a row is actually emitted.
#[derive(Debug, Clone)]
pub struct SyntheticKeyState {
    pub col_id: String,
    pub col_name: String,
    pub sequence: u64,
}

impl SyntheticKeyState {
    pub fn new(col_id: String, col_name: String) -> Self {
        Self {
            col_id,
            col_name,
            sequence: 0,
        }
    }

    /// Key value for the current row. Call [`advance`](Self::advance) after
    /// the row is emitted.
    pub fn current_key(&self) -> String {
        (bit_reverse(self.sequence) as i64).to_string()
    }

    pub fn advance(&mut self) {
        self.sequence += 1;
    }
}

/// Reverse the bit order of a 64-bit value.
pub fn bit_reverse(v: u64) -> u64 {
    v.reverse_bits()
}
