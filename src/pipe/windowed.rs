/// Aligns a timestamp to the start of a fixed-duration window.
#[inline(always)]
pub fn windowed(timestamp: u64, window_size: u64) -> u64 {
    if window_size == 0 {
        return timestamp;
    }
    (timestamp / window_size) * window_size
}
