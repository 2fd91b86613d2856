use crate::util::constants::*;

pub const fn words_to_bytes(words: usize) -> usize {
    words << LOG_BYTES_IN_WORD
}

pub const fn bytes_to_words(bytes: usize) -> usize {
    bytes >> LOG_BYTES_IN_WORD
}

/// `percent` percent of `whole`, rounded down.
pub fn percentage(whole: usize, percent: usize) -> usize {
    (whole as u128 * percent as u128 / 100) as usize
}

/// Bytes in a human readable unit, for log messages.
pub fn bytes_to_formatted_string(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut i = 0;
    let mut num = bytes;
    while i < UNITS.len() - 1 {
        let new_num = num >> 10;
        if new_num == 0 {
            return format!("{}{}", num, UNITS[i]);
        }
        num = new_num;
        i += 1;
    }
    format!("{}{}", num, UNITS[UNITS.len() - 1])
}
