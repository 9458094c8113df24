use std::fmt::Write;

const WORDS_PER_LINE: usize = 8;

/// Format a run of 16-bit words as a hex dump. Each line holds eight words,
/// prefixed with the byte address of its first word (starting from `start`)
/// and followed by the ASCII rendering of the big-endian bytes.
pub fn pretty_print_hex_words(words: &[u16], start: u32) -> String {
    // Per line: 8 address digits, 4 spaces, 8 words of 4 digits with
    // separators, the ASCII column, and a newline.
    let mut out = String::with_capacity((words.len() / WORDS_PER_LINE + 1) * 72);
    for (line_num, line) in words.chunks(WORDS_PER_LINE).enumerate() {
        if line_num != 0 {
            out.push('\n');
        }
        let address = start as usize + line_num * WORDS_PER_LINE * 2;
        write!(out, "{:06X}    ", address).unwrap();
        for i in 0..WORDS_PER_LINE {
            if i == 4 {
                out.push(' ');
            }
            match line.get(i) {
                Some(word) => write!(out, "{:04X} ", word).unwrap(),
                None => out.push_str("     "),
            }
        }
        out.push_str(" |");
        for word in line {
            let [upper, lower] = word.to_be_bytes();
            out.push(printable(upper));
            out.push(printable(lower));
        }
        out.push('|');
    }
    out
}

/// Shortcut for starting the addresses at zero.
#[inline]
pub fn pretty_print_hex_words_zero(words: &[u16]) -> String {
    pretty_print_hex_words(words, 0)
}

fn printable(chr: u8) -> char {
    match chr {
        32..=126 => chr.into(),
        _ => '.',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let words = [0x4142, 0x4344, 0, 0, 0, 0, 0, 0x7E7F];
        assert_eq!(pretty_print_hex_words_zero(&words),
                   "000000    4142 4344 0000 0000  0000 0000 0000 7E7F  |ABCD..........~.|");
    }

    #[test]
    fn test_partial_line() {
        let words = [0; 10];
        let dump = pretty_print_hex_words(&words, 0x1000);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("001010    0000 0000      "));
        assert!(lines[1].ends_with("|....|"));
        assert_eq!(lines[0].len(), lines[1].len() + 12);
    }
}
