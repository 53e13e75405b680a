//! Property-based tests for CSV quoting

use pathtab_io::csv::quote_field;
use pathtab_io::QuoteMode;
use proptest::prelude::*;

fn read_back(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());
    let record = reader
        .records()
        .next()
        .expect("one record")
        .expect("record parses");
    record.iter().map(str::to_string).collect()
}

proptest! {
    #[test]
    fn quoted_field_reads_back_as_one_field(value in "[a-z;,\"\n ]{1,16}") {
        for delimiter in [',', ';'] {
            let quoted = quote_field(&value, delimiter, QuoteMode::Escape).unwrap();
            prop_assert_eq!(read_back(&quoted, delimiter as u8), vec![value.clone()]);
        }
    }

    #[test]
    fn always_quoted_field_reads_back(value in "[a-z,\"\n ]{1,16}") {
        let quoted = quote_field(&value, ',', QuoteMode::Always).unwrap();
        prop_assert!(quoted.starts_with('"'));
        prop_assert_eq!(read_back(&quoted, b','), vec![value]);
    }
}
