#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use mariadb_session::escape::{escape_backslashes, escape_quotes};

#[derive(Debug)]
struct EscapeInput {
    value: Vec<u8>,
    capacity: usize,
}

impl<'a> Arbitrary<'a> for EscapeInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        let value: Vec<u8> = u.arbitrary()?;
        let capacity = u.int_in_range(0..=value.len() * 2)?;
        Ok(Self { value, capacity })
    }
}

fuzz_target!(|input: EscapeInput| {
    let worst_case = input.value.len() * 2;

    // A worst-case buffer always fits
    let mut full = vec![0u8; worst_case];
    let n = escape_backslashes(&mut full, &input.value).expect("worst-case buffer fits");
    assert!(n <= worst_case);
    let n = escape_quotes(&mut full, &input.value).expect("worst-case buffer fits");
    assert!(n <= worst_case);

    // Valid UTF-8 stays valid UTF-8
    if std::str::from_utf8(&input.value).is_ok() {
        let n = escape_backslashes(&mut full, &input.value).unwrap();
        assert!(std::str::from_utf8(&full[..n]).is_ok());
    }

    // Short buffers fail cleanly rather than overrunning
    let mut short = vec![0u8; input.capacity];
    if let Some(n) = escape_backslashes(&mut short, &input.value) {
        assert!(n <= input.capacity);
    }
});
