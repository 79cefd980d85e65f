#![no_main]
use follow_ledger::{decode_any, Format};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match decode_any(data) {
        Ok((format, records)) => {
            // Whatever decodes must survive a re-encode in the same format
            let mut buf = Vec::new();
            if format.encode(&records, &mut buf).is_ok() {
                assert_eq!(format.decode(&buf).ok(), Some(records));
            }
        }
        Err(failures) => assert_eq!(failures.len(), Format::DETECTION_ORDER.len()),
    }
});
