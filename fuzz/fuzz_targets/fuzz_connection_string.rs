#![no_main]

use libfuzzer_sys::fuzz_target;
use mariadb_session::ConnectionString;

fuzz_target!(|data: &str| {
    let _ = ConnectionString::parse(data);

    // Exercise the parameter and authority paths behind a valid scheme
    let _ = ConnectionString::parse(&format!("mysql://{}", data));
});
