/// Assert a snapshot with a set of filters applied.
#[macro_export]
macro_rules! assert_snapshot_filtered {
    ($output:expr, $filters:expr, @$expected:literal) => {
        insta::with_settings!({filters => $filters.clone()}, {
            insta::assert_snapshot!($output, @$expected);
        });
    };
}

/// Run a command and capture its progress output alongside its result.
#[macro_export]
macro_rules! run_and_capture {
    ($cmd:expr) => {{
        let mut out = Vec::new();
        let result = $cmd(&mut out).await?;
        (result, String::from_utf8(out)?)
    }};
}
