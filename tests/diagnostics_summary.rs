//! The diagnostics record is process-wide, so the test that resets it lives in
//! its own test binary.

#![cfg(feature = "diagnostics")]

use errleaf::{Invisible, Value, diagnostics, new_error};

#[derive(Debug)]
struct Orphan(u32);

#[derive(Debug)]
struct Token;

#[test]
fn test_summary_and_reset() {
    diagnostics::reset();
    assert!(diagnostics::summary().is_empty());

    {
        let _outer = diagnostics::enable();
        let _inner = diagnostics::enable();
        new_error(Value(Orphan(1)));
        new_error(Value(Invisible(Token)));
        new_error(Value(Orphan(2)));
    }
    assert!(!diagnostics::is_enabled());
    new_error(Value(Orphan(3)));

    let summary = diagnostics::summary();
    assert_eq!(summary.count(), 3);
    assert_eq!(summary.first_type(), Some(std::any::type_name::<Orphan>()));
    assert_eq!(
        summary.types().collect::<Vec<_>>(),
        vec![
            (std::any::type_name::<Orphan>(), 2),
            (std::any::type_name::<Invisible<Token>>(), 1),
        ]
    );
    assert_eq!(
        summary.text(),
        format!("{}: Orphan(1)\n", std::any::type_name::<Orphan>())
    );
    assert_eq!(
        summary.to_string(),
        format!(
            "Detected 3 attempts to communicate unexpected error objects, the first one of type \
             {orphan}\nUnexpected error objects:\n{orphan}: Orphan(1)\n",
            orphan = std::any::type_name::<Orphan>()
        )
    );

    diagnostics::reset();
    assert_eq!(diagnostics::count_of::<Orphan>(), 0);
    assert_eq!(diagnostics::summary(), Default::default());
}
