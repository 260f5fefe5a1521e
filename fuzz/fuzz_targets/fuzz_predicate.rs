#![no_main]

use data_client_emulator::filter::{compare_values, Predicate};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON documents exercise row evaluation on unexpected types.
    let Ok(Value::Object(row)) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let row: Map<String, Value> = row;

    for (column, value) in &row {
        // Every present value equals itself and orders consistently.
        if !value.is_null() {
            assert!(Predicate::Equals(column.clone(), value.clone()).matches(&row));
        }
        if let Some(ordering) = compare_values(value, value) {
            assert!(ordering.is_eq());
        }

        let probes = [
            Predicate::NotEquals(column.clone(), value.clone()),
            Predicate::GreaterThan(column.clone(), value.clone()),
            Predicate::LessOrEqual(column.clone(), value.clone()),
            Predicate::Is(column.clone(), Value::Null),
            Predicate::In(column.clone(), vec![value.clone()]),
            Predicate::Contains(column.clone(), vec![value.clone()]),
            Predicate::ContainedBy(column.clone(), vec![value.clone()]),
            Predicate::Like {
                column: column.clone(),
                pattern: value.as_str().unwrap_or("%").to_owned(),
                case_insensitive: true,
            },
        ];
        for probe in &probes {
            let _ = probe.matches(&row);
        }
    }
});
