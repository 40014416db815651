#![no_main]

//! Arbitrary response bytes through every function's decoder. Decoding
//! must return an error or values, never panic or index out of bounds.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modbus_scada::{
    create_function, CommandParameters, ReadCommandParameters, WriteCommandParameters,
};

#[derive(Debug, Arbitrary)]
struct Input {
    function_code: u8,
    transaction_id: u16,
    address: u16,
    quantity_or_value: u16,
    response: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let fc = input.function_code % 6 + 1;
    let params = if fc <= 4 {
        CommandParameters::Read(ReadCommandParameters::new(
            input.transaction_id,
            1,
            fc,
            input.address,
            input.quantity_or_value,
        ))
    } else {
        CommandParameters::Write(WriteCommandParameters::new(
            input.transaction_id,
            1,
            fc,
            input.address,
            input.quantity_or_value,
        ))
    };

    // Out-of-range quantities and coil values are rejected at construction
    let Ok(function) = create_function(params) else {
        return;
    };

    if let Ok(values) = function.parse_response(&input.response) {
        assert!(!values.is_empty());
    }
});
