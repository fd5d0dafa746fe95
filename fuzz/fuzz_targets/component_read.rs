#![no_main]

use bytestream::Deserializer;
use libfuzzer_sys::fuzz_target;
use scene::{AttributeValue, ComponentKey, ComponentRegistry, ComponentSpec};

fn test_component() -> scene::Component {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            ComponentSpec::new(1, "Fuzz")
                .attribute(AttributeValue::Bool(false))
                .attribute(AttributeValue::U32(0))
                .attribute(AttributeValue::F64(0.0))
                .attribute(AttributeValue::String(String::new()))
                .attribute(AttributeValue::Bytes(Vec::new())),
        )
        .unwrap();
    registry.instantiate(1, "f").unwrap()
}

fuzz_target!(|data: &[u8]| {
    // Full and delta reads over arbitrary bytes must never panic, and a
    // successful read must leave the component canonically serializable.
    let mut component = test_component();
    let mut de = Deserializer::new(data);
    if component.read_full(&mut de).is_ok() {
        component.full_bytes(64 * 1024).expect("canonical re-encode");
    }

    let mut component = test_component();
    let mut de = Deserializer::new(data);
    if component.read_delta(&mut de).is_ok() {
        component.full_bytes(64 * 1024).expect("canonical re-encode");
    }

    let _ = ComponentKey::new(1, "f");
});
